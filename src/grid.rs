use contagion_common::{Cell, TerrainMask};

/// Fixed-size 2-D field of cell states.
///
/// Dimensions are set at construction and never change. Every access is
/// bounds-checked: out-of-range reads come back as `Cell::Terrain` (dead,
/// never a neighbour, never a movement target) and out-of-range writes are
/// dropped. Edges do not wrap.
#[derive(Debug, Clone)]
pub struct Grid {
    cells_x: u32,
    cells_y: u32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Creates a grid of empty cells, with terrain applied from the optional mask.
    pub fn new(cells_x: u32, cells_y: u32, terrain: Option<&TerrainMask>) -> Self {
        let mut cells = vec![Cell::Empty; (cells_x as usize) * (cells_y as usize)];
        if let Some(mask) = terrain {
            for x in 0..cells_x {
                for y in 0..cells_y {
                    if mask.is_blocked(x, y) {
                        cells[(x as usize) * (cells_y as usize) + (y as usize)] = Cell::Terrain;
                    }
                }
            }
        }
        Self {
            cells_x,
            cells_y,
            cells,
        }
    }

    pub fn cells_x(&self) -> u32 {
        self.cells_x
    }

    pub fn cells_y(&self) -> u32 {
        self.cells_y
    }

    /// Flat cell storage in x-major order, for full-grid scans.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.cells_x as i64 || y >= self.cells_y as i64 {
            return None;
        }
        Some((x as usize) * (self.cells_y as usize) + (y as usize))
    }

    /// Returns the cell at `(x, y)`, or `Cell::Terrain` for any
    /// out-of-range coordinate. Never panics.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Cell {
        match self.index(x, y) {
            Some(idx) => self.cells[idx],
            None => Cell::Terrain,
        }
    }

    /// Writes the cell at `(x, y)`. Out-of-range writes are a no-op.
    #[inline]
    pub fn set(&mut self, x: i64, y: i64, cell: Cell) {
        if let Some(idx) = self.index(x, y) {
            self.cells[idx] = cell;
        }
    }

    /// Counts actively infectious occupants in the 8-cell Moore
    /// neighbourhood around `(cx, cy)`, excluding the center. Borders are
    /// treated as dead: neighbours outside the grid never count, and the
    /// grid does not wrap.
    pub fn count_infected_neighbours(&self, cx: i64, cy: i64) -> u32 {
        let mut count = 0;
        for x in cx - 1..=cx + 1 {
            for y in cy - 1..=cy + 1 {
                if x == cx && y == cy {
                    continue;
                }
                if self.get(x, y).is_infectious() {
                    count += 1;
                }
            }
        }
        count
    }

    /// Resets every non-terrain cell to empty. Terrain is untouched.
    pub fn clear_occupants(&mut self) {
        for cell in &mut self.cells {
            if !cell.is_terrain() {
                *cell = Cell::Empty;
            }
        }
    }

    /// Number of occupied cells (susceptible, infected or recovered).
    pub fn occupant_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_occupied()).count()
    }

    /// Renderer-facing integer codes in x-major order.
    pub fn codes(&self, incubation_period: u32) -> Vec<i32> {
        self.cells
            .iter()
            .map(|c| c.code(incubation_period))
            .collect()
    }
}
