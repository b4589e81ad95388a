use anyhow::Result;
use std::path::Path;

/// Static land mask for the optional terrain variant.
///
/// Loaded once from a plain-text map file: one line per grid row (y),
/// one character per column (x), `#` for impassable terrain and `.` for
/// habitable ground. Dimensions must match the configured grid exactly.
#[derive(Debug, Clone)]
pub struct TerrainMask {
    cells_x: u32,
    cells_y: u32,
    blocked: Vec<bool>,
}

impl TerrainMask {
    /// Loads and validates a terrain map file against the expected grid size.
    pub fn load<P: AsRef<Path>>(path: P, cells_x: u32, cells_y: u32) -> Result<Self> {
        let path_ref = path.as_ref();
        let map_str = std::fs::read_to_string(path_ref).map_err(|e| {
            anyhow::anyhow!("Failed to read terrain map '{}': {}", path_ref.display(), e)
        })?;
        Self::parse(&map_str, cells_x, cells_y)
            .map_err(|e| anyhow::anyhow!("Invalid terrain map '{}': {}", path_ref.display(), e))
    }

    /// Parses map text: `#` = blocked, `.` = habitable.
    pub fn parse(map_str: &str, cells_x: u32, cells_y: u32) -> Result<Self> {
        let mut blocked = vec![false; (cells_x as usize) * (cells_y as usize)];
        let mut rows = 0u32;

        for (y, line) in map_str.lines().enumerate() {
            if y as u32 >= cells_y {
                anyhow::bail!("map has more than {} rows", cells_y);
            }
            let mut cols = 0u32;
            for (x, ch) in line.chars().enumerate() {
                if x as u32 >= cells_x {
                    anyhow::bail!("row {} is wider than {} columns", y, cells_x);
                }
                match ch {
                    '#' => blocked[x * (cells_y as usize) + y] = true,
                    '.' => {}
                    other => anyhow::bail!("unexpected character '{}' at ({}, {})", other, x, y),
                }
                cols += 1;
            }
            if cols != cells_x {
                anyhow::bail!("row {} has {} columns, expected {}", y, cols, cells_x);
            }
            rows += 1;
        }
        if rows != cells_y {
            anyhow::bail!("map has {} rows, expected {}", rows, cells_y);
        }

        Ok(Self {
            cells_x,
            cells_y,
            blocked,
        })
    }

    /// True if `(x, y)` is impassable. Out-of-range positions are blocked.
    pub fn is_blocked(&self, x: u32, y: u32) -> bool {
        if x >= self.cells_x || y >= self.cells_y {
            return true;
        }
        self.blocked[(x as usize) * (self.cells_y as usize) + (y as usize)]
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.iter().filter(|b| **b).count()
    }

    /// Fraction of grid positions that can hold an occupant.
    pub fn habitable_fraction(&self) -> f64 {
        let total = self.blocked.len();
        if total == 0 {
            return 0.0;
        }
        (total - self.blocked_count()) as f64 / total as f64
    }
}
