//! Row-major per-pixel grids.

/// Per-pixel layer counts of one filament.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountGrid {
    width: usize,
    height: usize,
    counts: Vec<u32>,
}

impl CountGrid {
    /// All-zero grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            counts: vec![0; width * height],
        }
    }

    /// Width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Count at a cell, 0 outside the grid.
    pub fn get(&self, x: usize, y: usize) -> u32 {
        if x < self.width && y < self.height {
            self.counts[y * self.width + x]
        } else {
            0
        }
    }

    /// Set a cell. Out-of-range writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, count: u32) {
        if x < self.width && y < self.height {
            self.counts[y * self.width + x] = count;
        }
    }

    /// Largest count.
    pub fn max(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Cells with at least `level` layers.
    pub fn occupancy(&self, level: u32) -> OccupancyGrid {
        OccupancyGrid {
            width: self.width,
            height: self.height,
            cells: self.counts.iter().map(|&c| c >= level).collect(),
        }
    }
}

/// Boolean per-pixel mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl OccupancyGrid {
    /// All-false grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    /// Wrap a row-major mask. Returns `None` if the length does not match.
    pub fn from_cells(width: usize, height: usize, cells: Vec<bool>) -> Option<Self> {
        (cells.len() == width * height).then_some(Self {
            width,
            height,
            cells,
        })
    }

    /// Width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cell value, `false` outside the grid.
    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.cells[y * self.width + x]
    }

    /// Set a cell. Out-of-range writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = value;
        }
    }

    /// Number of set cells.
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// True if no cell is set.
    pub fn is_empty(&self) -> bool {
        !self.cells.iter().any(|&c| c)
    }

    /// True if every set cell is also set in `other`.
    pub fn is_subset_of(&self, other: &OccupancyGrid) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.cells.iter().zip(&other.cells).all(|(&a, &b)| !a || b)
    }

    /// Copy with a border of `pad` unset cells on every side.
    pub fn padded(&self, pad: usize) -> OccupancyGrid {
        let mut out = OccupancyGrid::new(self.width + 2 * pad, self.height + 2 * pad);
        for y in 0..self.height {
            for x in 0..self.width {
                if self.cells[y * self.width + x] {
                    out.set(x + pad, y + pad, true);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupancy_is_nested() {
        let mut grid = CountGrid::new(4, 3);
        for (i, c) in [0, 1, 2, 3, 4, 5, 1, 2, 0, 3, 3, 1].iter().enumerate() {
            grid.set(i % 4, i / 4, *c);
        }
        assert_eq!(grid.max(), 5);
        for level in 1..=grid.max() {
            let lower = grid.occupancy(level);
            let upper = grid.occupancy(level + 1);
            assert!(upper.is_subset_of(&lower));
            assert!(upper.count() <= lower.count());
        }
        assert!(grid.occupancy(6).is_empty());
    }

    #[test]
    fn test_padding() {
        let mut grid = OccupancyGrid::new(2, 1);
        grid.set(1, 0, true);
        let padded = grid.padded(1);
        assert_eq!((padded.width(), padded.height()), (4, 3));
        assert!(padded.get(2, 1));
        assert_eq!(padded.count(), 1);
        assert!(!padded.get(10, 10));
    }

    #[test]
    fn test_from_cells_checks_length() {
        assert!(OccupancyGrid::from_cells(2, 2, vec![true; 4]).is_some());
        assert!(OccupancyGrid::from_cells(2, 2, vec![true; 3]).is_none());
    }
}
