//! Marching squares over a boolean grid.
//!
//! Grid values sit on lattice points; each 2x2 block of points is a cell.
//! A cell emits oriented segments between interpolated edge crossings, with
//! the occupied side always on the same hand, so chaining segments end to
//! start yields closed rings without any search.

use geo::Coord;

use crate::grid::OccupancyGrid;

// Cell edges in clockwise order (screen coordinates, y down).
const TOP: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const LEFT: usize = 3;

const NONE: usize = usize::MAX;

/// Oriented segments of one cell, as `(from_edge, to_edge)` pairs.
///
/// Corner bits: 1 top-left, 2 top-right, 4 bottom-right, 8 bottom-left.
/// `centre_high` resolves the two saddle cases.
fn cell_segments(case: u8, centre_high: bool) -> &'static [(usize, usize)] {
    match case {
        0 | 15 => &[],
        1 => &[(LEFT, TOP)],
        2 => &[(TOP, RIGHT)],
        3 => &[(LEFT, RIGHT)],
        4 => &[(RIGHT, BOTTOM)],
        5 if centre_high => &[(RIGHT, TOP), (LEFT, BOTTOM)],
        5 => &[(LEFT, TOP), (RIGHT, BOTTOM)],
        6 => &[(TOP, BOTTOM)],
        7 => &[(LEFT, BOTTOM)],
        8 => &[(BOTTOM, LEFT)],
        9 => &[(BOTTOM, TOP)],
        10 if centre_high => &[(TOP, LEFT), (BOTTOM, RIGHT)],
        10 => &[(TOP, RIGHT), (BOTTOM, LEFT)],
        11 => &[(BOTTOM, RIGHT)],
        12 => &[(RIGHT, LEFT)],
        13 => &[(RIGHT, TOP)],
        14 => &[(TOP, LEFT)],
        _ => &[],
    }
}

struct Field<'a> {
    grid: &'a OccupancyGrid,
    level: f64,
}

impl Field<'_> {
    fn value(&self, x: usize, y: usize) -> f64 {
        if self.grid.get(x, y) {
            1.0
        } else {
            0.0
        }
    }

    fn high(&self, x: usize, y: usize) -> bool {
        self.value(x, y) >= self.level
    }

    /// Crossing point on the segment between two lattice points.
    fn crossing(&self, p: (usize, usize), q: (usize, usize)) -> Coord<f64> {
        let (vp, vq) = (self.value(p.0, p.1), self.value(q.0, q.1));
        let t = if (vq - vp).abs() > f64::EPSILON {
            ((self.level - vp) / (vq - vp)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        Coord {
            x: p.0 as f64 + t * (q.0 as f64 - p.0 as f64),
            y: p.1 as f64 + t * (q.1 as f64 - p.1 as f64),
        }
    }
}

/// Closed rings where the grid crosses `level`, in lattice coordinates.
///
/// Rings are open (the first point is not repeated). The grid should have an
/// unset border so that every ring closes; [`OccupancyGrid::padded`] does that.
pub fn trace_rings(grid: &OccupancyGrid, level: f64) -> Vec<Vec<Coord<f64>>> {
    let (w, h) = (grid.width(), grid.height());
    if w < 2 || h < 2 {
        return Vec::new();
    }
    let field = Field { grid, level };

    // Horizontal edge (x,y)-(x+1,y) has id 2*(y*w+x); vertical (x,y)-(x,y+1) has id 2*(y*w+x)+1.
    let h_edge = |x: usize, y: usize| 2 * (y * w + x);
    let v_edge = |x: usize, y: usize| 2 * (y * w + x) + 1;

    let mut next = vec![NONE; 2 * w * h];
    let mut starts = Vec::new();

    for y in 0..h - 1 {
        for x in 0..w - 1 {
            let case = u8::from(field.high(x, y))
                | (u8::from(field.high(x + 1, y)) << 1)
                | (u8::from(field.high(x + 1, y + 1)) << 2)
                | (u8::from(field.high(x, y + 1)) << 3);
            if case == 0 || case == 15 {
                continue;
            }
            let centre = (field.value(x, y)
                + field.value(x + 1, y)
                + field.value(x + 1, y + 1)
                + field.value(x, y + 1))
                / 4.0;
            let edge_id = |edge: usize| match edge {
                TOP => h_edge(x, y),
                RIGHT => v_edge(x + 1, y),
                BOTTOM => h_edge(x, y + 1),
                _ => v_edge(x, y),
            };
            for &(from, to) in cell_segments(case, centre > level) {
                let (a, b) = (edge_id(from), edge_id(to));
                next[a] = b;
                starts.push(a);
            }
        }
    }

    let point = |id: usize| -> Coord<f64> {
        let cell = id / 2;
        let (x, y) = (cell % w, cell / w);
        if id % 2 == 0 {
            field.crossing((x, y), (x + 1, y))
        } else {
            field.crossing((x, y), (x, y + 1))
        }
    };

    let mut rings = Vec::new();
    let mut visited = vec![false; next.len()];
    for start in starts {
        if visited[start] {
            continue;
        }
        let mut ring = Vec::new();
        let mut id = start;
        let mut closed = false;
        while id != NONE && !visited[id] {
            visited[id] = true;
            ring.push(point(id));
            id = next[id];
            if id == start {
                closed = true;
                break;
            }
        }
        if closed && ring.len() >= 3 {
            rings.push(ring);
        } else if !ring.is_empty() {
            log::debug!("dropping open contour with {} points", ring.len());
        }
    }
    rings
}
