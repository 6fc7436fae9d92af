//! Assembling traced rings into polygons with holes.

use geo::{Coord, LineString, MultiPolygon, Polygon};

/// Even-odd point in ring test.
pub fn point_in_ring(point: Coord<f64>, ring: &[Coord<f64>]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (ring[i], ring[j]);
        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Signed shoelace area of an open ring.
pub fn ring_area(ring: &[Coord<f64>]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut j = n - 1;
    for i in 0..n {
        sum += ring[j].x * ring[i].y - ring[i].x * ring[j].y;
        j = i;
    }
    sum / 2.0
}

struct Bounds {
    min: Coord<f64>,
    max: Coord<f64>,
}

impl Bounds {
    fn of(ring: &[Coord<f64>]) -> Self {
        let mut min = Coord {
            x: f64::INFINITY,
            y: f64::INFINITY,
        };
        let mut max = Coord {
            x: f64::NEG_INFINITY,
            y: f64::NEG_INFINITY,
        };
        for c in ring {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        Self { min, max }
    }

    fn contains(&self, other: &Bounds) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
    }
}

/// Uniform grid of buckets over the bounds of all rings. Each ring is
/// listed in every bucket its bounds overlap, so the rings enclosing a
/// point are all in the point's bucket.
struct BucketIndex {
    origin: Coord<f64>,
    cell: Coord<f64>,
    cols: usize,
    rows: usize,
    buckets: Vec<Vec<usize>>,
}

impl BucketIndex {
    fn new(bounds: &[Bounds]) -> Self {
        let mut all = Bounds {
            min: Coord {
                x: f64::INFINITY,
                y: f64::INFINITY,
            },
            max: Coord {
                x: f64::NEG_INFINITY,
                y: f64::NEG_INFINITY,
            },
        };
        for b in bounds {
            all.min.x = all.min.x.min(b.min.x);
            all.min.y = all.min.y.min(b.min.y);
            all.max.x = all.max.x.max(b.max.x);
            all.max.y = all.max.y.max(b.max.y);
        }
        let side = ((bounds.len() as f64).sqrt().ceil() as usize).clamp(1, 256);
        let cell = Coord {
            x: ((all.max.x - all.min.x) / side as f64).max(f64::MIN_POSITIVE),
            y: ((all.max.y - all.min.y) / side as f64).max(f64::MIN_POSITIVE),
        };
        let mut index = Self {
            origin: all.min,
            cell,
            cols: side,
            rows: side,
            buckets: vec![Vec::new(); side * side],
        };
        for (i, b) in bounds.iter().enumerate() {
            let (c0, r0) = index.cell_of(b.min);
            let (c1, r1) = index.cell_of(b.max);
            for r in r0..=r1 {
                for c in c0..=c1 {
                    index.buckets[r * index.cols + c].push(i);
                }
            }
        }
        index
    }

    fn cell_of(&self, p: Coord<f64>) -> (usize, usize) {
        let clamp = |v: f64, n: usize| (v.max(0.0) as usize).min(n - 1);
        (
            clamp((p.x - self.origin.x) / self.cell.x, self.cols),
            clamp((p.y - self.origin.y) / self.cell.y, self.rows),
        )
    }

    fn candidates(&self, p: Coord<f64>) -> &[usize] {
        let (c, r) = self.cell_of(p);
        &self.buckets[r * self.cols + c]
    }
}

/// Build polygons from disjoint closed rings.
///
/// A ring's nesting depth is the number of rings enclosing it. Even depth
/// makes a shell; odd depth makes a hole of the enclosing ring one level up.
/// Rings with fewer than three points or no area are skipped.
pub fn assemble(rings: Vec<Vec<Coord<f64>>>) -> MultiPolygon<f64> {
    let rings: Vec<Vec<Coord<f64>>> = rings
        .into_iter()
        .filter(|r| r.len() >= 3 && ring_area(r).abs() > f64::EPSILON)
        .collect();
    let bounds: Vec<Bounds> = rings.iter().map(|r| Bounds::of(r)).collect();
    let index = BucketIndex::new(&bounds);

    // Enclosing rings of each ring.
    let parents: Vec<Vec<usize>> = (0..rings.len())
        .map(|i| {
            index
                .candidates(rings[i][0])
                .iter()
                .copied()
                .filter(|&j| {
                    j != i
                        && bounds[j].contains(&bounds[i])
                        && point_in_ring(rings[i][0], &rings[j])
                })
                .collect()
        })
        .collect();
    let depth: Vec<usize> = parents.iter().map(Vec::len).collect();

    let mut shells: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut shell_slot = vec![usize::MAX; rings.len()];
    for i in 0..rings.len() {
        if depth[i] % 2 == 0 {
            shell_slot[i] = shells.len();
            shells.push((i, Vec::new()));
        }
    }
    for i in 0..rings.len() {
        if depth[i] % 2 == 1 {
            let owner = parents[i].iter().find(|&&j| depth[j] + 1 == depth[i]);
            match owner {
                Some(&j) => shells[shell_slot[j]].1.push(i),
                None => log::debug!("hole ring {i} has no enclosing shell"),
            }
        }
    }

    let to_line = |i: usize| LineString::from(rings[i].clone());
    MultiPolygon::new(
        shells
            .into_iter()
            .map(|(shell, holes)| Polygon::new(to_line(shell), holes.into_iter().map(to_line).collect()))
            .collect(),
    )
}
