//! 2D planar subdivision (doubly-connected edge list).
//!
//! Takes a soup of segments (face boundary polylines plus imprint
//! segments), splits every segment at every mutual intersection and
//! T-junction, links directed half-edges by angle around each vertex,
//! and walks the structure into bounded regions. Negative (clockwise)
//! cycles are matched to the smallest containing positive cycle as
//! holes.

use std::collections::HashMap;

use arbor_kernel_math::{
    dist_point_segment, point_in_polygon, segment_intersection, signed_area, Point2,
};

/// A bounded region extracted from the subdivision.
#[derive(Debug, Clone)]
pub struct Region {
    /// Counter-clockwise outer polygon.
    pub outer: Vec<Point2>,
    /// Clockwise hole polygons.
    pub holes: Vec<Vec<Point2>>,
}

impl Region {
    /// Area of the region (outer minus holes).
    pub fn area(&self) -> f64 {
        signed_area(&self.outer) + self.holes.iter().map(|h| signed_area(h)).sum::<f64>()
    }
}

/// Planar subdivision builder.
#[derive(Debug)]
pub struct Subdivision {
    eps: f64,
    segments: Vec<(Point2, Point2)>,
}

impl Subdivision {
    /// Create a subdivision with the given snapping tolerance.
    pub fn new(eps: f64) -> Self {
        Self {
            eps,
            segments: Vec::new(),
        }
    }

    /// Add one segment.
    pub fn add_segment(&mut self, a: Point2, b: Point2) {
        if (b - a).norm() > self.eps {
            self.segments.push((a, b));
        }
    }

    /// Add a closed polygon ring.
    pub fn add_ring(&mut self, ring: &[Point2]) {
        for i in 0..ring.len() {
            self.add_segment(ring[i], ring[(i + 1) % ring.len()]);
        }
    }

    /// Split, link, and extract the bounded regions.
    pub fn build(&self) -> Vec<Region> {
        let eps = self.eps;

        // Split every segment at intersections with every other segment
        // and at T-junction endpoints landing on it.
        let mut pieces: Vec<(Point2, Point2)> = Vec::new();
        for (i, &(a, b)) in self.segments.iter().enumerate() {
            let len = (b - a).norm();
            let mut ts = vec![0.0, 1.0];
            for (j, &(c, d)) in self.segments.iter().enumerate() {
                if i == j {
                    continue;
                }
                if let Some(hit) = segment_intersection(&a, &b, &c, &d, eps) {
                    ts.push(hit.t);
                }
                // Endpoints of other segments lying on this one
                for p in [c, d] {
                    if dist_point_segment(&p, &a, &b) <= eps {
                        let t = ((p - a).dot(&(b - a)) / (len * len)).clamp(0.0, 1.0);
                        ts.push(t);
                    }
                }
            }
            ts.sort_by(|x, y| x.partial_cmp(y).unwrap());
            for w in ts.windows(2) {
                let (t0, t1) = (w[0], w[1]);
                if (t1 - t0) * len > eps {
                    pieces.push((a + t0 * (b - a), a + t1 * (b - a)));
                }
            }
        }

        // Snap endpoints to quantized vertices and dedupe undirected edges
        let scale = 1.0 / eps.max(1e-12);
        let mut verts: Vec<Point2> = Vec::new();
        let mut vert_map: HashMap<(i64, i64), usize> = HashMap::new();
        let mut vid = |p: Point2, verts: &mut Vec<Point2>| -> usize {
            let key = ((p.x * scale).round() as i64, (p.y * scale).round() as i64);
            *vert_map.entry(key).or_insert_with(|| {
                verts.push(p);
                verts.len() - 1
            })
        };
        let mut edge_set: HashMap<(usize, usize), ()> = HashMap::new();
        let mut edges: Vec<(usize, usize)> = Vec::new();
        for (a, b) in pieces {
            let va = vid(a, &mut verts);
            let vb = vid(b, &mut verts);
            if va == vb {
                continue;
            }
            let key = (va.min(vb), va.max(vb));
            if edge_set.insert(key, ()).is_none() {
                edges.push(key);
            }
        }

        // Directed half-edges, sorted by angle around each origin
        let n_half = edges.len() * 2;
        let origin = |h: usize| -> usize {
            let (a, b) = edges[h / 2];
            if h % 2 == 0 {
                a
            } else {
                b
            }
        };
        let dest = |h: usize| -> usize {
            let (a, b) = edges[h / 2];
            if h % 2 == 0 {
                b
            } else {
                a
            }
        };
        let angle = |h: usize| -> f64 {
            let d = verts[dest(h)] - verts[origin(h)];
            d.y.atan2(d.x)
        };

        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); verts.len()];
        for h in 0..n_half {
            outgoing[origin(h)].push(h);
        }
        for list in &mut outgoing {
            list.sort_by(|&x, &y| angle(x).partial_cmp(&angle(y)).unwrap());
        }

        // next(h) = the outgoing half-edge at dest(h) that is the
        // clockwise predecessor of h's twin: bounded faces come out CCW.
        let twin = |h: usize| -> usize { h ^ 1 };
        let mut next = vec![usize::MAX; n_half];
        for h in 0..n_half {
            let at = dest(h);
            let list = &outgoing[at];
            let pos = list
                .iter()
                .position(|&o| o == twin(h))
                .expect("twin present in outgoing list");
            let prev = if pos == 0 { list.len() - 1 } else { pos - 1 };
            next[h] = list[prev];
        }

        // Walk cycles
        let mut visited = vec![false; n_half];
        let mut positive: Vec<Vec<Point2>> = Vec::new();
        let mut negative: Vec<Vec<Point2>> = Vec::new();
        for start in 0..n_half {
            if visited[start] {
                continue;
            }
            let mut cycle = Vec::new();
            let mut h = start;
            loop {
                visited[h] = true;
                cycle.push(verts[origin(h)]);
                h = next[h];
                if h == start {
                    break;
                }
                if cycle.len() > n_half {
                    // Corrupt linkage; bail out of this cycle
                    break;
                }
            }
            let cycle = strip_spikes(cycle, eps);
            if cycle.len() < 3 {
                continue;
            }
            let area = signed_area(&cycle);
            if area > eps * eps {
                positive.push(cycle);
            } else if area < -(eps * eps) {
                negative.push(cycle);
            }
        }

        // Assign each negative cycle to the smallest positive cycle that
        // contains it (different connected component); unmatched negative
        // cycles bound the unbounded face and are dropped.
        let mut regions: Vec<Region> = positive
            .into_iter()
            .map(|outer| Region {
                outer,
                holes: Vec::new(),
            })
            .collect();
        for hole in negative {
            let probe = polygon_centroid(&hole);
            let mut best: Option<(usize, f64)> = None;
            for (i, region) in regions.iter().enumerate() {
                let area = signed_area(&region.outer);
                if area <= signed_area(&hole).abs() {
                    continue;
                }
                if point_in_polygon(&probe, &region.outer, 0.0) {
                    match best {
                        Some((_, best_area)) if best_area <= area => {}
                        _ => best = Some((i, area)),
                    }
                }
            }
            if let Some((i, _)) = best {
                regions[i].holes.push(hole);
            }
        }

        regions
    }
}

/// Remove A-B-A spikes left by imprint segments that dangle into a
/// region's interior.
fn strip_spikes(mut pts: Vec<Point2>, eps: f64) -> Vec<Point2> {
    let mut changed = true;
    while changed && pts.len() >= 3 {
        changed = false;
        let n = pts.len();
        for i in 0..n {
            if (pts[(i + 2) % n] - pts[i]).norm() <= eps {
                let mut remove = [(i + 1) % n, (i + 2) % n];
                remove.sort_unstable();
                pts.remove(remove[1]);
                pts.remove(remove[0]);
                changed = true;
                break;
            }
        }
    }
    pts
}

fn polygon_centroid(points: &[Point2]) -> Point2 {
    let n = points.len().max(1) as f64;
    let sum = points
        .iter()
        .fold(Point2::origin(), |acc, p| Point2::new(acc.x + p.x, acc.y + p.y));
    Point2::new(sum.x / n, sum.y / n)
}
