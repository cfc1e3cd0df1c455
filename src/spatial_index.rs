//! Axis-aligned octree accelerating nearest ray-triangle queries.
//!
//! Nodes live in a flat arena (`Vec<Node>`) indexed by `u32`, rather than
//! pointer-chasing a tree of boxes — this keeps the whole structure one
//! contiguous allocation and makes child/triangle references stable,
//! plain indices instead of borrowed pointers.

use crate::triangle::{Bound, Triangle, TOLERANCE};
use crate::vector3::{Point3, Vector3};

/// Accommodates a scene including sun and earth, down to centimetre cells.
const MAX_LEVELS: u32 = 44;
/// 8 items per leaf is a reasonable balance found by casual testing in the
/// original renderer; kept unchanged here.
const MAX_ITEMS: usize = 8;

enum Node {
    Branch {
        bound: Bound,
        children: [Option<u32>; 8],
    },
    Leaf {
        bound: Bound,
        items: Vec<u32>,
    },
}

/// Octree over a fixed triangle array. Holds only triangle *indices*; the
/// triangle storage itself lives in `Scene` and must outlive every query.
pub struct SpatialIndex {
    nodes: Vec<Node>,
    root: u32,
}

fn center(bound: &Bound) -> [f64; 3] {
    [
        (bound[0] + bound[3]) * 0.5,
        (bound[1] + bound[4]) * 0.5,
        (bound[2] + bound[5]) * 0.5,
    ]
}

/// Subcell `s`'s bound within `parent`, where bit `axis` of `s` selects the
/// high (1) or low (0) half of `parent` along that axis.
fn subcell_bound(parent: &Bound, s: usize) -> Bound {
    let c = center(parent);
    let mut b = *parent;
    for axis in 0..3 {
        let high = (s >> axis) & 1 == 1;
        if high {
            b[axis] = c[axis];
        } else {
            b[axis + 3] = c[axis];
        }
    }
    b
}

fn overlaps(cell: &Bound, item: &Bound) -> bool {
    (0..3).all(|m| item[m + 3] >= cell[m] && item[m] <= cell[m + 3])
}

struct Builder {
    bounds: Vec<Bound>,
    nodes: Vec<Node>,
}

impl Builder {
    /// Recursively builds the node for `items` within `bound`, returning its
    /// arena index. `level` tracks depth so construction can bail out into
    /// a leaf once `MAX_LEVELS` or `MAX_ITEMS` is reached.
    fn build_node(&mut self, bound: Bound, items: &[u32], level: u32) -> u32 {
        let is_branch = items.len() > MAX_ITEMS && level < MAX_LEVELS - 1;

        if !is_branch {
            let idx = self.nodes.len() as u32;
            self.nodes.push(Node::Leaf {
                bound,
                items: items.to_vec(),
            });
            return idx;
        }

        let idx = self.nodes.len() as u32;
        self.nodes.push(Node::Branch {
            bound,
            children: [None; 8],
        });

        let mut children: [Option<u32>; 8] = [None; 8];
        let mut degenerate_siblings = 0u32;

        for s in (0..8).rev() {
            let sub_bound = subcell_bound(&bound, s);
            let sub_items: Vec<u32> = items
                .iter()
                .copied()
                .filter(|&i| overlaps(&sub_bound, &self.bounds[i as usize]))
                .collect();

            if sub_items.len() == items.len() {
                degenerate_siblings += 1;
            }

            if sub_items.is_empty() {
                continue;
            }

            // Curtail degenerate subdivision: two or more sibling cells each
            // copying the entire parent contents, or a cell shrinking below
            // millimetre scale, force immediate leaf termination. A single
            // whole-parent-copying sibling is tolerated (needed for scenes
            // with one enormous item, e.g. a sun-sized triangle).
            let extent = sub_bound[3] - sub_bound[0];
            let next_level = if degenerate_siblings > 1 || extent < TOLERANCE * 4.0 {
                MAX_LEVELS
            } else {
                level + 1
            };

            children[s] = Some(self.build_node(sub_bound, &sub_items, next_level));
        }

        self.nodes[idx as usize] = Node::Branch { bound, children };
        idx
    }
}

impl SpatialIndex {
    /// Builds the octree over `triangles`, with the root bound expanded to
    /// include `eye` (so a ray's launch point always starts inside the
    /// root, simplifying traversal) and inflated to a cube.
    pub fn build(eye: Point3, triangles: &[Triangle]) -> Self {
        let bounds: Vec<Bound> = triangles.iter().map(Triangle::bound).collect();

        let mut root_bound: Bound = [eye.x, eye.y, eye.z, eye.x, eye.y, eye.z];
        for b in &bounds {
            for m in 0..3 {
                if b[m] < root_bound[m] {
                    root_bound[m] = b[m];
                }
                if b[m + 3] > root_bound[m + 3] {
                    root_bound[m + 3] = b[m + 3];
                }
            }
        }
        let max_extent = (0..3)
            .map(|m| root_bound[m + 3] - root_bound[m])
            .fold(0.0_f64, f64::max);
        for m in 0..3 {
            let candidate = root_bound[m] + max_extent;
            if root_bound[m + 3] < candidate {
                root_bound[m + 3] = candidate;
            }
        }

        let mut builder = Builder {
            bounds,
            nodes: Vec::new(),
        };
        let items: Vec<u32> = (0..triangles.len() as u32).collect();
        let root = builder.build_node(root_bound, &items, 0);

        Self {
            nodes: builder.nodes,
            root,
        }
    }

    /// Finds the nearest triangle the ray hits, excluding `last_hit` (the
    /// surface the ray is launched from, to avoid spurious self-intersection).
    /// Returns the hit triangle index and world-space hit position.
    pub fn nearest_hit(
        &self,
        triangles: &[Triangle],
        ray_origin: Point3,
        ray_direction: Vector3,
        last_hit: Option<u32>,
    ) -> Option<(u32, Point3)> {
        self.intersect_from(self.root, triangles, ray_origin, ray_direction, last_hit, ray_origin)
    }

    fn intersect_from(
        &self,
        node: u32,
        triangles: &[Triangle],
        ray_origin: Point3,
        ray_direction: Vector3,
        last_hit: Option<u32>,
        start: Point3,
    ) -> Option<(u32, Point3)> {
        match &self.nodes[node as usize] {
            Node::Leaf { bound, items } => {
                let mut nearest_distance = f64::MAX;
                let mut best = None;
                for &item in items {
                    if Some(item) == last_hit {
                        continue;
                    }
                    let tri = &triangles[item as usize];
                    if let Some(distance) = tri.intersect(ray_origin, ray_direction) {
                        if distance < nearest_distance {
                            let hit = ray_origin + ray_direction * distance;
                            let inside = bound[0] - hit.x <= TOLERANCE
                                && hit.x - bound[3] <= TOLERANCE
                                && bound[1] - hit.y <= TOLERANCE
                                && hit.y - bound[4] <= TOLERANCE
                                && bound[2] - hit.z <= TOLERANCE
                                && hit.z - bound[5] <= TOLERANCE;
                            if inside {
                                nearest_distance = distance;
                                best = Some((item, hit));
                            }
                        }
                    }
                }
                best
            }
            Node::Branch { bound, children } => {
                let c = center(bound);
                let mut subcell = 0usize;
                for axis in 0..3 {
                    if start[axis] >= c[axis] {
                        subcell |= 1 << axis;
                    }
                }

                let mut cell_position = start;
                loop {
                    if let Some(child) = children[subcell] {
                        if let Some(hit) = self.intersect_from(
                            child,
                            triangles,
                            ray_origin,
                            ray_direction,
                            last_hit,
                            cell_position,
                        ) {
                            return Some(hit);
                        }
                    }

                    // Find which face of the corner ahead is crossed first,
                    // recomputing distances from the original ray origin
                    // (not `cell_position`) to avoid accumulating drift.
                    let mut step = [0.0_f64; 3];
                    for axis in 0..3 {
                        let high = (subcell >> axis) & 1 == 1;
                        let outward = ray_direction[axis] < 0.0;
                        let face = if outward ^ high {
                            bound[axis + if high { 3 } else { 0 }]
                        } else {
                            c[axis]
                        };
                        step[axis] = (face - ray_origin[axis]) / ray_direction[axis];
                    }
                    let mut axis = 0usize;
                    for a in 1..3 {
                        if step[a] < step[axis] {
                            axis = a;
                        }
                    }

                    // Leaving the branch: direction negative and subcell low,
                    // or direction positive and subcell high.
                    let high_bit = (subcell >> axis) & 1 == 1;
                    if high_bit ^ (ray_direction[axis] < 0.0) {
                        return None;
                    }

                    cell_position = ray_origin + ray_direction * step[axis];
                    subcell ^= 1 << axis;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector3::Color;

    fn brute_force(
        triangles: &[Triangle],
        origin: Point3,
        direction: Vector3,
        last_hit: Option<u32>,
    ) -> Option<(u32, f64)> {
        let mut best: Option<(u32, f64)> = None;
        for (i, t) in triangles.iter().enumerate() {
            if Some(i as u32) == last_hit {
                continue;
            }
            if let Some(d) = t.intersect(origin, direction) {
                if best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((i as u32, d));
                }
            }
        }
        best
    }

    fn scattered_triangles() -> Vec<Triangle> {
        let mut tris = Vec::new();
        for i in 0..40 {
            let off = i as f64 * 0.37;
            tris.push(Triangle::new(
                [
                    Point3::new(off, 0.0, off),
                    Point3::new(off + 1.0, 0.0, off),
                    Point3::new(off, 1.0, off),
                ],
                Color::new(0.5, 0.5, 0.5),
                Color::zero(),
            ));
        }
        tris
    }

    #[test]
    fn matches_brute_force_nearest_hit() {
        let triangles = scattered_triangles();
        let index = SpatialIndex::build(Point3::new(-5.0, 0.5, -5.0), &triangles);

        let origin = Point3::new(-5.0, 0.5, -5.0);
        for i in 0..20 {
            let dir = Vector3::new(1.0, 0.0, (i as f64) * 0.01).unitize();
            let got = index.nearest_hit(&triangles, origin, dir, None);
            let expect = brute_force(&triangles, origin, dir, None);
            match (got, expect) {
                (Some((gi, _)), Some((ei, ed))) => {
                    let gd = triangles[gi as usize].intersect(origin, dir).unwrap();
                    assert!((gd - ed).abs() < 1e-6 || gi == ei);
                }
                (None, None) => {}
                other => panic!("mismatch: {other:?}"),
            }
        }
    }

    #[test]
    fn excludes_last_hit_triangle() {
        let triangles = scattered_triangles();
        let index = SpatialIndex::build(Point3::new(-5.0, 0.5, -5.0), &triangles);
        let origin = Point3::new(-5.0, 0.5, -5.0);
        let dir = Vector3::new(1.0, 0.0, 0.0);
        let first = index.nearest_hit(&triangles, origin, dir, None).unwrap();
        let second = index.nearest_hit(&triangles, origin, dir, Some(first.0));
        assert_ne!(second.map(|(i, _)| i), Some(first.0));
    }
}
