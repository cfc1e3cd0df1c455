use crate::random::Random;
use crate::vector3::{Color, Point3, Vector3};

/// Reasonable for single-precision-grade geometry; used as the
/// near-parallel cutoff in the Möller–Trumbore test.
pub const EPSILON: f64 = 1.0 / 1_048_576.0; // 2^-20

/// Spatial tolerance for bounding boxes and octree cell containment
/// checks. Suitable for a scale of 1 metre == 1 numerical unit, with a
/// resolution of 1 millimetre.
pub const TOLERANCE: f64 = 1.0 / 1024.0;

/// Axis-aligned bounding box as `[min.x, min.y, min.z, max.x, max.y, max.z]`.
pub type Bound = [f64; 6];

/// A triangle with a diffuse reflectivity and an emitivity, the sole
/// surface primitive in the scene. Immutable once constructed — the
/// invariants below are enforced at construction time, not re-checked.
///
/// # Invariants
/// - `reflectivity` components are clamped to `[0, 1]`.
/// - `emitivity` components are clamped to `[0, ∞)`.
#[derive(Debug, Clone)]
pub struct Triangle {
    pub vertices: [Point3; 3],
    pub reflectivity: Color,
    pub emitivity: Color,
}

impl Triangle {
    pub fn new(vertices: [Point3; 3], reflectivity: Color, emitivity: Color) -> Self {
        Self {
            vertices,
            reflectivity: reflectivity.clamped(Vector3::zero(), Vector3::one()),
            emitivity: emitivity.clamped(Vector3::zero(), Vector3::new(f64::MAX, f64::MAX, f64::MAX)),
        }
    }

    /// Unnormalized normal, `(v1-v0) × (v2-v1)`.
    fn normal_unnormalized(&self) -> Vector3 {
        let edge1 = self.vertices[1] - self.vertices[0];
        let edge3 = self.vertices[2] - self.vertices[1];
        edge1.cross(edge3)
    }

    pub fn normal(&self) -> Vector3 {
        self.normal_unnormalized().unitize()
    }

    pub fn tangent(&self) -> Vector3 {
        (self.vertices[1] - self.vertices[0]).unitize()
    }

    /// Half the area of the parallelogram formed by two edges.
    pub fn area(&self) -> f64 {
        let n = self.normal_unnormalized();
        n.dot(n).sqrt() * 0.5
    }

    /// Bounding box expanded by `TOLERANCE` on every face, so axis-aligned
    /// triangles don't produce a degenerate (zero-thickness) box that the
    /// octree's overlap tests would mishandle.
    pub fn bound(&self) -> Bound {
        let mut b = [
            self.vertices[2].x,
            self.vertices[2].y,
            self.vertices[2].z,
            self.vertices[2].x,
            self.vertices[2].y,
            self.vertices[2].z,
        ];
        for v in &self.vertices {
            let comps = [v.x, v.y, v.z];
            for m in 0..3 {
                let lo = comps[m] - TOLERANCE;
                let hi = comps[m] + TOLERANCE;
                if lo < b[m] {
                    b[m] = lo;
                }
                if hi > b[m + 3] {
                    b[m + 3] = hi;
                }
            }
        }
        b
    }

    /// Möller–Trumbore ray-triangle intersection. Returns the forward
    /// hit distance, or `None` if the ray misses, is parallel to the
    /// triangle's plane, or the intersection lies behind the origin.
    pub fn intersect(&self, origin: Point3, direction: Vector3) -> Option<f64> {
        let edge1 = self.vertices[1] - self.vertices[0];
        let edge2 = self.vertices[2] - self.vertices[0];
        let p = direction.cross(edge2);
        let det = edge1.dot(p);
        if !(-EPSILON..=EPSILON).contains(&det) {
            let inv_det = 1.0 / det;
            let t_vec = origin - self.vertices[0];
            let u = t_vec.dot(p) * inv_det;
            if (0.0..=1.0).contains(&u) {
                let q = t_vec.cross(edge1);
                let v = direction.dot(q) * inv_det;
                if v >= 0.0 && u + v <= 1.0 {
                    let t = edge2.dot(q) * inv_det;
                    if t >= 0.0 {
                        return Some(t);
                    }
                }
            }
        }
        None
    }

    /// Uniformly samples a point on the triangle from two uniform reals
    /// via the square-root barycentric transform.
    pub fn sample_point(&self, rng: &mut Random) -> Point3 {
        let sqr1 = rng.next_f64().sqrt();
        let r2 = rng.next_f64();

        let c0 = 1.0 - sqr1;
        let c1 = (1.0 - r2) * sqr1;

        let a0 = self.vertices[1] - self.vertices[0];
        let a1 = self.vertices[2] - self.vertices[0];

        self.vertices[0] + a0 * c0 + a1 * c1
    }
}
