//! A ray-triangle hit, and the light transport queries evaluated there.

use crate::random::Random;
use crate::triangle::Triangle;
use crate::vector3::{Color, Point3, Vector3};

const PI: f64 = std::f64::consts::PI;

/// A point on a triangle's surface, identified by the triangle's stable
/// index rather than a borrowed reference — this is what lets the path
/// tracer carry a "last hit" across an intersection query without
/// fighting the borrow checker.
#[derive(Debug, Clone, Copy)]
pub struct SurfacePoint {
    pub triangle_id: u32,
    pub position: Point3,
}

impl SurfacePoint {
    pub fn new(triangle_id: u32, position: Point3) -> Self {
        Self {
            triangle_id,
            position,
        }
    }

    /// Emission from this surface element toward `to_position`, seen along
    /// `out_direction`. When `is_solid_angle` the emission is converted from
    /// radiant exitance to solid-angle-weighted radiance for direct
    /// (next-event) sampling; otherwise it's the raw emitted radiance used
    /// when a path ray happens to hit an emitter head-on.
    pub fn emission(
        &self,
        triangle: &Triangle,
        to_position: Point3,
        out_direction: Vector3,
        is_solid_angle: bool,
    ) -> Color {
        let ray = to_position - self.position;
        let distance2 = ray.dot(ray);
        let normal = triangle.normal();
        let cos_out = out_direction.dot(normal);
        let area = triangle.area();

        if cos_out <= 0.0 {
            return Color::zero();
        }

        let solid_angle = if is_solid_angle {
            (cos_out * area) / distance2.max(1e-6)
        } else {
            1.0
        };

        triangle.emitivity * solid_angle
    }

    /// Reflected radiance for light arriving along `in_direction` with
    /// `in_radiance`, leaving along `out_direction`. Ideal diffuse BRDF:
    /// reflectivity scaled by cosine and `1/pi`, zero if the two directions
    /// fall on opposite sides of the surface (no transmission).
    pub fn reflection(
        &self,
        triangle: &Triangle,
        in_direction: Vector3,
        in_radiance: Color,
        out_direction: Vector3,
    ) -> Color {
        let normal = triangle.normal();
        let in_dot = in_direction.dot(normal);
        let out_dot = out_direction.dot(normal);

        let is_same_side = !((in_dot < 0.0) ^ (out_dot < 0.0));
        if !is_same_side {
            return Color::zero();
        }

        let r = in_radiance.hadamard(triangle.reflectivity);
        r * (in_dot.abs() / PI)
    }

    /// Monte-Carlo-samples a reflected direction and its associated color
    /// weight, or returns `None` if Russian roulette kills the path or the
    /// sampled direction degenerates to zero.
    pub fn next_direction(
        &self,
        triangle: &Triangle,
        rng: &mut Random,
        in_direction: Vector3,
    ) -> Option<(Vector3, Color)> {
        let reflectivity_mean = triangle.reflectivity.dot(Vector3::one()) / 3.0;

        if rng.next_f64() >= reflectivity_mean {
            return None;
        }

        let two_pi_r1 = PI * 2.0 * rng.next_f64();
        let sr2 = rng.next_f64().sqrt();

        let x = two_pi_r1.cos() * sr2;
        let y = two_pi_r1.sin() * sr2;
        let z = (1.0 - sr2 * sr2).sqrt();

        let t = triangle.tangent();
        let mut n = triangle.normal();
        if n.dot(in_direction) < 0.0 {
            n = -n;
        }
        let c = n.cross(t);

        let out_direction = t * x + c * y + n * z;
        if out_direction.is_zero() {
            return None;
        }

        let color = triangle.reflectivity * (1.0 / reflectivity_mean);
        Some((out_direction, color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitter_triangle() -> Triangle {
        Triangle::new(
            [
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            Color::zero(),
            Color::new(1.0, 1.0, 1.0),
        )
    }

    #[test]
    fn emission_is_zero_from_the_back_face() {
        let t = emitter_triangle();
        let s = SurfacePoint::new(0, Point3::new(0.25, 0.25, 0.0));
        let e = s.emission(&t, Point3::new(0.25, 0.25, -1.0), Vector3::new(0.0, 0.0, -1.0), false);
        assert_eq!(e, Color::zero());
    }

    #[test]
    fn emission_is_positive_from_the_front_face() {
        let t = emitter_triangle();
        let s = SurfacePoint::new(0, Point3::new(0.25, 0.25, 0.0));
        let e = s.emission(&t, Point3::new(0.25, 0.25, 1.0), Vector3::new(0.0, 0.0, 1.0), false);
        assert_eq!(e, Color::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn solid_angle_emission_falls_off_with_distance_squared() {
        let t = emitter_triangle();
        let s = SurfacePoint::new(0, Point3::new(0.25, 0.25, 0.0));
        let near = s.emission(&t, Point3::new(0.25, 0.25, 1.0), Vector3::new(0.0, 0.0, 1.0), true);
        let far = s.emission(&t, Point3::new(0.25, 0.25, 2.0), Vector3::new(0.0, 0.0, 1.0), true);
        assert!(near.x > far.x);
        assert!((near.x / far.x - 4.0).abs() < 1e-9);
    }

    #[test]
    fn reflection_is_zero_across_the_surface() {
        let t = Triangle::new(
            [
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            Color::new(0.8, 0.8, 0.8),
            Color::zero(),
        );
        let s = SurfacePoint::new(0, Point3::new(0.25, 0.25, 0.0));
        let r = s.reflection(
            &t,
            Vector3::new(0.0, 0.0, 1.0),
            Color::new(1.0, 1.0, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
        );
        assert_eq!(r, Color::zero());
    }

    #[test]
    fn next_direction_stays_on_the_illuminated_side() {
        let t = Triangle::new(
            [
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            Color::new(0.9, 0.9, 0.9),
            Color::zero(),
        );
        let s = SurfacePoint::new(0, Point3::new(0.25, 0.25, 0.0));
        let mut rng = Random::new();
        let mut sampled = 0;
        for _ in 0..200 {
            if let Some((dir, color)) = s.next_direction(&t, &mut rng, Vector3::new(0.0, 0.0, -1.0)) {
                sampled += 1;
                assert!(dir.dot(Vector3::new(0.0, 0.0, -1.0)) >= -1e-9);
                assert!(color.x > 0.0 && color.y > 0.0 && color.z > 0.0);
            }
        }
        assert!(sampled > 0);
    }
}
