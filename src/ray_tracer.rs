//! Recursive path-tracing estimator: a single ray-step chain advances from
//! the eye into the scene, sampling one emitter at every surface it hits.

use crate::random::Random;
use crate::scene::Scene;
use crate::surface_point::SurfacePoint;
use crate::vector3::{Color, Point3, Vector3};

/// Backstop against unbounded recursion on scenes whose Russian roulette
/// keeps surviving; no ordinary render approaches this depth.
const MAX_DEPTH: u32 = 1000;

pub struct RayTracer<'a> {
    scene: &'a Scene,
}

impl<'a> RayTracer<'a> {
    pub fn new(scene: &'a Scene) -> Self {
        Self { scene }
    }

    /// Radiance returned along the ray from `ray_origin` toward
    /// `ray_direction`. `last_hit` is the surface the ray was just reflected
    /// from, excluded from the intersection test to avoid self-shadowing.
    pub fn radiance(
        &self,
        ray_origin: Point3,
        ray_direction: Vector3,
        rng: &mut Random,
        last_hit: Option<u32>,
    ) -> Color {
        self.radiance_at_depth(ray_origin, ray_direction, rng, last_hit, 0)
    }

    fn radiance_at_depth(
        &self,
        ray_origin: Point3,
        ray_direction: Vector3,
        rng: &mut Random,
        last_hit: Option<u32>,
        depth: u32,
    ) -> Color {
        let ray_back_direction = -ray_direction;

        let Some(surface) = self.scene.intersect(ray_origin, ray_direction, last_hit) else {
            return self.scene.default_emission(ray_back_direction);
        };
        let triangle = self.scene.triangle(surface.triangle_id);

        // Local emission only matters for the ray's very first hit: an
        // emitter encountered later is already accounted for by the
        // explicit emitter sample at the previous hop.
        let local_emission = if last_hit.is_none() {
            surface.emission(triangle, ray_origin, ray_back_direction, false)
        } else {
            Color::zero()
        };

        let emitter_sample = self.sample_emitters(ray_back_direction, &surface, rng);

        let recursed_reflection = if depth < MAX_DEPTH {
            match surface.next_direction(triangle, rng, ray_back_direction) {
                Some((next_direction, color)) => {
                    let recursed = self.radiance_at_depth(
                        surface.position,
                        next_direction,
                        rng,
                        Some(surface.triangle_id),
                        depth + 1,
                    );
                    recursed.hadamard(color)
                }
                None => Color::zero(),
            }
        } else {
            Color::zero()
        };

        local_emission + emitter_sample + recursed_reflection
    }

    /// Radiance reflected toward the ray from a single sampled emitter
    /// point, debiased by the emitter count (one-sample Monte Carlo
    /// estimate of the sum over all emitters).
    fn sample_emitters(
        &self,
        ray_back_direction: Vector3,
        surface: &SurfacePoint,
        rng: &mut Random,
    ) -> Color {
        let Some(emitter) = self.scene.sample_emitter(rng) else {
            return Color::zero();
        };

        let emit_vector = emitter.position - surface.position;
        let emit_direction = emit_vector.unitize();

        let shadow_hit = self
            .scene
            .intersect(surface.position, emit_direction, Some(surface.triangle_id));

        let unshadowed = match shadow_hit {
            None => true,
            Some(hit) => hit.triangle_id == emitter.triangle_id,
        };
        if !unshadowed {
            return Color::zero();
        }

        let emitter_triangle = self.scene.triangle(emitter.triangle_id);
        let back_emit_direction = -emit_direction;
        let emission_in = emitter.emission(emitter_triangle, surface.position, back_emit_direction, true);
        let emission_all = emission_in * self.scene.emitters_count() as f64;

        let surface_triangle = self.scene.triangle(surface.triangle_id);
        surface.reflection(surface_triangle, emit_direction, emission_all, ray_back_direction)
    }
}
