//! View definition and per-pixel stratified sampling.

use crate::error::Result;
use crate::image::Image;
use crate::model_reader::ModelReader;
use crate::random::Random;
use crate::ray_tracer::RayTracer;
use crate::scene::Scene;
use crate::vector3::{Point3, Vector3};

const PI: f64 = std::f64::consts::PI;

/// View angle bounds, in degrees.
pub const VIEW_ANGLE_MIN: f64 = 10.0;
pub const VIEW_ANGLE_MAX: f64 = 160.0;

/// Eye position and an orthonormal view frame (`view_direction`, `right`,
/// `up`) built from the model file's view definition.
pub struct Camera {
    pub view_position: Point3,
    view_angle: f64,
    view_direction: Vector3,
    right: Vector3,
    up: Vector3,
}

impl Camera {
    pub fn read(reader: &mut ModelReader) -> Result<Self> {
        let view_position = reader.next_vector()?;
        let mut view_direction = reader.next_vector()?.unitize();
        let view_angle_degrees = reader.next_f64()?;

        if view_direction.is_zero() {
            view_direction = Vector3::unit_z();
        }

        let view_angle = view_angle_degrees.clamp(VIEW_ANGLE_MIN, VIEW_ANGLE_MAX) * (PI / 180.0);

        // Trial 'right', assuming 'up' is Y; if that's degenerate (view
        // direction colinear with Y), redo with Z (or -Z if looking down).
        let trial_right = Vector3::unit_y().cross(view_direction).unitize();
        let (up, right) = if !trial_right.is_zero() {
            (view_direction.cross(trial_right).unitize(), trial_right)
        } else {
            let z = if view_direction.y < 0.0 {
                Vector3::unit_z()
            } else {
                -Vector3::unit_z()
            };
            (z, z.cross(view_direction).unitize())
        };

        Ok(Self {
            view_position,
            view_angle,
            view_direction,
            right,
            up,
        })
    }

    /// Accumulates one frame of samples (one sample per pixel, jittered)
    /// into `image`.
    pub fn frame(&self, scene: &Scene, rng: &mut Random, image: &mut Image) {
        let ray_tracer = RayTracer::new(scene);
        let width = image.width() as f64;
        let height = image.height() as f64;
        let tan_view = (self.view_angle * 0.5).tan();

        for y in 0..image.height() {
            for x in 0..image.width() {
                let cx = (((x as f64 + rng.next_f64()) * 2.0 / width) - 1.0) * tan_view;
                let cy = (((y as f64 + rng.next_f64()) * 2.0 / height) - 1.0)
                    * tan_view
                    * (height / width);

                let offset = self.right * cx + self.up * cy;
                let sample_direction = (self.view_direction + offset).unitize();

                let radiance = ray_tracer.radiance(self.view_position, sample_direction, rng, None);
                image.add_to_pixel(x, y, radiance);
            }
        }
    }
}
