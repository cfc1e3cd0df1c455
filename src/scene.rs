//! The collection of objects in the environment: triangles, their derived
//! emitter list, a spatial index over them, and the background sky/ground.

use crate::error::Result;
use crate::model_reader::ModelReader;
use crate::random::Random;
use crate::spatial_index::SpatialIndex;
use crate::surface_point::SurfacePoint;
use crate::triangle::Triangle;
use crate::vector3::{Color, Point3, Vector3};

/// 2^24 objects, matching the original's allocation ceiling.
pub const MAX_TRIANGLES: usize = 0x0100_0000;

pub struct Scene {
    triangles: Vec<Triangle>,
    emitter_ids: Vec<u32>,
    index: SpatialIndex,
    sky_emission: Color,
    ground_reflection: Color,
}

impl Scene {
    /// Reads the sky/ground background and the triangle list from `reader`,
    /// then builds the spatial index over them around `eye`.
    pub fn read(reader: &mut ModelReader, eye: Point3) -> Result<Self> {
        let huge = Vector3::new(f64::MAX, f64::MAX, f64::MAX);
        let sky_emission = reader.next_vector()?.clamped(Vector3::zero(), huge);
        let ground_reflection = reader.next_vector()?.clamped(Vector3::zero(), Vector3::one());

        let mut triangles = Vec::new();
        while triangles.len() < MAX_TRIANGLES && reader.has_more() {
            triangles.push(read_triangle(reader)?);
        }

        let emitter_ids = triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.emitivity.is_zero() && t.area() > 0.0)
            .map(|(i, _)| i as u32)
            .collect();

        let index = SpatialIndex::build(eye, &triangles);

        Ok(Self {
            triangles,
            emitter_ids,
            index,
            sky_emission,
            ground_reflection,
        })
    }

    pub fn triangle(&self, id: u32) -> &Triangle {
        &self.triangles[id as usize]
    }

    pub fn emitters_count(&self) -> usize {
        self.emitter_ids.len()
    }

    /// Nearest intersection of the ray with the scene, excluding the
    /// surface the ray is launched from (if any).
    pub fn intersect(
        &self,
        ray_origin: Point3,
        ray_direction: Vector3,
        last_hit: Option<u32>,
    ) -> Option<SurfacePoint> {
        self.index
            .nearest_hit(&self.triangles, ray_origin, ray_direction, last_hit)
            .map(|(id, pos)| SurfacePoint::new(id, pos))
    }

    /// Monte-Carlo samples a point on a Monte-Carlo-selected emitter.
    /// Returns `None` if the scene has no emitters.
    pub fn sample_emitter(&self, rng: &mut Random) -> Option<SurfacePoint> {
        if self.emitter_ids.is_empty() {
            return None;
        }
        let index = ((rng.next_f64() * self.emitter_ids.len() as f64).floor() as usize)
            .min(self.emitter_ids.len() - 1);
        let id = self.emitter_ids[index];
        let position = self.triangles[id as usize].sample_point(rng);
        Some(SurfacePoint::new(id, position))
    }

    /// Background radiance for a ray that hit nothing: sky for a downward
    /// ray, ground (tinted by sky) for an upward one.
    pub fn default_emission(&self, back_direction: Vector3) -> Color {
        if back_direction.y < 0.0 {
            self.sky_emission
        } else {
            self.sky_emission.hadamard(self.ground_reflection)
        }
    }
}

fn read_triangle(reader: &mut ModelReader) -> Result<Triangle> {
    let vertices = [
        reader.next_vector()?,
        reader.next_vector()?,
        reader.next_vector()?,
    ];
    let reflectivity = reader.next_vector()?;
    let emitivity = reader.next_vector()?;
    Ok(Triangle::new(vertices, reflectivity, emitivity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model_body() -> Vec<u8> {
        b"(3626 5572 5802) (0.1 0.09 0.07)\n\
          (0 0 0) (0 1 0) (1 1 0) (0.7 0.7 0.7) (0 0 0)\n\
          (0 0 1) (0 1 1) (1 1 1) (0 0 0) (1 1 1)\n"
            .to_vec()
    }

    #[test]
    fn reads_background_and_triangles() {
        let mut reader = ModelReader::new(sample_model_body());
        let scene = Scene::read(&mut reader, Point3::new(0.5, 0.5, -2.0)).unwrap();
        assert_eq!(scene.triangles.len(), 2);
        assert_eq!(scene.emitters_count(), 1);
        assert_eq!(scene.sky_emission, Color::new(3626.0, 5572.0, 5802.0));
    }

    #[test]
    fn default_emission_distinguishes_up_from_down() {
        let mut reader = ModelReader::new(sample_model_body());
        let scene = Scene::read(&mut reader, Point3::new(0.5, 0.5, -2.0)).unwrap();
        let down = scene.default_emission(Vector3::new(0.0, -1.0, 0.0));
        let up = scene.default_emission(Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(down, scene.sky_emission);
        assert_eq!(up, scene.sky_emission.hadamard(scene.ground_reflection));
    }

    #[test]
    fn intersect_finds_the_nearer_triangle() {
        let mut reader = ModelReader::new(sample_model_body());
        let scene = Scene::read(&mut reader, Point3::new(0.5, 0.5, -2.0)).unwrap();
        let hit = scene.intersect(Point3::new(0.25, 0.25, -2.0), Vector3::new(0.0, 0.0, 1.0), None);
        assert!(hit.is_some());
    }

    #[test]
    fn sample_emitter_returns_none_when_scene_has_no_emitters() {
        let body = b"(0 0 0) (0 0 0)\n(0 0 0) (0 1 0) (1 1 0) (0.5 0.5 0.5) (0 0 0)\n".to_vec();
        let mut reader = ModelReader::new(body);
        let scene = Scene::read(&mut reader, Point3::zero()).unwrap();
        let mut rng = Random::new();
        assert!(scene.sample_emitter(&mut rng).is_none());
    }
}
