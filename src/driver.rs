//! Progressive-refinement render loop: reads a model file, renders frames
//! one at a time, and snapshots the accumulated image to disk on a
//! doubling schedule so a long render is always resumable from its last
//! write.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::camera::Camera;
use crate::error::{MiniLightError, Result};
use crate::image::Image;
use crate::model_reader::ModelReader;
use crate::random::Random;
use crate::scene::Scene;

const MODEL_FORMAT_ID: &str = "#MiniLight";

pub struct ModelFile {
    pub iterations: i32,
    pub image: Image,
    pub camera: Camera,
    pub scene: Scene,
}

/// Parses a model file's contents in the order the format defines: the
/// `#MiniLight` identifier, iteration count, image dimensions, view
/// definition, then the scene (background and triangles).
pub fn read_model(bytes: Vec<u8>) -> Result<ModelFile> {
    let mut reader = ModelReader::new(bytes);
    reader.check_format_id(MODEL_FORMAT_ID)?;

    let iterations = reader.next_i32()?.max(0);
    let image = Image::read(&mut reader)?;
    let camera = Camera::read(&mut reader)?;
    let scene = Scene::read(&mut reader, camera.view_position)?;

    Ok(ModelFile {
        iterations,
        image,
        camera,
        scene,
    })
}

/// Output filename: `<model path>.<8-hex-digit id>.rgbe`.
pub fn output_path(model_path: &Path, random: &Random) -> PathBuf {
    let mut name = model_path.as_os_str().to_owned();
    name.push(".");
    name.push(random.id());
    name.push(".rgbe");
    PathBuf::from(name)
}

/// Runs the progressive-refinement loop, writing a snapshot at frame 1,
/// every frame count that is a power of two, and the final frame — the
/// same "twice error-halving rate, plus start and end" schedule the
/// original renderer uses, so interrupting early still leaves a usable image.
pub fn render_progressively(
    iterations: i32,
    camera: &Camera,
    scene: &Scene,
    random: &mut Random,
    output_path: &Path,
    image: &mut Image,
    interrupted: &Arc<AtomicBool>,
) -> Result<()> {
    for frame_no in 1..=iterations {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }

        eprint!("\riteration: {frame_no}");

        camera.frame(scene, random, image);

        if (frame_no & (frame_no - 1)) == 0 || iterations == frame_no {
            write_snapshot(output_path, frame_no, image)?;
        }
    }

    Ok(())
}

fn write_snapshot(output_path: &Path, frame_no: i32, image: &Image) -> Result<()> {
    let file = File::create(output_path).map_err(MiniLightError::WriteIo)?;
    let mut writer = BufWriter::new(file);
    image.write_rgbe(frame_no, &mut writer)
}

/// Installs the Ctrl-C handler used by the progressive render loop: rather
/// than exiting the process immediately (which would skip the final
/// snapshot), it flips a flag the loop checks between frames.
pub fn install_interrupt_handler() -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    let _ = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    });
    interrupted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> Vec<u8> {
        b"#MiniLight\n\
          2\n\
          4 3\n\
          (0 0.75 -2) (0 0 1) 45\n\
          (3626 5572 5802) (0.1 0.09 0.07)\n\
          (0 0 0) (0 1 0) (1 1 0) (0.7 0.7 0.7) (0 0 0)\n"
            .to_vec()
    }

    #[test]
    fn parses_a_complete_model_file() {
        let model = read_model(sample_model()).unwrap();
        assert_eq!(model.iterations, 2);
        assert_eq!(model.image.width(), 4);
        assert_eq!(model.image.height(), 3);
    }

    #[test]
    fn negative_iterations_clamp_to_zero() {
        let body = b"#MiniLight\n-5\n4 3\n(0 0 0) (0 0 1) 45\n(0 0 0) (0 0 0)\n".to_vec();
        let model = read_model(body).unwrap();
        assert_eq!(model.iterations, 0);
    }

    #[test]
    fn rejects_a_file_with_the_wrong_format_id() {
        let body = b"not-minilight\n".to_vec();
        assert!(matches!(
            read_model(body),
            Err(MiniLightError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn output_path_embeds_the_random_id_and_rgbe_extension() {
        let random = Random::from_seed([1, 2, 3, 0xDEAD_BEEF]);
        let path = output_path(Path::new("scene.ml.txt"), &random);
        assert_eq!(path, PathBuf::from("scene.ml.txt.DEADBEEF.rgbe"));
    }
}
