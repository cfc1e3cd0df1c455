//! Peripheral tool: combines several partial RGBE renders of the same
//! model into one properly-weighted image, summing each input's
//! accumulated radiance scaled by its own iteration count. Mismatched or
//! unreadable inputs are skipped with a warning rather than aborting the
//! whole merge.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;

use minilight::error::MiniLightError;
use minilight::image::Image;

const MAX_INPUTS: usize = 256;

#[derive(Parser, Debug)]
#[command(
    name = "minilight-merge",
    about = "Merges several MiniLight RGBE snapshots of the same model into one"
)]
struct Cli {
    /// RGBE files to merge, at least one. All should share dimensions;
    /// mismatches are skipped with a warning.
    #[arg(required = true, num_args = 1..)]
    rgbe_files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("\n*** execution failed:  {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> minilight::Result<()> {
    let first_bytes = fs::read(&cli.rgbe_files[0]).map_err(MiniLightError::File)?;
    let (first_image, _) = Image::read_rgbe(&first_bytes)?;
    println!("size:  {} {}", first_image.width(), first_image.height());

    let mut sum = Image::new(first_image.width(), first_image.height());
    let mut total_iterations: i64 = 0;

    for path in cli.rgbe_files.iter().take(MAX_INPUTS) {
        match fs::read(path).map_err(MiniLightError::File).and_then(|b| Image::read_rgbe(&b)) {
            Ok((mut image, iterations))
                if image.width() == sum.width() && image.height() == sum.height() =>
            {
                image.scale(iterations as f64);
                sum.accumulate(&image);
                total_iterations += iterations as i64;
                println!("input: ({iterations}) {}", path.display());
            }
            _ => eprintln!("warning: skipping unreadable or mismatched input {}", path.display()),
        }
    }

    // `sum` still holds the raw accumulated radiance (each input scaled up
    // by its own iteration count, then summed) — `write_rgbe` performs the
    // single division by the total iteration count while encoding.
    let output_path = output_path(&cli.rgbe_files[0]);
    let file = fs::File::create(&output_path).map_err(MiniLightError::WriteIo)?;
    let mut writer = std::io::BufWriter::new(file);
    let clamped_iterations = total_iterations.clamp(1, i32::MAX as i64) as i32;
    sum.write_rgbe(clamped_iterations, &mut writer)?;

    println!("output: ({clamped_iterations}) {}", output_path.display());
    Ok(())
}

/// Output filename: `<first-file-prefix>.<8-hex-digit time>.mlm.rgbe`,
/// where the prefix is everything in the first input's path up to (not
/// including) its first `.`.
fn output_path(first_input: &std::path::Path) -> PathBuf {
    let full = first_input.to_string_lossy().into_owned();
    let prefix = match full.find('.') {
        Some(dot) => &full[..dot],
        None => &full[..],
    };
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0) as u32;
    PathBuf::from(format!("{prefix}.{timestamp:08X}.mlm.rgbe"))
}
