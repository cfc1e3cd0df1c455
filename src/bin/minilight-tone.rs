//! Peripheral tool: tone-maps a MiniLight RGBE render into a displayable
//! 24-bit PPM using Ward's 1994 contrast-based scale factor.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use minilight::error::MiniLightError;
use minilight::image::Image;

#[derive(Parser, Debug)]
#[command(
    name = "minilight-tone",
    about = "Tone-maps a MiniLight RGBE render into a PPM image"
)]
struct Cli {
    /// Display luminance max, in cd/m^2 (optional; defaults to 200)
    #[arg(short = 'd')]
    display_luminance_max: Option<u32>,

    /// RGBE file to tone-map
    rgbe_file: PathBuf,
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
    let bytes = fs::read(&cli.rgbe_file).map_err(MiniLightError::File)?;
    // `read_rgbe` hands back the per-iteration average already — no
    // further division by `iterations` is needed before tone-mapping.
    let (image, _iterations) = Image::read_rgbe(&bytes)?;

    let display_luminance_max = cli.display_luminance_max.unwrap_or(0) as f64;

    let output_path = {
        let mut name = cli.rgbe_file.as_os_str().to_owned();
        name.push(".ppm");
        PathBuf::from(name)
    };
    let file = fs::File::create(&output_path).map_err(MiniLightError::WriteIo)?;
    let mut writer = std::io::BufWriter::new(file);
    image.write_ppm(display_luminance_max, &mut writer)?;

    println!("output: {}", output_path.display());
    Ok(())
}
