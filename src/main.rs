//! Control module and entry point: handles command-line UI and runs the
//! progressive-refinement render loop.

use std::fs;
use std::process::ExitCode;

use clap::Parser;

use minilight::driver;
use minilight::random::Random;

const TITLE: &str = "MiniLight 1.7 Rust";
const AUTHOR: &str = "Harrison Ainsworth / HXA7241 : 2009, 2011, 2013";
const URL: &str = "http://www.hxa.name/minilight";

const LONG_ABOUT: &str = "\
MiniLight is a minimal global illumination renderer.

The model text file format is:
  #MiniLight

  iterations

  imagewidth imageheight
  viewposition viewdirection viewangle

  skyemission groundreflection

  vertex0 vertex1 vertex2 reflectivity emitivity
  vertex0 vertex1 vertex2 reflectivity emitivity
  ...

- where iterations and image values are integers, viewangle is a real,
and all other values are three parenthised reals. The file must end
with a newline.";

#[derive(Parser, Debug)]
#[command(name = "minilight", about = TITLE, long_about = LONG_ABOUT)]
struct Cli {
    /// Model file to render
    model_file_pathname: std::path::PathBuf,
}

fn main() -> ExitCode {
    println!("\n  {TITLE}\n  {AUTHOR}\n  {URL}\n");

    // The original accepts "-?" as a help alias alongside "--help"; clap's
    // derive macro only recognises the latter, so check for it directly.
    if std::env::args().nth(1).as_deref() == Some("-?") {
        println!("{LONG_ABOUT}");
        return ExitCode::SUCCESS;
    }

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
    let interrupted = driver::install_interrupt_handler();

    let mut random = Random::new();
    let output_path = driver::output_path(&cli.model_file_pathname, &random);

    let bytes = fs::read(&cli.model_file_pathname)
        .map_err(minilight::MiniLightError::File)?;
    let mut model = driver::read_model(bytes)?;

    println!("output: {}", output_path.display());

    driver::render_progressively(
        model.iterations,
        &model.camera,
        &model.scene,
        &mut random,
        &output_path,
        &mut model.image,
        &interrupted,
    )?;

    if interrupted.load(std::sync::atomic::Ordering::SeqCst) {
        println!("\ninterrupted");
    } else {
        println!("\nfinished");
    }

    Ok(())
}
