//! Pixel accumulator and the RGBE/PPM serialisation formats.
//!
//! Uses the Radiance RGBE format for the renderer's native progressive
//! output (http://radsite.lbl.gov/radiance/refer/filefmts.pdf, 'Real
//! Pixels'; Ward; Graphics Gems 2; 1991), and Ward's contrast-based
//! tonemapper ('A Contrast Based Scalefactor For Luminance Display'; Ward;
//! Graphics Gems 4; 1994) for the peripheral PPM conversion tool.

use std::io::Write;

use crate::error::{MiniLightError, Result};
use crate::model_reader::ModelReader;
use crate::vector3::Color;

/// Image dimension ceiling, in either axis.
pub const IMAGE_DIM_MAX: i32 = 4000;

const SOFTWARE_URI: &str = "http://www.hxa.name/minilight";
const DISPLAY_LUMINANCE_MAX: f64 = 200.0;
const RGB_LUMINANCE: Color = Color::new(0.2126, 0.7152, 0.0722);
const GAMMA_ENCODE: f64 = 0.45;

pub struct Image {
    width: i32,
    height: i32,
    pixels: Vec<Color>,
}

impl Image {
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.clamp(1, IMAGE_DIM_MAX);
        let height = height.clamp(1, IMAGE_DIM_MAX);
        Self {
            width,
            height,
            pixels: vec![Color::zero(); (width * height) as usize],
        }
    }

    pub fn read(reader: &mut ModelReader) -> Result<Self> {
        let width = reader.next_i32()?;
        let height = reader.next_i32()?;
        Ok(Self::new(width, height))
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Pixel radiance at a flat index (row-major, matching the RGBE/PPM
    /// scanline order written to disk).
    pub fn pixel(&self, index: usize) -> Color {
        self.pixels[index]
    }

    /// Accumulates (adds, doesn't assign) radiance to a pixel. Rows are
    /// stored bottom-to-top in memory — `y` counts from the top of the
    /// image the camera renders, matching the eventual top-down RGBE/PPM
    /// scanline order on write.
    pub fn add_to_pixel(&mut self, x: i32, y: i32, radiance: Color) {
        if x >= 0 && x < self.width && y >= 0 && y < self.height {
            let index = (x + (self.height - 1 - y) * self.width) as usize;
            self.pixels[index] += radiance;
        }
    }

    fn divider(iteration: i32) -> f64 {
        1.0 / iteration.max(1) as f64
    }

    /// Writes the image as Radiance RGBE, averaged over `iteration` frames.
    /// A non-standard `# ITERATIONS=` comment line records the frame count
    /// in the header, so the merge tool can recombine multiple partial
    /// renders without guessing their individual weights.
    pub fn write_rgbe(&self, iteration: i32, out: &mut impl Write) -> Result<()> {
        let divider = Self::divider(iteration);

        (|| -> std::io::Result<()> {
            write!(out, "#?RADIANCE\n")?;
            write!(out, "FORMAT=32-bit_rgbe\n")?;
            write!(out, "SOFTWARE={SOFTWARE_URI}\n")?;
            write!(out, "# ITERATIONS={iteration}\n\n")?;
            write!(out, "-Y {} +X {}\n", self.height, self.width)?;

            for pixel in &self.pixels {
                let scaled = *pixel * divider;
                out.write_all(&encode_rgbe(scaled))?;
            }
            Ok(())
        })()
        .map_err(MiniLightError::WriteIo)
    }

    /// Reads an image previously written by `write_rgbe`, returning it
    /// alongside the iteration count recorded in its header. Pixel values
    /// are the per-iteration averages as stored, not the raw accumulated sum.
    pub fn read_rgbe(bytes: &[u8]) -> Result<(Self, i32)> {
        let text_end = bytes
            .windows(2)
            .position(|w| w == b"\n\n")
            .ok_or(MiniLightError::InvalidModel("missing RGBE header blank line".into()))?;
        let header = std::str::from_utf8(&bytes[..text_end])
            .map_err(|_| MiniLightError::InvalidModel("non-UTF8 RGBE header".into()))?;

        if !header.starts_with("#?RADIANCE") {
            return Err(MiniLightError::UnrecognizedFormat);
        }

        let iteration = header
            .lines()
            .find_map(|line| line.strip_prefix("# ITERATIONS="))
            .and_then(|n| n.trim().parse().ok())
            .unwrap_or(1);

        let mut rest = &bytes[text_end + 2..];
        let resolution_end = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(MiniLightError::Truncated)?;
        let resolution_line = std::str::from_utf8(&rest[..resolution_end])
            .map_err(|_| MiniLightError::InvalidModel("non-UTF8 RGBE resolution line".into()))?;
        let fields: Vec<&str> = resolution_line.split_whitespace().collect();
        if fields.len() != 4 || fields[0] != "-Y" || fields[2] != "+X" {
            return Err(MiniLightError::InvalidModel("bad RGBE resolution line".into()));
        }
        let height: i32 = fields[1]
            .parse()
            .map_err(|_| MiniLightError::InvalidModel("bad RGBE height".into()))?;
        let width: i32 = fields[3]
            .parse()
            .map_err(|_| MiniLightError::InvalidModel("bad RGBE width".into()))?;

        rest = &rest[resolution_end + 1..];
        let pixel_count = (width * height) as usize;
        if rest.len() < pixel_count * 4 {
            return Err(MiniLightError::Truncated);
        }

        let mut pixels = Vec::with_capacity(pixel_count);
        for chunk in rest[..pixel_count * 4].chunks_exact(4) {
            pixels.push(decode_rgbe([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }

        Ok((
            Self {
                width,
                height,
                pixels,
            },
            iteration,
        ))
    }

    /// Scales every pixel by a scalar, in place — used by the merge tool to
    /// weight each input by its iteration count before summing.
    pub fn scale(&mut self, factor: f64) {
        for p in &mut self.pixels {
            *p *= factor;
        }
    }

    /// Adds another same-sized image's pixels into this one, in place.
    pub fn accumulate(&mut self, other: &Image) {
        for (a, b) in self.pixels.iter_mut().zip(&other.pixels) {
            *a += *b;
        }
    }

    /// Writes the image as a binary PPM (P6), Ward-tonemapped and
    /// gamma-encoded for display. Pixels are taken as final values, not
    /// an accumulated sum — callers reading an `Image` back via
    /// `read_rgbe` already have the per-iteration average, and pass it
    /// straight through. `display_luminance_max` overrides the
    /// tonemapper's assumed display brightness; `0.0` falls back to the
    /// reference value of 200 cd/m^2.
    pub fn write_ppm(&self, display_luminance_max: f64, out: &mut impl Write) -> Result<()> {
        let display_luminance_max = if display_luminance_max > 0.0 {
            display_luminance_max
        } else {
            DISPLAY_LUMINANCE_MAX
        };
        let tonemap_scaling = self.tone_mapping_scale(display_luminance_max);

        (|| -> std::io::Result<()> {
            write!(out, "P6\n# {SOFTWARE_URI}\n\n")?;
            write!(out, "{} {}\n255\n", self.width, self.height)?;

            for pixel in &self.pixels {
                for channel in [pixel.x, pixel.y, pixel.z] {
                    let mapped = channel * tonemap_scaling;
                    let gammaed = mapped.max(0.0).powf(GAMMA_ENCODE);
                    let quantized = (gammaed * 255.0 + 0.5).floor().min(255.0);
                    out.write_all(&[quantized as u8])?;
                }
            }
            Ok(())
        })()
        .map_err(MiniLightError::WriteIo)
    }

    /// Ward 1994 contrast-based scale factor, from the log-mean adapted
    /// luminance of the whole image.
    fn tone_mapping_scale(&self, display_luminance_max: f64) -> f64 {
        let sum_of_logs: f64 = self
            .pixels
            .iter()
            .map(|p| {
                let y = p.dot(RGB_LUMINANCE);
                y.max(1e-4).log10()
            })
            .sum();
        let adapt_luminance = 10f64.powf(sum_of_logs / self.pixels.len() as f64);

        let a = 1.219 + (display_luminance_max * 0.25).powf(0.4);
        let b = 1.219 + adapt_luminance.powf(0.4);
        (a / b).powf(2.5) / display_luminance_max
    }
}

/// Encodes an RGB triple as 32-bit Radiance RGBE via `frexp`-based
/// mantissa/exponent decomposition of its largest channel.
fn encode_rgbe(rgb: Color) -> [u8; 4] {
    let rgb = rgb.clamped(Color::zero(), Color::new(f64::MAX, f64::MAX, f64::MAX));
    let largest = rgb.x.max(rgb.y).max(rgb.z);

    if largest < 1e-9 {
        return [0, 0, 0, 0];
    }

    let (mantissa, exponent) = frexp(largest);
    let amount = mantissa * 256.0 / largest;

    [
        (rgb.x * amount).floor() as u8,
        (rgb.y * amount).floor() as u8,
        (rgb.z * amount).floor() as u8,
        (exponent + 128) as u8,
    ]
}

fn decode_rgbe(bytes: [u8; 4]) -> Color {
    if bytes[3] == 0 {
        return Color::zero();
    }
    let scale = 2f64.powi(bytes[3] as i32 - 128 - 8);
    Color::new(
        bytes[0] as f64 * scale,
        bytes[1] as f64 * scale,
        bytes[2] as f64 * scale,
    )
}

/// `frexp`: decomposes `x` into a mantissa in `[0.5, 1)` and an exponent
/// such that `x == mantissa * 2^exponent`. The standard library doesn't
/// expose this (it's a libm primitive, not core Rust), so it's reimplemented
/// directly from `x`'s IEEE-754 bit pattern.
fn frexp(x: f64) -> (f64, i32) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let exponent_bits = ((bits >> 52) & 0x7FF) as i32;
    if exponent_bits == 0 {
        // Subnormal: normalise by scaling up first.
        let (m, e) = frexp(x * (1u64 << 54) as f64);
        return (m, e - 54);
    }
    let exponent = exponent_bits - 1022;
    let mantissa_bits = (bits & !(0x7FFu64 << 52)) | (1022u64 << 52);
    (f64::from_bits(mantissa_bits), exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_are_clamped_to_valid_range() {
        let image = Image::new(0, 999_999);
        assert_eq!(image.width(), 1);
        assert_eq!(image.height(), IMAGE_DIM_MAX);
    }

    #[test]
    fn add_to_pixel_flips_rows_and_ignores_out_of_bounds() {
        let mut image = Image::new(4, 4);
        image.add_to_pixel(0, 0, Color::new(1.0, 0.0, 0.0));
        image.add_to_pixel(-1, 0, Color::one());
        image.add_to_pixel(0, 10, Color::one());
        assert_eq!(image.pixels[3 * 4], Color::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn frexp_matches_the_decomposition_identity() {
        for x in [1.0, 0.5, 3.0, 1024.0, 1e-10, 12345.6789] {
            let (m, e) = frexp(x);
            assert!((0.5..1.0).contains(&m));
            assert!((m * 2f64.powi(e) - x).abs() / x < 1e-12);
        }
    }

    #[test]
    fn rgbe_round_trips_within_quantization_error() {
        let original = Color::new(3626.0, 5572.0, 5802.0);
        let encoded = encode_rgbe(original);
        let decoded = decode_rgbe(encoded);
        for (a, b) in [(original.x, decoded.x), (original.y, decoded.y), (original.z, decoded.z)] {
            assert!((a - b).abs() / a < 1.0 / 128.0);
        }
    }

    #[test]
    fn write_then_read_rgbe_round_trips() {
        let mut image = Image::new(2, 2);
        image.add_to_pixel(0, 0, Color::new(1.0, 2.0, 3.0));
        image.add_to_pixel(1, 1, Color::new(4.0, 5.0, 6.0));

        let mut buf = Vec::new();
        image.write_rgbe(1, &mut buf).unwrap();

        let (decoded, iterations) = Image::read_rgbe(&buf).unwrap();
        assert_eq!(iterations, 1);
        assert_eq!(decoded.width(), 2);
        assert_eq!(decoded.height(), 2);
    }

    #[test]
    fn write_ppm_produces_a_valid_p6_header_and_pixel_count() {
        let mut image = Image::new(2, 2);
        image.add_to_pixel(0, 0, Color::new(1000.0, 1000.0, 1000.0));

        let mut buf = Vec::new();
        image.write_ppm(0.0, &mut buf).unwrap();

        assert!(buf.starts_with(b"P6\n"));
        let header_end = buf.windows(2).position(|w| w == b"255\n").unwrap() + 4;
        assert_eq!(buf.len() - header_end, 2 * 2 * 3);
    }

    #[test]
    fn write_ppm_with_custom_display_luminance_max_differs_from_default() {
        let mut image = Image::new(1, 1);
        image.add_to_pixel(0, 0, Color::new(50.0, 50.0, 50.0));

        let mut default_buf = Vec::new();
        image.write_ppm(0.0, &mut default_buf).unwrap();

        let mut dim_buf = Vec::new();
        image.write_ppm(20.0, &mut dim_buf).unwrap();

        let default_pixel = &default_buf[default_buf.len() - 3..];
        let dim_pixel = &dim_buf[dim_buf.len() - 3..];
        assert_ne!(default_pixel, dim_pixel);
    }
}
