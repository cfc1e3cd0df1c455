//! Exercises the tone-mapping path behind `minilight-tone`: decode an RGBE
//! render and pass its already-averaged pixels straight into `write_ppm`.

use minilight::image::Image;
use minilight::vector3::Color;

#[test]
fn tone_mapping_a_multi_iteration_render_does_not_re_divide() {
    // Two frames accumulating the same per-frame radiance: `write_rgbe`
    // divides once on encode, so `read_rgbe` hands back the same value
    // as a single-frame render of that value would. `write_ppm` must not
    // divide by `iterations` again before tone-mapping.
    let mut single = Image::new(1, 1);
    single.add_to_pixel(0, 0, Color::new(40.0, 40.0, 40.0));
    let mut single_buf = Vec::new();
    single.write_rgbe(1, &mut single_buf).unwrap();

    let mut doubled = Image::new(1, 1);
    doubled.add_to_pixel(0, 0, Color::new(40.0, 40.0, 40.0));
    doubled.add_to_pixel(0, 0, Color::new(40.0, 40.0, 40.0));
    let mut doubled_buf = Vec::new();
    doubled.write_rgbe(2, &mut doubled_buf).unwrap();

    let (single_decoded, single_iterations) = Image::read_rgbe(&single_buf).unwrap();
    let (doubled_decoded, doubled_iterations) = Image::read_rgbe(&doubled_buf).unwrap();
    assert_eq!(single_iterations, 1);
    assert_eq!(doubled_iterations, 2);

    // Mirrors `minilight-tone`: the iteration count returned by
    // `read_rgbe` is not passed into `write_ppm` at all.
    let mut single_ppm = Vec::new();
    single_decoded.write_ppm(0.0, &mut single_ppm).unwrap();
    let mut doubled_ppm = Vec::new();
    doubled_decoded.write_ppm(0.0, &mut doubled_ppm).unwrap();

    // Both renders hold the same per-pixel radiance once decoded, so their
    // tone-mapped output should be identical rather than the doubled one
    // coming out half as bright from a leftover second division.
    assert_eq!(single_ppm, doubled_ppm);
}

#[test]
fn tone_mapped_output_is_a_well_formed_ppm_with_nonzero_pixels() {
    let mut image = Image::new(2, 2);
    for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        image.add_to_pixel(x, y, Color::new(60.0, 60.0, 60.0));
    }
    let mut rgbe_buf = Vec::new();
    image.write_rgbe(1, &mut rgbe_buf).unwrap();

    let (decoded, _iterations) = Image::read_rgbe(&rgbe_buf).unwrap();
    let mut ppm_buf = Vec::new();
    decoded.write_ppm(0.0, &mut ppm_buf).unwrap();

    assert!(ppm_buf.starts_with(b"P6\n"));
    let header_end = ppm_buf.windows(2).position(|w| w == b"255\n").unwrap() + 4;
    let pixel_bytes = &ppm_buf[header_end..];
    assert_eq!(pixel_bytes.len(), 2 * 2 * 3);
    assert!(pixel_bytes.iter().any(|&b| b > 0), "expected a visibly lit pixel in the tone-mapped output");
}
