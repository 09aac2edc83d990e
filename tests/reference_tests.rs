// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the CPU reference filter

use guided_filter::{ConfigurationError, FilterConfig, Plane, ReferenceFilter};

const SIZE: u32 = 64;

fn plane_from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Plane<'static> {
    let data = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| f(x, y))
        .collect();
    Plane::from_vec(data, width, height).unwrap()
}

fn filter(radius: u32, epsilon: f32) -> ReferenceFilter {
    ReferenceFilter::new(FilterConfig::new(radius, epsilon, SIZE, SIZE)).unwrap()
}

#[test]
fn test_constant_input_is_preserved_at_borders() {
    let guide = plane_from_fn(SIZE, SIZE, |_, _| 90);
    let mask = plane_from_fn(SIZE, SIZE, |_, _| 150);
    let out = filter(16, 1e-6).apply(&guide, &mask);

    for &value in out.data() {
        assert!((value - 150.0 / 255.0).abs() < 1e-3, "got {}", value);
    }
}

#[test]
fn test_uniform_mask_stays_uniform_for_any_guide() {
    let guides = [
        plane_from_fn(SIZE, SIZE, |x, y| (if x >= SIZE / 2 { 200 } else { 40 }) + (y % 7) as u8),
        plane_from_fn(SIZE, SIZE, |x, y| ((x * 37 + y * 91) % 256) as u8),
        plane_from_fn(SIZE, SIZE, |x, y| {
            let (dx, dy) = (x as i32 - 30, y as i32 - 34);
            if dx * dx + dy * dy < 300 { 230 } else { 20 }
        }),
    ];
    let mask = plane_from_fn(SIZE, SIZE, |_, _| 200);

    for radius in [2, 16] {
        let filter = filter(radius, 1e-6);
        for guide in &guides {
            let out = filter.apply(guide, &mask);
            for &value in out.data() {
                assert!(
                    (value * 255.0 - 200.0).abs() < 0.5,
                    "radius {}: got {}",
                    radius,
                    value * 255.0
                );
            }
        }
    }
}

#[test]
fn test_uniform_mask_end_to_end_at_default_size() {
    let config = FilterConfig::default();
    let filter = ReferenceFilter::new(config).unwrap();
    let guide = plane_from_fn(513, 513, |x, y| ((x ^ y) & 0xff) as u8);
    let mask = plane_from_fn(513, 513, |_, _| 200);

    let image = filter.apply(&guide, &mask).to_gray_image();
    assert_eq!(image.dimensions(), (513, 513));
    assert!(image.pixels().all(|p| p[0] == 200));
}

#[test]
fn test_identity_reproduces_guide_in_flat_regions() {
    let image = plane_from_fn(SIZE, SIZE, |x, _| if x >= SIZE / 2 { 220 } else { 30 });
    let filter = filter(16, 1e-6);
    let out = filter.apply(&image, &image);

    for y in 0..SIZE {
        for x in (0..SIZE).filter(|x| x.abs_diff(SIZE / 2) > 12) {
            let expected = f32::from(image.get(x, y).unwrap()) / 255.0;
            assert!((out.get(x, y).unwrap() - expected).abs() < 1.0 / 255.0);
        }
    }

    // Across the edge the local model is close to q = I
    let (a, b) = filter.coefficients(&image, &image);
    let edge = SIZE / 2 - 1;
    let (a, b) = (a.get(edge, 10).unwrap(), b.get(edge, 10).unwrap());
    assert!(a > 0.8, "a = {}", a);
    assert!(b.abs() < 0.1, "b = {}", b);
}

#[test]
fn test_flat_guide_falls_back_to_box_average() {
    let guide = plane_from_fn(SIZE, SIZE, |_, _| 128);
    let mask = plane_from_fn(SIZE, SIZE, |x, _| if x < SIZE / 2 { 255 } else { 0 });
    let filter = filter(16, 1e-6);

    let (a, _) = filter.coefficients(&guide, &mask);
    assert!(a.data().iter().all(|v| v.abs() < 0.05));

    let out = filter.apply(&guide, &mask);
    let row: Vec<f32> = (0..SIZE).map(|x| out.get(x, 10).unwrap()).collect();
    assert!(row[0] > 0.95);
    assert!(row[SIZE as usize - 1] < 0.05);
    for pair in row.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-4, "row is not monotone: {:?}", pair);
    }
}

#[test]
fn test_large_epsilon_ignores_guide() {
    let mask = plane_from_fn(SIZE, SIZE, |x, _| if x < SIZE / 2 { 255 } else { 0 });
    let flat = plane_from_fn(SIZE, SIZE, |_, _| 128);
    let textured = plane_from_fn(SIZE, SIZE, |x, _| (x * 4 % 256) as u8);

    let smoothed = filter(16, 1e-6).apply(&flat, &mask);
    let regularised = filter(16, 1e3).apply(&textured, &mask);

    for (a, b) in smoothed.data().iter().zip(regularised.data()) {
        assert!((a - b).abs() < 1.0 / 255.0);
    }
}

#[test]
fn test_output_size_ignores_mask_size() {
    let config = FilterConfig::new(16, 1e-6, 48, 40);
    let filter = ReferenceFilter::new(config).unwrap();
    let guide = plane_from_fn(64, 64, |x, y| ((x + y) * 2) as u8);
    let mask = plane_from_fn(13, 9, |_, _| 200);

    let out = filter.apply(&guide, &mask);
    assert_eq!((out.width(), out.height()), (48, 40));
    assert_eq!(out.data().len(), 48 * 40);
}

#[test]
fn test_output_is_canvas_oriented() {
    // Top half bright: the result must keep the bright half on top
    let guide = plane_from_fn(SIZE, SIZE, |_, _| 128);
    let mask = plane_from_fn(SIZE, SIZE, |_, y| if y < SIZE / 2 { 255 } else { 0 });
    let out = filter(2, 1e-6).apply(&guide, &mask);

    assert!(out.get(SIZE / 2, 2).unwrap() > 0.9);
    assert!(out.get(SIZE / 2, SIZE - 3).unwrap() < 0.1);
}

#[test]
fn test_reconfigure_is_idempotent() {
    let guide = plane_from_fn(SIZE, SIZE, |x, y| ((x * 3 + y * 5) % 256) as u8);
    let mask = plane_from_fn(SIZE, SIZE, |x, y| if x + y < SIZE { 255 } else { 0 });

    let mut filter = filter(8, 1e-3);
    let first = filter.apply(&guide, &mask);
    filter.configure(8, 1e-3, SIZE, SIZE).unwrap();
    filter.configure(8, 1e-3, SIZE, SIZE).unwrap();
    let second = filter.apply(&guide, &mask);

    assert_eq!(first, second);
}

#[test]
fn test_invalid_configure_keeps_previous_config() {
    let mut filter = filter(8, 1e-3);
    assert_eq!(
        filter.configure(0, 1e-3, SIZE, SIZE),
        Err(ConfigurationError::NonPositiveRadius)
    );
    assert_eq!(filter.config().radius, 8);
    assert_eq!(filter.working_resolution().width, SIZE / 4);
}
