use std::f64::consts::FRAC_PI_2;

use boregauge::detect::{detect_circle, hough_lines, LineCandidate, LineDeduplicator};
use boregauge::{CircleConfig, Measurer};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Part-like scene: textured background, dark bore, two chamfer bands.
fn make_part_fixture(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let scale = width as f32 / 1600.0;
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let r = 150.0 * scale;
    let top = (cy - r - 150.0 * scale) as u32;
    let bottom = (cy + r + 200.0 * scale) as u32;

    let mut img = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let base = if (dx * dx + dy * dy).sqrt() <= r {
                30.0
            } else if y < top || y > bottom {
                80.0
            } else {
                200.0
            };
            let noise: f32 = rng.gen_range(-6.0..6.0);
            img.put_pixel(x, y, Luma([(base + noise).clamp(0.0, 255.0) as u8]));
        }
    }
    img
}

fn make_edge_fixture(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = GrayImage::new(width, height);
    for row in [height / 4, height / 2, 3 * height / 4] {
        for x in 0..width {
            img.put_pixel(x, row, Luma([255]));
        }
    }
    // Clutter.
    for _ in 0..(width * height / 200) {
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);
        img.put_pixel(x, y, Luma([255]));
    }
    img
}

fn make_line_candidates(n: usize, seed: u64) -> Vec<LineCandidate> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let cluster = rng.gen_range(0..6) as f64 * 150.0 + 100.0;
            let rho = cluster + rng.gen_range(-12.0..12.0);
            let mut l = LineCandidate::from_polar(rho, FRAC_PI_2, 100, 2000.0);
            l.distance_mm = Some(rho / 10.0);
            l
        })
        .collect()
}

fn bench_hough_lines(c: &mut Criterion) {
    let edges = make_edge_fixture(1600, 1200, 3);
    c.bench_function("hough_lines_1600x1200", |b| {
        b.iter(|| {
            let lines = hough_lines(black_box(&edges), black_box(80));
            black_box(lines.len())
        })
    });
}

fn bench_circle(c: &mut Criterion) {
    let img = make_part_fixture(1600, 1200, 5);
    let cfg = CircleConfig::default();
    c.bench_function("circle_1600x1200_r140_160", |b| {
        b.iter(|| black_box(detect_circle(black_box(&img), 140, 160, black_box(&cfg))))
    });
}

fn bench_dedup(c: &mut Criterion) {
    let lines = make_line_candidates(200, 11);
    let dedup = LineDeduplicator::new(30.0);
    c.bench_function("dedup_200_lines", |b| {
        b.iter(|| black_box(dedup.dedup(black_box(&lines)).len()))
    });
}

fn bench_measure(c: &mut Criterion) {
    let img = make_part_fixture(1600, 1200, 17);
    let measurer = Measurer::default();
    c.bench_function("measure_gray_1600x1200", |b| {
        b.iter(|| {
            let res = measurer.measure_gray(black_box(&img), 10.0);
            black_box(res.is_ok())
        })
    });
}

criterion_group!(hotpaths, bench_hough_lines, bench_circle, bench_dedup, bench_measure);
criterion_main!(hotpaths);
