//! Gradient Hough transform for the bore circle.
//!
//! Every edge pixel votes along its gradient direction, in both senses, at
//! each radius of the search window. The bore's boundary pixels converge on
//! its center, so accumulator peaks are center candidates. Candidates are
//! accepted strongest first, at least `min_center_distance` apart, and each
//! gets the radius with the most edge support.

use image::GrayImage;

use crate::config::CircleConfig;
use crate::error::MeasureError;

/// An accepted bore circle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CircleDetection {
    /// Center (x, y) in pixels.
    pub center: [f64; 2],
    /// Radius in pixels.
    pub radius: f64,
    /// Accumulator votes at the center.
    pub votes: u32,
    /// Number of edge pixels at the chosen radius.
    pub support: u32,
}

impl CircleDetection {
    /// Bore diameter in millimetres.
    pub fn diameter_mm(&self, ppmm: f64) -> f64 {
        2.0 * self.radius / ppmm
    }
}

/// Result of the bore search.
///
/// `NoneFound` is a legitimate measurement state; `Ambiguous` means the
/// search window or the image is wrong and must not be silently dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum CircleOutcome {
    Detected(CircleDetection),
    NoneFound,
    Ambiguous(Vec<CircleDetection>),
}

impl CircleOutcome {
    /// Collapse into the pipeline's view: an optional circle or a hard error.
    pub fn into_result(self) -> Result<Option<CircleDetection>, MeasureError> {
        match self {
            Self::Detected(c) => Ok(Some(c)),
            Self::NoneFound => Ok(None),
            Self::Ambiguous(circles) => Err(MeasureError::AmbiguousDetection {
                circles: circles.len(),
            }),
        }
    }
}

/// Search `gray` for the bore with a radius in `[min_radius, max_radius]`.
pub fn detect_circle(
    gray: &GrayImage,
    min_radius: u32,
    max_radius: u32,
    config: &CircleConfig,
) -> CircleOutcome {
    let mut circles = find_circles(gray, min_radius, max_radius, config);
    match circles.len() {
        0 => CircleOutcome::NoneFound,
        1 => CircleOutcome::Detected(circles.remove(0)),
        _ => CircleOutcome::Ambiguous(circles),
    }
}

/// All circles accepted by the transform, strongest first.
pub fn find_circles(
    gray: &GrayImage,
    min_radius: u32,
    max_radius: u32,
    config: &CircleConfig,
) -> Vec<CircleDetection> {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 || min_radius == 0 || max_radius < min_radius {
        return Vec::new();
    }

    let edges = imageproc::edges::canny(gray, config.canny_high * 0.5, config.canny_high);
    // Vote directions come from a smoothed copy.
    let smoothed;
    let grad_src = if config.gradient_sigma > 0.0 {
        smoothed = imageproc::filter::gaussian_blur_f32(gray, config.gradient_sigma);
        &smoothed
    } else {
        gray
    };
    let gx = imageproc::gradients::horizontal_sobel(grad_src);
    let gy = imageproc::gradients::vertical_sobel(grad_src);
    let gx_raw = gx.as_raw();
    let gy_raw = gy.as_raw();

    let stride = w as usize;
    let mut accum = vec![0u32; stride * h as usize];
    let mut edge_points: Vec<[f64; 2]> = Vec::new();
    let x_limit = w as f32;
    let y_limit = h as f32;

    for (idx, &e) in edges.as_raw().iter().enumerate() {
        if e == 0 {
            continue;
        }
        let xf = (idx % stride) as f32;
        let yf = (idx / stride) as f32;
        edge_points.push([xf as f64, yf as f64]);

        let gxv = gx_raw[idx] as f32;
        let gyv = gy_raw[idx] as f32;
        let mag = gxv.hypot(gyv);
        if mag < 1e-6 {
            continue;
        }
        let dx = gxv / mag;
        let dy = gyv / mag;

        for r in min_radius..=max_radius {
            let rf = r as f32;
            for sign in [1.0f32, -1.0] {
                let vx = (xf + sign * dx * rf).round();
                let vy = (yf + sign * dy * rf).round();
                if vx >= 0.0 && vx < x_limit && vy >= 0.0 && vy < y_limit {
                    accum[vy as usize * stride + vx as usize] += 1;
                }
            }
        }
    }

    let threshold = config.accumulator_threshold.max(1);
    let mut centers = local_maxima(&accum, w, h, threshold);
    centers.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    tracing::debug!(
        "circle search r=[{}, {}]: {} edge px, {} center candidates",
        min_radius,
        max_radius,
        edge_points.len(),
        centers.len()
    );

    let min_dist_sq = config.min_center_distance * config.min_center_distance;
    let mut accepted: Vec<CircleDetection> = Vec::new();
    for (idx, votes) in centers {
        let center = [(idx % stride) as f64, (idx / stride) as f64];
        let too_close = accepted.iter().any(|c| {
            let dx = c.center[0] - center[0];
            let dy = c.center[1] - center[1];
            dx * dx + dy * dy < min_dist_sq
        });
        if too_close {
            continue;
        }
        if let Some((radius, support)) =
            estimate_radius(&edge_points, center, min_radius, max_radius)
        {
            if support >= threshold {
                accepted.push(CircleDetection {
                    center,
                    radius,
                    votes,
                    support,
                });
            }
        }
    }
    accepted
}

/// 3x3 non-maximum suppression; ties go to the earlier pixel.
fn local_maxima(accum: &[u32], w: u32, h: u32, threshold: u32) -> Vec<(usize, u32)> {
    let stride = w as isize;
    let offsets = [
        -stride - 1,
        -stride,
        -stride + 1,
        -1,
        1,
        stride - 1,
        stride,
        stride + 1,
    ];
    let mut out = Vec::new();
    for y in 1..h.saturating_sub(1) as usize {
        for x in 1..(w as usize).saturating_sub(1) {
            let idx = y * w as usize + x;
            let val = accum[idx];
            if val < threshold {
                continue;
            }
            let is_max = offsets.iter().all(|&off| {
                let nidx = idx.wrapping_add_signed(off);
                let n = accum[nidx];
                n < val || (n == val && nidx > idx)
            });
            if is_max {
                out.push((idx, val));
            }
        }
    }
    out
}

/// Radius (1 px bins) with the largest number of edge pixels around `center`.
///
/// Returns the mean distance of the winning bin and its pixel count.
fn estimate_radius(
    points: &[[f64; 2]],
    center: [f64; 2],
    min_radius: u32,
    max_radius: u32,
) -> Option<(f64, u32)> {
    let n_bins = (max_radius - min_radius + 1) as usize;
    let mut counts = vec![0u32; n_bins];
    let mut sums = vec![0.0f64; n_bins];
    for p in points {
        let d = (p[0] - center[0]).hypot(p[1] - center[1]);
        let bin = d.round() as i64 - min_radius as i64;
        if bin < 0 || bin >= n_bins as i64 {
            continue;
        }
        counts[bin as usize] += 1;
        sums[bin as usize] += d;
    }
    let (best, &count) = counts
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;
    if count == 0 {
        return None;
    }
    Some((sums[best] / count as f64, count))
}
