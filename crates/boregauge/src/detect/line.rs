//! Straight-line Hough transform and chamfer line candidates.

use image::GrayImage;

use super::circle::CircleDetection;
use crate::config::LineConfig;
use crate::geometry::point_line_distance;

/// Slope assigned to lines whose endpoints are vertically aligned.
const VERTICAL_SLOPE: f64 = 1000.0;

/// A line in normal form `x cos(theta) + y sin(theta) = rho`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughLine {
    /// Signed offset from the image origin (pixels).
    pub rho: f64,
    /// Normal angle in radians, `[0, pi)`.
    pub theta: f64,
    /// Accumulator votes.
    pub votes: u32,
}

/// Standard Hough transform at 1 px / 1 degree resolution.
///
/// Nonzero pixels of `edges` vote. Peaks with at least `vote_threshold`
/// votes that are local maxima along both axes are returned, strongest first
/// (ties in accumulator order). Vote counts are kept on each line; the
/// dedup scan relies on both.
pub fn hough_lines(edges: &GrayImage, vote_threshold: u32) -> Vec<HoughLine> {
    let (w, h) = edges.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }
    const N_THETA: usize = 180;
    let max_rho = (w as f64).hypot(h as f64).ceil() as i64;
    let n_rho = (2 * max_rho + 1) as usize;
    let trig: Vec<(f64, f64)> = (0..N_THETA)
        .map(|deg| (deg as f64).to_radians().sin_cos())
        .collect();

    let stride = w as usize;
    let mut accum = vec![0u32; N_THETA * n_rho];
    for (idx, &e) in edges.as_raw().iter().enumerate() {
        if e == 0 {
            continue;
        }
        let x = (idx % stride) as f64;
        let y = (idx / stride) as f64;
        for (t, &(s, c)) in trig.iter().enumerate() {
            let r = (x * c + y * s).round() as i64 + max_rho;
            accum[t * n_rho + r as usize] += 1;
        }
    }

    let threshold = vote_threshold.max(1);
    let at = |t: usize, r: usize| accum[t * n_rho + r];
    let mut peaks: Vec<(usize, u32)> = Vec::new();
    for t in 0..N_THETA {
        for r in 0..n_rho {
            let v = at(t, r);
            if v < threshold {
                continue;
            }
            let left = if r > 0 { at(t, r - 1) } else { 0 };
            let right = if r + 1 < n_rho { at(t, r + 1) } else { 0 };
            let up = if t > 0 { at(t - 1, r) } else { 0 };
            let down = if t + 1 < N_THETA { at(t + 1, r) } else { 0 };
            if v > left && v >= right && v > up && v >= down {
                peaks.push((t * n_rho + r, v));
            }
        }
    }
    peaks.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    peaks
        .into_iter()
        .map(|(idx, votes)| HoughLine {
            rho: (idx % n_rho) as f64 - max_rho as f64,
            theta: ((idx / n_rho) as f64).to_radians(),
            votes,
        })
        .collect()
}

/// One line detection with its geometry relative to the bore.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LineCandidate {
    /// Normal-form offset (pixels).
    pub rho: f64,
    /// Normal-form angle (radians).
    pub theta: f64,
    /// Hough votes.
    pub votes: u32,
    /// First endpoint, one image diagonal from the foot point.
    pub p1: [f64; 2],
    /// Second endpoint, opposite side of the foot point.
    pub p2: [f64; 2],
    /// Gap between the bore boundary and this line (mm); `None` without a bore.
    pub distance_mm: Option<f64>,
    /// Mean endpoint row, used for top-to-bottom ordering.
    pub y_mean: f64,
}

impl LineCandidate {
    /// Build a candidate from normal-form parameters, extending the line by
    /// `extent` pixels to each side of the foot point.
    pub fn from_polar(rho: f64, theta: f64, votes: u32, extent: f64) -> Self {
        let (b, a) = theta.sin_cos();
        let x0 = a * rho;
        let y0 = b * rho;
        let p1 = [x0 - extent * b, y0 + extent * a];
        let p2 = [x0 + extent * b, y0 - extent * a];
        Self {
            rho,
            theta,
            votes,
            p1,
            p2,
            distance_mm: None,
            y_mean: (p1[1] + p2[1]) / 2.0,
        }
    }

    /// Slope dy/dx between the endpoints; vertical lines get a large constant.
    pub fn slope(&self) -> f64 {
        let dx = self.p2[0] - self.p1[0];
        if dx.abs() < 1e-9 {
            VERTICAL_SLOPE
        } else {
            (self.p2[1] - self.p1[1]) / dx
        }
    }

    pub fn is_near_horizontal(&self, max_slope: f64) -> bool {
        self.slope().abs() < max_slope
    }

    /// Gap in pixels between the circle boundary and this line.
    pub fn gap_px(&self, circle: &CircleDetection) -> f64 {
        point_line_distance(self.p1, self.p2, circle.center) - circle.radius
    }

    /// Set `distance_mm` from the gap to `circle`.
    pub fn with_gap_to(mut self, circle: &CircleDetection, ppmm: f64) -> Self {
        self.distance_mm = Some(self.gap_px(circle) / ppmm);
        self
    }
}

/// Detect near-horizontal chamfer lines in an edge map.
///
/// Distances are filled in only when a bore circle is known.
pub fn detect_lines(
    edges: &GrayImage,
    vote_threshold: u32,
    circle: Option<&CircleDetection>,
    ppmm: f64,
    config: &LineConfig,
) -> Vec<LineCandidate> {
    let (w, h) = edges.dimensions();
    let extent = (w as f64).hypot(h as f64).floor();
    let raw = hough_lines(edges, vote_threshold);
    let n_raw = raw.len();

    let lines: Vec<LineCandidate> = raw
        .into_iter()
        .map(|l| LineCandidate::from_polar(l.rho, l.theta, l.votes, extent))
        .filter(|c| c.is_near_horizontal(config.max_slope))
        .map(|c| match circle {
            Some(circle) => c.with_gap_to(circle, ppmm),
            None => c,
        })
        .collect();

    tracing::debug!(
        "{} hough lines, {} near-horizontal (|slope| < {})",
        n_raw,
        lines.len(),
        config.max_slope
    );
    lines
}
