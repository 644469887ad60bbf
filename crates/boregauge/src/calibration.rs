//! Calibration record and lens/perspective correction.
//!
//! The record is produced by a separate calibration step and stored as JSON
//! with OpenCV-style matrices. Correction maps every output pixel back
//! through the inverse perspective transform, the rectified camera matrix
//! and the lens distortion model into the raw image, then samples bilinearly.

use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_with, Interpolation};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::MeasureError;

/// Image-to-image correction applied before measuring.
///
/// The output must have the same dimensions as the input.
pub trait ImageCorrector: Sync {
    fn correct(&self, image: &RgbImage) -> RgbImage;
}

/// Pass-through corrector for images that are already rectified.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCorrection;

impl ImageCorrector for NoCorrection {
    fn correct(&self, image: &RgbImage) -> RgbImage {
        image.clone()
    }
}

/// Brown-Conrady radial-tangential distortion with the optional rational
/// radial denominator (`k4..k6`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RadialTangentialDistortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
    pub k4: f64,
    pub k5: f64,
    pub k6: f64,
}

impl RadialTangentialDistortion {
    /// Parse OpenCV coefficient order `k1 k2 p1 p2 [k3 [k4 k5 k6]]`.
    pub fn from_coeffs(c: &[f64]) -> Result<Self, MeasureError> {
        if !matches!(c.len(), 4 | 5 | 8) {
            return Err(MeasureError::Calibration(format!(
                "expected 4, 5 or 8 distortion coefficients, got {}",
                c.len()
            )));
        }
        if c.iter().any(|v| !v.is_finite()) {
            return Err(MeasureError::Calibration(
                "distortion coefficients must be finite".into(),
            ));
        }
        let at = |i: usize| c.get(i).copied().unwrap_or(0.0);
        Ok(Self {
            k1: at(0),
            k2: at(1),
            p1: at(2),
            p2: at(3),
            k3: at(4),
            k4: at(5),
            k5: at(6),
            k6: at(7),
        })
    }

    /// Apply distortion to normalized coordinates.
    pub fn distort_normalized(self, normalized_xy: [f64; 2]) -> [f64; 2] {
        let x = normalized_xy[0];
        let y = normalized_xy[1];
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let num = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        let den = 1.0 + self.k4 * r2 + self.k5 * r4 + self.k6 * r6;
        let radial = if den.abs() < 1e-12 { num } else { num / den };
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        [x * radial + x_tan, y * radial + y_tan]
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CoeffsRepr {
    Flat(Vec<f64>),
    Nested(Vec<Vec<f64>>),
}

// OpenCV writes distortion coefficients as a 1xN matrix.
fn deserialize_coeffs<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match CoeffsRepr::deserialize(deserializer)? {
        CoeffsRepr::Flat(v) => v,
        CoeffsRepr::Nested(rows) => rows.into_iter().flatten().collect(),
    })
}

/// Camera calibration consumed by a measurement run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Intrinsic matrix of the raw camera.
    pub camera_matrix: [[f64; 3]; 3],
    /// Distortion coefficients in OpenCV order.
    #[serde(deserialize_with = "deserialize_coeffs")]
    pub distortion_coeffs: Vec<f64>,
    /// Intrinsic matrix of the undistorted image.
    pub new_camera_matrix: [[f64; 3]; 3],
    /// Homography from the undistorted image to the measurement plane view.
    pub perspective_transformation: [[f64; 3]; 3],
    /// Scale of the measurement plane in pixels per millimetre.
    pub ppmm: f64,
}

fn to_matrix(m: &[[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::from_fn(|r, c| m[r][c])
}

impl CalibrationRecord {
    /// Record with no lens distortion and identity perspective, for images
    /// that are already rectified.
    pub fn identity(width: u32, height: u32, ppmm: f64) -> Self {
        let f = width.max(1) as f64;
        let k = [
            [f, 0.0, width as f64 / 2.0],
            [0.0, f, height as f64 / 2.0],
            [0.0, 0.0, 1.0],
        ];
        Self {
            camera_matrix: k,
            distortion_coeffs: vec![0.0; 5],
            new_camera_matrix: k,
            perspective_transformation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            ppmm,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, MeasureError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, MeasureError> {
        let record: Self =
            serde_json::from_str(data).map_err(|e| MeasureError::Calibration(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), MeasureError> {
        if !(self.ppmm.is_finite() && self.ppmm > 0.0) {
            return Err(MeasureError::Calibration(format!(
                "ppmm must be finite and > 0, got {}",
                self.ppmm
            )));
        }
        for (name, m) in [
            ("camera_matrix", &self.camera_matrix),
            ("new_camera_matrix", &self.new_camera_matrix),
            ("perspective_transformation", &self.perspective_transformation),
        ] {
            if m.iter().flatten().any(|v| !v.is_finite()) {
                return Err(MeasureError::Calibration(format!(
                    "{} has non-finite entries",
                    name
                )));
            }
        }
        self.distortion()?;
        self.lens_corrector().map(|_| ())
    }

    pub fn distortion(&self) -> Result<RadialTangentialDistortion, MeasureError> {
        RadialTangentialDistortion::from_coeffs(&self.distortion_coeffs)
    }

    /// True when correction maps every pixel onto itself: no distortion,
    /// identical camera matrices and an identity perspective transform.
    pub fn is_identity(&self) -> bool {
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let h = to_matrix(&self.perspective_transformation);
        let h = if h[(2, 2)].abs() > 1e-12 { h / h[(2, 2)] } else { h };
        self.distortion_coeffs.iter().all(|&c| c == 0.0)
            && self.camera_matrix == self.new_camera_matrix
            && (h - to_matrix(&identity)).abs().max() < 1e-12
    }

    /// Corrector for this record; skips resampling for identity records.
    pub fn corrector(&self) -> Result<Box<dyn ImageCorrector>, MeasureError> {
        if self.is_identity() {
            self.validate()?;
            return Ok(Box::new(NoCorrection));
        }
        Ok(Box::new(self.lens_corrector()?))
    }

    /// Precompute the inverse mappings used to correct images.
    pub fn lens_corrector(&self) -> Result<LensCorrector, MeasureError> {
        let k_new_inv = to_matrix(&self.new_camera_matrix)
            .try_inverse()
            .ok_or_else(|| MeasureError::Calibration("new_camera_matrix is singular".into()))?;
        let h_inv = to_matrix(&self.perspective_transformation)
            .try_inverse()
            .ok_or_else(|| {
                MeasureError::Calibration("perspective_transformation is singular".into())
            })?;
        Ok(LensCorrector {
            k: to_matrix(&self.camera_matrix),
            k_new_inv,
            h_inv,
            distortion: self.distortion()?,
        })
    }
}

/// Undistortion followed by perspective rectification.
#[derive(Debug, Clone, PartialEq)]
pub struct LensCorrector {
    k: Matrix3<f64>,
    k_new_inv: Matrix3<f64>,
    h_inv: Matrix3<f64>,
    distortion: RadialTangentialDistortion,
}

fn dehomogenize(v: Vector3<f64>) -> Option<[f64; 2]> {
    if v[2].abs() < 1e-12 {
        return None;
    }
    Some([v[0] / v[2], v[1] / v[2]])
}

// Sub-pixel overshoot at the frame border stays inside the bilinear window.
fn keep_inside(v: f64, len: u32) -> f64 {
    let max = len as f64 - 1.0 - 1e-3;
    if v > -1.0 && v < 0.0 {
        0.0
    } else if v > max && v < len as f64 {
        max
    } else {
        v
    }
}

impl LensCorrector {
    /// Raw image position sampled for output pixel `xy`.
    pub fn source_pixel(&self, xy: [f64; 2]) -> Option<[f64; 2]> {
        let undist = dehomogenize(self.h_inv * Vector3::new(xy[0], xy[1], 1.0))?;
        let n = dehomogenize(self.k_new_inv * Vector3::new(undist[0], undist[1], 1.0))?;
        let d = self.distortion.distort_normalized(n);
        dehomogenize(self.k * Vector3::new(d[0], d[1], 1.0))
    }
}

impl ImageCorrector for LensCorrector {
    fn correct(&self, image: &RgbImage) -> RgbImage {
        let (w, h) = image.dimensions();
        warp_with(
            image,
            |x, y| match self.source_pixel([x as f64, y as f64]) {
                Some(p) if p[0].is_finite() && p[1].is_finite() => {
                    (keep_inside(p[0], w) as f32, keep_inside(p[1], h) as f32)
                }
                _ => (-1.0, -1.0),
            },
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
        )
    }
}
