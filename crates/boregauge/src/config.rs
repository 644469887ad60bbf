//! Tunable measurement parameters.
//!
//! Defaults reproduce the values the capture setup was tuned for. All groups
//! are `#[serde(default)]`, so a JSON override file only needs the fields it
//! changes.

use std::path::Path;

use crate::error::MeasureError;

/// Pixel width of the reference 2 Mpix capture. Tolerances and drawing
/// sizes are expressed for this width and scaled with the actual width.
pub const REFERENCE_WIDTH_PX: f64 = 1600.0;

/// Supported capture resolutions, keyed by image row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureResolution {
    /// 1600x1200 sensor.
    TwoMegapixel,
    /// 4096x3000 sensor.
    TwelveMegapixel,
}

impl CaptureResolution {
    /// Row count that identifies this resolution.
    pub const fn rows(self) -> u32 {
        match self {
            Self::TwoMegapixel => 1200,
            Self::TwelveMegapixel => 3000,
        }
    }

    /// Classify an image by its dimensions. Fails closed on unknown sizes.
    pub fn from_dimensions(width: u32, height: u32) -> Result<Self, MeasureError> {
        match height {
            1200 => Ok(Self::TwoMegapixel),
            3000 => Ok(Self::TwelveMegapixel),
            _ => Err(MeasureError::UnsupportedResolution { width, height }),
        }
    }
}

/// Detection parameters bound to one capture resolution.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetectionParams {
    /// Smallest bore radius searched (pixels).
    pub min_radius: u32,
    /// Largest bore radius searched (pixels).
    pub max_radius: u32,
    /// Minimum Hough votes for a chamfer line.
    pub line_votes: u32,
}

/// Two-entry lookup from capture resolution to detection parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResolutionTable {
    pub two_megapixel: DetectionParams,
    pub twelve_megapixel: DetectionParams,
}

impl Default for ResolutionTable {
    fn default() -> Self {
        Self {
            two_megapixel: DetectionParams {
                min_radius: 140,
                max_radius: 160,
                line_votes: 80,
            },
            twelve_megapixel: DetectionParams {
                min_radius: 340,
                max_radius: 380,
                line_votes: 150,
            },
        }
    }
}

impl ResolutionTable {
    pub fn params(&self, resolution: CaptureResolution) -> DetectionParams {
        match resolution {
            CaptureResolution::TwoMegapixel => self.two_megapixel,
            CaptureResolution::TwelveMegapixel => self.twelve_megapixel,
        }
    }

    /// Resolve parameters for an image of the given size.
    pub fn lookup(
        &self,
        width: u32,
        height: u32,
    ) -> Result<(CaptureResolution, DetectionParams), MeasureError> {
        let resolution = CaptureResolution::from_dimensions(width, height)?;
        Ok((resolution, self.params(resolution)))
    }
}

/// Noise suppression applied before any detection.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// Median filter radius (1 gives a 3x3 window).
    pub median_radius: u32,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self { median_radius: 1 }
    }
}

/// Gradient Hough circle search for the bore.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircleConfig {
    /// Upper Canny threshold for the circle edge map; the lower one is half.
    pub canny_high: f32,
    /// Minimum center votes, also the minimum radius support (edge pixels).
    pub accumulator_threshold: u32,
    /// Minimum distance between two accepted circle centers (pixels).
    pub min_center_distance: f64,
    /// Gaussian sigma applied before taking vote directions; 0 disables.
    pub gradient_sigma: f32,
}

impl Default for CircleConfig {
    fn default() -> Self {
        Self {
            canny_high: 50.0,
            accumulator_threshold: 30,
            min_center_distance: 100.0,
            gradient_sigma: 1.4,
        }
    }
}

/// Straight-line Hough search for chamfer edges.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// Lower Canny threshold of the line edge map.
    pub canny_low: f32,
    /// Upper Canny threshold of the line edge map.
    pub canny_high: f32,
    /// Lines with `|slope| >= max_slope` are discarded.
    pub max_slope: f64,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            canny_low: 100.0,
            canny_high: 150.0,
            max_slope: 0.2,
        }
    }
}

/// Merging of duplicate line detections.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Offset tolerance at the reference width (pixels).
    pub base_tolerance_px: f64,
    /// Width the base tolerance is expressed for.
    pub reference_width_px: f64,
    /// Sort candidates by offset before clustering instead of using
    /// detection order.
    pub sort_by_offset: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            base_tolerance_px: 30.0,
            reference_width_px: REFERENCE_WIDTH_PX,
            sort_by_offset: false,
        }
    }
}

impl DedupConfig {
    /// Offset tolerance for an image of the given width.
    pub fn tolerance_for_width(&self, width: u32) -> f64 {
        self.base_tolerance_px * (width as f64 / self.reference_width_px)
    }
}

/// Colors and scale of the diagnostic overlay.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnnotateConfig {
    /// Width the stroke width of 1 px is expressed for.
    pub reference_width_px: f64,
    /// Bore outline and center mark color (RGB).
    pub circle_color: [u8; 3],
    /// Chamfer line color (RGB).
    pub line_color: [u8; 3],
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            reference_width_px: REFERENCE_WIDTH_PX,
            circle_color: [0, 0, 255],
            line_color: [0, 255, 0],
        }
    }
}

impl AnnotateConfig {
    /// Stroke width for an image of the given width (at least 1 px).
    pub fn stroke_width(&self, width: u32) -> u32 {
        ((width as f64 / self.reference_width_px).round() as u32).max(1)
    }
}

/// Top-level measurement configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    pub resolutions: ResolutionTable,
    pub denoise: DenoiseConfig,
    pub circle: CircleConfig,
    pub line: LineConfig,
    pub dedup: DedupConfig,
    pub annotate: AnnotateConfig,
}

impl MeasureConfig {
    /// Load a (partial) configuration from JSON; missing fields keep defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, MeasureError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, MeasureError> {
        let config: Self =
            serde_json::from_str(data).map_err(|e| MeasureError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), MeasureError> {
        for (name, p) in [
            ("two_megapixel", self.resolutions.two_megapixel),
            ("twelve_megapixel", self.resolutions.twelve_megapixel),
        ] {
            if p.min_radius == 0 || p.max_radius < p.min_radius {
                return Err(MeasureError::Config(format!(
                    "{}: radius window [{}, {}] is empty",
                    name, p.min_radius, p.max_radius
                )));
            }
        }
        if !(self.circle.gradient_sigma.is_finite() && self.circle.gradient_sigma >= 0.0) {
            return Err(MeasureError::Config(
                "circle.gradient_sigma must be >= 0".into(),
            ));
        }
        if !(self.line.max_slope.is_finite() && self.line.max_slope > 0.0) {
            return Err(MeasureError::Config("line.max_slope must be > 0".into()));
        }
        if !(self.dedup.reference_width_px.is_finite() && self.dedup.reference_width_px > 0.0) {
            return Err(MeasureError::Config(
                "dedup.reference_width_px must be > 0".into(),
            ));
        }
        if !(self.annotate.reference_width_px.is_finite() && self.annotate.reference_width_px > 0.0)
        {
            return Err(MeasureError::Config(
                "annotate.reference_width_px must be > 0".into(),
            ));
        }
        Ok(())
    }
}
