//! Per-image measurement pipeline.
//!
//! `resolution gate -> median denoise -> bore circle -> Canny edges ->
//! chamfer lines -> dedup -> top-to-bottom classification`.

use std::path::Path;

use image::{GrayImage, RgbImage};

use crate::calibration::ImageCorrector;
use crate::config::{CaptureResolution, MeasureConfig};
use crate::detect::{
    detect_circle, detect_lines, CircleDetection, FinalEdge, LineCandidate, LineDeduplicator,
};
use crate::error::MeasureError;

/// How the deduplicated chamfer edges were assigned to the two edge slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeStatus {
    /// Zero, one or two edges; slots filled top to bottom.
    Resolved { edges: usize },
    /// Three or more edges; both slots left empty.
    Ambiguous { edges: usize },
}

/// Chamfer distances assigned to the top (`edge1`) and bottom (`edge2`) slots.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EdgeClassification {
    pub edge1_mm: Option<f64>,
    pub edge2_mm: Option<f64>,
    pub status: EdgeStatus,
}

/// Assign final edges to the two chamfer slots.
///
/// With one or two edges they are ordered by `y_mean` (top of the image
/// first). More than two edges cannot be attributed and leave both slots
/// empty.
pub fn classify_edges(edges: &[FinalEdge]) -> EdgeClassification {
    let n = edges.len();
    if n > 2 {
        return EdgeClassification {
            edge1_mm: None,
            edge2_mm: None,
            status: EdgeStatus::Ambiguous { edges: n },
        };
    }
    let mut ordered: Vec<&FinalEdge> = edges.iter().collect();
    ordered.sort_by(|a, b| a.y_mean.total_cmp(&b.y_mean));
    EdgeClassification {
        edge1_mm: ordered.first().and_then(|e| e.distance_mm),
        edge2_mm: ordered.get(1).and_then(|e| e.distance_mm),
        status: EdgeStatus::Resolved { edges: n },
    }
}

/// Everything measured on one image.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageAnalysis {
    pub image_size: [u32; 2],
    pub resolution: CaptureResolution,
    pub circle: Option<CircleDetection>,
    /// Near-horizontal line detections before deduplication.
    pub lines: Vec<LineCandidate>,
    pub edges: Vec<FinalEdge>,
    pub classification: EdgeClassification,
    pub bore_diameter_mm: Option<f64>,
}

impl ImageAnalysis {
    pub fn to_measurement(&self, file_name: impl Into<String>) -> ImageMeasurement {
        ImageMeasurement {
            file_name: file_name.into(),
            edge1_mm: self.classification.edge1_mm,
            edge2_mm: self.classification.edge2_mm,
            bore_diameter_mm: self.bore_diameter_mm,
            edge_status: self.classification.status,
        }
    }
}

/// One row of a folder result table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageMeasurement {
    pub file_name: String,
    pub edge1_mm: Option<f64>,
    pub edge2_mm: Option<f64>,
    pub bore_diameter_mm: Option<f64>,
    pub edge_status: EdgeStatus,
}

/// Measurement entry point.
///
/// Holds the configuration; create once and measure many images.
#[derive(Debug, Clone, Default)]
pub struct Measurer {
    config: MeasureConfig,
}

impl Measurer {
    pub fn new(config: MeasureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MeasureConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut MeasureConfig {
        &mut self.config
    }

    /// Measure an already corrected grayscale image.
    pub fn measure_gray(&self, gray: &GrayImage, ppmm: f64) -> Result<ImageAnalysis, MeasureError> {
        let cfg = &self.config;
        let (w, h) = gray.dimensions();
        let (resolution, params) = cfg.resolutions.lookup(w, h)?;

        let r = cfg.denoise.median_radius;
        let denoised = if r > 0 {
            imageproc::filter::median_filter(gray, r, r)
        } else {
            gray.clone()
        };

        let circle = detect_circle(&denoised, params.min_radius, params.max_radius, &cfg.circle)
            .into_result()?;

        let edge_map = imageproc::edges::canny(&denoised, cfg.line.canny_low, cfg.line.canny_high);
        let lines = detect_lines(
            &edge_map,
            params.line_votes,
            circle.as_ref(),
            ppmm,
            &cfg.line,
        );
        let edges = LineDeduplicator::from_config(&cfg.dedup, w).dedup(&lines);
        let classification = classify_edges(&edges);
        let bore_diameter_mm = circle.map(|c| c.diameter_mm(ppmm));

        match &circle {
            Some(c) => tracing::debug!(
                "bore at ({:.1}, {:.1}) r={:.1}px, {} lines -> {} edges",
                c.center[0],
                c.center[1],
                c.radius,
                lines.len(),
                edges.len()
            ),
            None => tracing::debug!(
                "no bore found, {} lines -> {} edges",
                lines.len(),
                edges.len()
            ),
        }
        if let EdgeStatus::Ambiguous { edges } = classification.status {
            tracing::warn!("{} chamfer edges after dedup, edge distances left empty", edges);
        }

        Ok(ImageAnalysis {
            image_size: [w, h],
            resolution,
            circle,
            lines,
            edges,
            classification,
            bore_diameter_mm,
        })
    }

    /// Correct an RGB image and measure it. Returns the corrected image for
    /// optional annotation.
    pub fn measure_rgb(
        &self,
        image: &RgbImage,
        corrector: &dyn ImageCorrector,
        ppmm: f64,
    ) -> Result<(ImageAnalysis, RgbImage), MeasureError> {
        let corrected = corrector.correct(image);
        let gray = image::imageops::grayscale(&corrected);
        let analysis = self.measure_gray(&gray, ppmm)?;
        Ok((analysis, corrected))
    }

    /// Load, correct and measure an image file.
    pub fn measure_file(
        &self,
        path: &Path,
        corrector: &dyn ImageCorrector,
        ppmm: f64,
    ) -> Result<(ImageAnalysis, RgbImage), MeasureError> {
        tracing::info!("Processing image {}", path.display());
        let image = image::open(path)
            .map_err(|e| MeasureError::image(path, e))?
            .to_rgb8();
        self.measure_rgb(&image, corrector, ppmm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::NoCorrection;
    use crate::test_utils::draw_part_image;

    const PPMM: f64 = 10.0;
    const BORE: ([f32; 2], f32) = ([800.0, 600.0], 150.0);

    fn edge(y_mean: f64, distance_mm: f64) -> FinalEdge {
        FinalEdge {
            distance_mm: Some(distance_mm),
            y_mean,
            rho: y_mean,
            members: 1,
        }
    }

    #[test]
    fn classify_no_edges() {
        let c = classify_edges(&[]);
        assert_eq!(c.edge1_mm, None);
        assert_eq!(c.edge2_mm, None);
        assert_eq!(c.status, EdgeStatus::Resolved { edges: 0 });
    }

    #[test]
    fn classify_single_edge_fills_first_slot() {
        let c = classify_edges(&[edge(900.0, 2.5)]);
        assert_eq!(c.edge1_mm, Some(2.5));
        assert_eq!(c.edge2_mm, None);
        assert_eq!(c.status, EdgeStatus::Resolved { edges: 1 });
    }

    #[test]
    fn classify_two_edges_top_first() {
        let c = classify_edges(&[edge(900.0, 2.0), edge(300.0, 1.0)]);
        assert_eq!(c.edge1_mm, Some(1.0));
        assert_eq!(c.edge2_mm, Some(2.0));
        assert_eq!(c.status, EdgeStatus::Resolved { edges: 2 });
    }

    #[test]
    fn classify_three_edges_is_ambiguous() {
        let c = classify_edges(&[edge(100.0, 1.0), edge(500.0, 2.0), edge(900.0, 3.0)]);
        assert_eq!(c.edge1_mm, None);
        assert_eq!(c.edge2_mm, None);
        assert_eq!(c.status, EdgeStatus::Ambiguous { edges: 3 });
    }

    #[test]
    fn measures_bore_and_two_chamfers() {
        let img = draw_part_image(1600, 1200, &[BORE], Some(300), Some(950));
        let a = Measurer::default().measure_gray(&img, PPMM).unwrap();

        assert_eq!(a.resolution, CaptureResolution::TwoMegapixel);
        let circle = a.circle.expect("bore should be found");
        assert!((circle.center[0] - 800.0).abs() <= 1.5);
        assert!((circle.center[1] - 600.0).abs() <= 1.5);
        assert!((a.bore_diameter_mm.unwrap() - 30.0).abs() < 0.3);

        assert_eq!(a.edges.len(), 2, "edges: {:?}", a.edges);
        assert_eq!(a.classification.status, EdgeStatus::Resolved { edges: 2 });
        // 600 - 300 - 150 and 950 - 600 - 150
        let e1 = a.classification.edge1_mm.unwrap();
        let e2 = a.classification.edge2_mm.unwrap();
        assert!((e1 - 15.0).abs() < 0.3, "edge1 = {}", e1);
        assert!((e2 - 20.0).abs() < 0.3, "edge2 = {}", e2);
    }

    #[test]
    fn twelve_megapixel_part_uses_its_own_profile() {
        let img = draw_part_image(4096, 3000, &[([2048.0, 1500.0], 360.0)], Some(900), Some(2100));
        let a = Measurer::default().measure_gray(&img, 25.0).unwrap();

        assert_eq!(a.resolution, CaptureResolution::TwelveMegapixel);
        let circle = a.circle.expect("bore should be found");
        assert!((circle.center[0] - 2048.0).abs() <= 1.5);
        assert!((circle.center[1] - 1500.0).abs() <= 1.5);
        // 2 * 360 / 25
        assert!((a.bore_diameter_mm.unwrap() - 28.8).abs() < 0.2);

        assert_eq!(a.classification.status, EdgeStatus::Resolved { edges: 2 });
        // 1500 - 900 - 360 and 2100 - 1500 - 360, both 240 px
        let e1 = a.classification.edge1_mm.unwrap();
        let e2 = a.classification.edge2_mm.unwrap();
        assert!((e1 - 9.6).abs() < 0.2, "edge1 = {}", e1);
        assert!((e2 - 9.6).abs() < 0.2, "edge2 = {}", e2);
    }

    #[test]
    fn bore_without_chamfers_reports_diameter_only() {
        let img = draw_part_image(1600, 1200, &[BORE], None, None);
        let a = Measurer::default().measure_gray(&img, PPMM).unwrap();
        assert!(a.circle.is_some());
        assert!((a.bore_diameter_mm.unwrap() - 30.0).abs() < 0.3);
        assert!(a.edges.is_empty(), "edges: {:?}", a.edges);
        assert_eq!(a.classification.status, EdgeStatus::Resolved { edges: 0 });
        assert_eq!(a.classification.edge1_mm, None);
        assert_eq!(a.classification.edge2_mm, None);
    }

    #[test]
    fn single_chamfer_goes_to_edge1() {
        let img = draw_part_image(1600, 1200, &[BORE], None, Some(950));
        let a = Measurer::default().measure_gray(&img, PPMM).unwrap();
        assert_eq!(a.classification.status, EdgeStatus::Resolved { edges: 1 });
        assert!((a.classification.edge1_mm.unwrap() - 20.0).abs() < 0.3);
        assert_eq!(a.classification.edge2_mm, None);
    }

    #[test]
    fn missing_bore_leaves_distances_empty() {
        let img = draw_part_image(1600, 1200, &[], Some(300), Some(950));
        let a = Measurer::default().measure_gray(&img, PPMM).unwrap();
        assert_eq!(a.circle, None);
        assert_eq!(a.bore_diameter_mm, None);
        assert_eq!(a.edges.len(), 2);
        assert!(a.lines.iter().all(|l| l.distance_mm.is_none()));
        assert_eq!(a.classification.edge1_mm, None);
        assert_eq!(a.classification.edge2_mm, None);

        let row = a.to_measurement("blank.png");
        assert_eq!(row.file_name, "blank.png");
        assert_eq!(row.bore_diameter_mm, None);
    }

    #[test]
    fn two_bores_fail_the_image() {
        let img = draw_part_image(
            1600,
            1200,
            &[([450.0, 600.0], 150.0), ([1150.0, 600.0], 150.0)],
            None,
            None,
        );
        match Measurer::default().measure_gray(&img, PPMM) {
            Err(MeasureError::AmbiguousDetection { circles }) => assert_eq!(circles, 2),
            other => panic!("expected AmbiguousDetection, got {:?}", other),
        }
    }

    #[test]
    fn unsupported_resolution_fails_before_detection() {
        let img = GrayImage::new(800, 600);
        assert!(matches!(
            Measurer::default().measure_gray(&img, PPMM),
            Err(MeasureError::UnsupportedResolution {
                width: 800,
                height: 600
            })
        ));
    }

    #[test]
    fn rgb_entry_point_returns_corrected_image() {
        let gray = draw_part_image(1600, 1200, &[BORE], Some(300), None);
        let rgb = image::DynamicImage::ImageLuma8(gray).to_rgb8();
        let (a, corrected) = Measurer::default()
            .measure_rgb(&rgb, &NoCorrection, PPMM)
            .unwrap();
        assert_eq!(corrected.dimensions(), (1600, 1200));
        assert!((a.classification.edge1_mm.unwrap() - 15.0).abs() < 0.3);
    }
}
