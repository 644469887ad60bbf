//! boregauge: bore diameter and chamfer offset measurement from photographs
//! of cylindrical parts.
//!
//! The per-image pipeline stages are:
//!
//! 1. **Correction** – lens undistortion and perspective rectification from a
//!    stored calibration record.
//! 2. **Resolution gate** – only the supported capture sizes are measured;
//!    each selects its own bore radius window and line vote threshold.
//! 3. **Bore** – gradient Hough circle search; one circle, none, or an
//!    ambiguous result that fails the image.
//! 4. **Chamfer lines** – Hough lines on a Canny edge map, near-horizontal
//!    ones kept, gap to the bore boundary converted to millimetres.
//! 5. **Dedup** – greedy merging of detections of the same physical edge.
//! 6. **Classification** – up to two edges assigned top to bottom.
//!
//! Folder runs aggregate the per-image rows into mean and standard deviation
//! summaries that tolerate missing values.
//!
//! # Public API
//! - [`Measurer`] for single images, [`measure_folder`] / [`measure_tree`]
//!   for batches
//! - [`MeasureConfig`] for tuning, [`CalibrationRecord`] for correction
//! - result types ([`ImageAnalysis`], [`FolderResult`], [`TreeReport`])

mod aggregate;
mod annotate;
mod calibration;
mod config;
pub mod detect;
mod error;
mod folder;
pub mod geometry;
mod pipeline;

#[cfg(test)]
pub(crate) mod test_utils;

pub use aggregate::{
    ColumnStats, FolderAggregator, FolderResult, FolderSummary, ImageFailure, SummaryRow,
    MEAN_LABEL, STD_DEV_LABEL,
};
pub use annotate::annotate;
pub use calibration::{
    CalibrationRecord, ImageCorrector, LensCorrector, NoCorrection, RadialTangentialDistortion,
};
pub use config::{
    AnnotateConfig, CaptureResolution, CircleConfig, DedupConfig, DenoiseConfig, DetectionParams,
    LineConfig, MeasureConfig, ResolutionTable, REFERENCE_WIDTH_PX,
};
pub use detect::{CircleDetection, CircleOutcome, FinalEdge, LineCandidate};
pub use error::MeasureError;
pub use folder::{
    is_measurable_image, list_images, measure_folder, measure_tree, FolderOptions, TreeOptions,
    TreeReport, DEFAULT_RESULTS_DIR, IMAGE_EXTENSIONS,
};
pub use pipeline::{
    classify_edges, EdgeClassification, EdgeStatus, ImageAnalysis, ImageMeasurement, Measurer,
};
