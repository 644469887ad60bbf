//! Feature detectors: bore circle, chamfer lines and their deduplication.

pub mod circle;
pub mod dedup;
pub mod line;

pub use circle::{detect_circle, find_circles, CircleDetection, CircleOutcome};
pub use dedup::{FinalEdge, LineDeduplicator};
pub use line::{detect_lines, hough_lines, HoughLine, LineCandidate};
