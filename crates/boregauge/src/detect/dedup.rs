//! Merging of duplicate chamfer line detections.
//!
//! One physical edge usually yields several Hough peaks a few pixels apart.
//! Candidates are grouped greedily: each unconsumed candidate, in detection
//! order, absorbs every later unconsumed candidate whose offset lies within
//! the tolerance. Grouping is not transitive and depends on the input order.

use super::line::LineCandidate;
use crate::config::DedupConfig;

/// A deduplicated physical edge.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FinalEdge {
    /// Mean gap of the cluster members (mm); `None` without a bore.
    pub distance_mm: Option<f64>,
    /// Vertical position of the representative detection.
    pub y_mean: f64,
    /// Offset of the representative detection (pixels).
    pub rho: f64,
    /// Number of detections merged into this edge.
    pub members: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineDeduplicator {
    tolerance_px: f64,
    sort_by_offset: bool,
}

impl LineDeduplicator {
    pub fn new(tolerance_px: f64) -> Self {
        Self {
            tolerance_px,
            sort_by_offset: false,
        }
    }

    /// Deduplicator with the tolerance scaled to `image_width`.
    pub fn from_config(config: &DedupConfig, image_width: u32) -> Self {
        Self {
            tolerance_px: config.tolerance_for_width(image_width),
            sort_by_offset: config.sort_by_offset,
        }
    }

    /// Cluster in ascending offset order instead of detection order.
    pub fn with_sort_by_offset(mut self, sort: bool) -> Self {
        self.sort_by_offset = sort;
        self
    }

    pub fn tolerance_px(&self) -> f64 {
        self.tolerance_px
    }

    pub fn dedup(&self, lines: &[LineCandidate]) -> Vec<FinalEdge> {
        let mut order: Vec<usize> = (0..lines.len()).collect();
        if self.sort_by_offset {
            order.sort_by(|&a, &b| lines[a].rho.total_cmp(&lines[b].rho));
        }

        let mut consumed = vec![false; lines.len()];
        let mut edges = Vec::new();
        for (pos, &i) in order.iter().enumerate() {
            if consumed[i] {
                continue;
            }
            consumed[i] = true;
            let rep = &lines[i];
            let mut members = vec![i];
            for &j in &order[pos + 1..] {
                if !consumed[j] && (lines[j].rho - rep.rho).abs() < self.tolerance_px {
                    consumed[j] = true;
                    members.push(j);
                }
            }

            let distances: Vec<f64> = members
                .iter()
                .filter_map(|&m| lines[m].distance_mm)
                .collect();
            let distance_mm = (!distances.is_empty())
                .then(|| distances.iter().sum::<f64>() / distances.len() as f64);

            edges.push(FinalEdge {
                distance_mm,
                y_mean: rep.y_mean,
                rho: rep.rho,
                members: members.len(),
            });
        }
        edges
    }
}
