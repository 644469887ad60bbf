//! Per-folder result table with null-tolerant summary rows.

use crate::pipeline::ImageMeasurement;

/// Label of the mean summary row in a printed table.
pub const MEAN_LABEL: &str = "mean";
/// Label of the standard deviation summary row in a printed table.
pub const STD_DEV_LABEL: &str = "std-dev";

/// Mean and population standard deviation of one column.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColumnStats {
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
}

impl ColumnStats {
    /// Statistics over the present values; missing values are skipped and an
    /// empty column yields `None` for both.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let present: Vec<f64> = values
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .collect();
        if present.is_empty() {
            return Self::default();
        }
        let n = present.len() as f64;
        let mean = present.iter().sum::<f64>() / n;
        let var = present.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        Self {
            mean: Some(mean),
            std_dev: Some(var.sqrt()),
        }
    }
}

/// The numeric columns of a result table.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SummaryRow {
    pub edge1_mm: Option<f64>,
    pub edge2_mm: Option<f64>,
    pub bore_diameter_mm: Option<f64>,
}

impl From<&ImageMeasurement> for SummaryRow {
    fn from(m: &ImageMeasurement) -> Self {
        Self {
            edge1_mm: m.edge1_mm,
            edge2_mm: m.edge2_mm,
            bore_diameter_mm: m.bore_diameter_mm,
        }
    }
}

/// An image that could not be measured.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageFailure {
    pub file_name: String,
    pub message: String,
}

/// Measurements of one image folder.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FolderResult {
    pub folder: String,
    /// Measured images in listing order.
    pub rows: Vec<ImageMeasurement>,
    pub mean: SummaryRow,
    pub std_dev: SummaryRow,
    /// Images excluded from `rows`.
    pub failures: Vec<ImageFailure>,
}

impl FolderResult {
    /// Labelled rows for display: one per image followed by the mean and
    /// standard deviation rows.
    pub fn table_rows(&self) -> Vec<(String, SummaryRow)> {
        let mut out: Vec<(String, SummaryRow)> = self
            .rows
            .iter()
            .map(|m| (m.file_name.clone(), SummaryRow::from(m)))
            .collect();
        out.push((MEAN_LABEL.to_string(), self.mean));
        out.push((STD_DEV_LABEL.to_string(), self.std_dev));
        out
    }

    /// Per-column statistics, the folder's line in a tree summary.
    pub fn summary(&self) -> FolderSummary {
        let col = |f: fn(&SummaryRow) -> Option<f64>| ColumnStats {
            mean: f(&self.mean),
            std_dev: f(&self.std_dev),
        };
        FolderSummary {
            folder: self.folder.clone(),
            edge1_mm: col(|r| r.edge1_mm),
            edge2_mm: col(|r| r.edge2_mm),
            bore_diameter_mm: col(|r| r.bore_diameter_mm),
        }
    }
}

/// Mean and deviation of every column of one folder.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FolderSummary {
    pub folder: String,
    pub edge1_mm: ColumnStats,
    pub edge2_mm: ColumnStats,
    pub bore_diameter_mm: ColumnStats,
}

/// Collects the rows of one folder run.
///
/// Scoped to a single folder; summary rows are computed once in
/// [`FolderAggregator::finish`].
#[derive(Debug, Clone, Default)]
pub struct FolderAggregator {
    folder: String,
    rows: Vec<ImageMeasurement>,
    failures: Vec<ImageFailure>,
}

impl FolderAggregator {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, row: ImageMeasurement) {
        self.rows.push(row);
    }

    pub fn push_failure(&mut self, file_name: impl Into<String>, message: impl Into<String>) {
        self.failures.push(ImageFailure {
            file_name: file_name.into(),
            message: message.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn finish(self) -> FolderResult {
        let e1 = ColumnStats::from_values(self.rows.iter().map(|r| r.edge1_mm));
        let e2 = ColumnStats::from_values(self.rows.iter().map(|r| r.edge2_mm));
        let d = ColumnStats::from_values(self.rows.iter().map(|r| r.bore_diameter_mm));
        FolderResult {
            folder: self.folder,
            rows: self.rows,
            mean: SummaryRow {
                edge1_mm: e1.mean,
                edge2_mm: e2.mean,
                bore_diameter_mm: d.mean,
            },
            std_dev: SummaryRow {
                edge1_mm: e1.std_dev,
                edge2_mm: e2.std_dev,
                bore_diameter_mm: d.std_dev,
            },
            failures: self.failures,
        }
    }
}
