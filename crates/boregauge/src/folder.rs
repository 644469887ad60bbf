//! Folder and folder-tree measurement runs.
//!
//! A folder run measures every accepted image of one directory and
//! aggregates the rows. A tree run treats each immediate subdirectory of a
//! root as one folder run, skipping the results directory and calibration
//! captures.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::aggregate::{FolderAggregator, FolderResult, FolderSummary};
use crate::annotate::annotate;
use crate::calibration::{CalibrationRecord, ImageCorrector};
use crate::error::MeasureError;
use crate::pipeline::{ImageMeasurement, Measurer};

/// File extensions measured in a folder run (case-sensitive).
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "png", "bmp"];

/// Default name of the directory receiving annotated images.
pub const DEFAULT_RESULTS_DIR: &str = "results";

/// Subfolders whose name contains this marker hold calibration captures.
pub const CALIBRATION_FOLDER_MARKER: &str = "kal";

pub fn is_measurable_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e))
}

/// Accepted image files of `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, MeasureError> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_measurable_image(&path) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[derive(Debug, Clone, Default)]
pub struct FolderOptions {
    /// Measure images concurrently. Row order still follows the listing.
    pub parallel: bool,
    /// Write annotated images into this directory when set.
    pub annotate_dir: Option<PathBuf>,
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn measure_one(
    path: &Path,
    measurer: &Measurer,
    corrector: &dyn ImageCorrector,
    ppmm: f64,
    annotate_dir: Option<&Path>,
) -> Result<ImageMeasurement, MeasureError> {
    let (analysis, mut corrected) = measurer.measure_file(path, corrector, ppmm)?;
    let file_name = file_name_of(path);

    if let Some(dir) = annotate_dir {
        annotate(&mut corrected, &analysis, &measurer.config().annotate);
        let out = dir.join(&file_name);
        // A failed overlay does not invalidate the measurement.
        if let Err(e) = corrected.save(&out) {
            tracing::warn!("could not write annotated image {}: {}", out.display(), e);
        }
    }
    Ok(analysis.to_measurement(file_name))
}

/// Measure every accepted image of `dir`.
///
/// Images that fail (unsupported size, several bore circles, unreadable
/// file) are logged, left out of the rows and listed in
/// [`FolderResult::failures`]. Only an unreadable directory or an unusable
/// calibration fails the whole run.
pub fn measure_folder(
    dir: &Path,
    measurer: &Measurer,
    calibration: &CalibrationRecord,
    options: &FolderOptions,
) -> Result<FolderResult, MeasureError> {
    let corrector = calibration.corrector()?;
    let images = list_images(dir)?;
    tracing::info!("{}: {} images", dir.display(), images.len());

    let annotate_dir = options.annotate_dir.as_deref();
    if let Some(d) = annotate_dir {
        std::fs::create_dir_all(d)?;
    }

    let run = |path: &PathBuf| {
        measure_one(path, measurer, corrector.as_ref(), calibration.ppmm, annotate_dir)
    };
    let outcomes: Vec<Result<ImageMeasurement, MeasureError>> = if options.parallel {
        images.par_iter().map(run).collect()
    } else {
        images.iter().map(run).collect()
    };

    let mut agg = FolderAggregator::new(file_name_of(dir));
    for (path, outcome) in images.iter().zip(outcomes) {
        match outcome {
            Ok(row) => agg.push(row),
            Err(e) => {
                let name = file_name_of(path);
                tracing::warn!("skipping {}: {}", name, e);
                agg.push_failure(name, e.to_string());
            }
        }
    }
    Ok(agg.finish())
}

#[derive(Debug, Clone)]
pub struct TreeOptions {
    pub parallel: bool,
    /// Name of the results directory under the root; never measured.
    pub results_dir: String,
    /// Write annotated images to `<root>/<results_dir>/<subfolder>/`.
    pub annotate: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            results_dir: DEFAULT_RESULTS_DIR.to_string(),
            annotate: false,
        }
    }
}

/// Folder results of a tree run plus one summary line per folder.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TreeReport {
    pub folders: Vec<FolderResult>,
    pub summary: Vec<FolderSummary>,
}

/// Whether a subfolder named `name` takes part in a tree run.
pub fn is_measurement_folder(name: &str, results_dir: &str) -> bool {
    name != results_dir && !name.contains(CALIBRATION_FOLDER_MARKER)
}

/// Measure every subfolder of `root`, sorted by name.
pub fn measure_tree(
    root: &Path,
    measurer: &Measurer,
    calibration: &CalibrationRecord,
    options: &TreeOptions,
) -> Result<TreeReport, MeasureError> {
    let mut subfolders = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let name = file_name_of(&path);
        if is_measurement_folder(&name, &options.results_dir) {
            subfolders.push((name, path));
        } else {
            tracing::info!("skipping folder {}", name);
        }
    }
    subfolders.sort();

    let mut folders = Vec::with_capacity(subfolders.len());
    for (name, path) in subfolders {
        let folder_opts = FolderOptions {
            parallel: options.parallel,
            annotate_dir: options
                .annotate
                .then(|| root.join(&options.results_dir).join(&name)),
        };
        folders.push(measure_folder(&path, measurer, calibration, &folder_opts)?);
    }
    let summary = folders.iter().map(FolderResult::summary).collect();
    Ok(TreeReport { folders, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::draw_part_image;
    use image::GrayImage;
    use tempfile::tempdir;

    fn save(img: &GrayImage, path: &Path) {
        image::DynamicImage::ImageLuma8(img.clone())
            .to_rgb8()
            .save(path)
            .unwrap();
    }

    fn good_part() -> GrayImage {
        draw_part_image(1600, 1200, &[([800.0, 600.0], 150.0)], Some(300), Some(950))
    }

    #[test]
    fn extension_filter_is_case_sensitive() {
        assert!(is_measurable_image(Path::new("a.png")));
        assert!(is_measurable_image(Path::new("dir/part.v2.jpg")));
        assert!(is_measurable_image(Path::new("b.bmp")));
        assert!(!is_measurable_image(Path::new("a.PNG")));
        assert!(!is_measurable_image(Path::new("notes.txt")));
        assert!(!is_measurable_image(Path::new("no_extension")));
    }

    #[test]
    fn folder_names_excluded_from_tree_runs() {
        assert!(is_measurement_folder("batch-1", "results"));
        assert!(!is_measurement_folder("results", "results"));
        assert!(!is_measurement_folder("kalibrointi", "results"));
        assert!(!is_measurement_folder("2024_kal_02", "results"));
    }

    #[test]
    fn list_images_is_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        for name in ["c.png", "a.bmp", "b.txt", "B.jpg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();
        let names: Vec<String> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_name_of(p))
            .collect();
        assert_eq!(names, vec!["B.jpg", "a.bmp", "c.png"]);
    }

    #[test]
    fn failed_images_are_excluded_and_siblings_still_measured() {
        let dir = tempdir().unwrap();
        save(&good_part(), &dir.path().join("a_good.png"));
        save(
            &draw_part_image(
                1600,
                1200,
                &[([450.0, 600.0], 150.0), ([1150.0, 600.0], 150.0)],
                None,
                None,
            ),
            &dir.path().join("b_two_bores.png"),
        );
        save(&GrayImage::new(640, 480), &dir.path().join("c_small.png"));
        std::fs::write(dir.path().join("d_notes.txt"), "not an image").unwrap();

        let calib = CalibrationRecord::identity(1600, 1200, 10.0);
        let res = measure_folder(
            dir.path(),
            &Measurer::default(),
            &calib,
            &FolderOptions::default(),
        )
        .unwrap();

        assert_eq!(res.rows.len(), 1);
        assert_eq!(res.rows[0].file_name, "a_good.png");
        let failed: Vec<&str> = res.failures.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(failed, vec!["b_two_bores.png", "c_small.png"]);

        assert!((res.mean.bore_diameter_mm.unwrap() - 30.0).abs() < 0.3);
        assert!((res.mean.edge1_mm.unwrap() - 15.0).abs() < 0.3);
        assert!((res.mean.edge2_mm.unwrap() - 20.0).abs() < 0.3);
        assert_eq!(res.std_dev.edge1_mm, Some(0.0));
    }

    #[test]
    fn parallel_run_matches_sequential_order() {
        let dir = tempdir().unwrap();
        save(&good_part(), &dir.path().join("a.png"));
        save(&GrayImage::new(640, 480), &dir.path().join("b.png"));
        save(
            &draw_part_image(1600, 1200, &[([800.0, 600.0], 150.0)], Some(300), None),
            &dir.path().join("c.png"),
        );

        let calib = CalibrationRecord::identity(1600, 1200, 10.0);
        let m = Measurer::default();
        let seq = measure_folder(dir.path(), &m, &calib, &FolderOptions::default()).unwrap();
        let par = measure_folder(
            dir.path(),
            &m,
            &calib,
            &FolderOptions {
                parallel: true,
                annotate_dir: None,
            },
        )
        .unwrap();
        assert_eq!(seq, par);
        let names: Vec<&str> = par.rows.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
    }

    #[test]
    fn tree_run_skips_results_and_calibration_folders() {
        let root = tempdir().unwrap();
        for sub in ["batch1", "kalibrointi", "results"] {
            std::fs::create_dir(root.path().join(sub)).unwrap();
            save(&good_part(), &root.path().join(sub).join("p.png"));
        }
        std::fs::write(root.path().join("readme.txt"), "x").unwrap();

        let calib = CalibrationRecord::identity(1600, 1200, 10.0);
        let opts = TreeOptions {
            annotate: true,
            ..Default::default()
        };
        let report = measure_tree(root.path(), &Measurer::default(), &calib, &opts).unwrap();

        assert_eq!(report.folders.len(), 1);
        assert_eq!(report.folders[0].folder, "batch1");
        assert_eq!(report.summary.len(), 1);
        assert_eq!(report.summary[0].folder, "batch1");
        assert!((report.summary[0].bore_diameter_mm.mean.unwrap() - 30.0).abs() < 0.3);

        let annotated = root.path().join("results").join("batch1").join("p.png");
        assert!(annotated.is_file());
        assert!(!root.path().join("results").join("results").exists());
    }
}
