//! boregauge CLI: measure bore diameters and chamfer offsets in part images.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use boregauge::{
    CalibrationRecord, FolderOptions, FolderResult, MeasureConfig, Measurer, TreeOptions,
    TreeReport, DEFAULT_RESULTS_DIR,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "boregauge")]
#[command(
    about = "Measure bore diameter and chamfer offsets of cylindrical parts from photographs"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure a single image.
    MeasureImage(CliImageArgs),

    /// Measure every image of one folder.
    MeasureFolder(CliFolderArgs),

    /// Measure every subfolder of a root folder.
    MeasureTree(CliTreeArgs),

    /// Print the default measurement configuration (JSON).
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct CliCalibArgs {
    /// Calibration record (JSON) with camera matrices and ppmm.
    #[arg(long)]
    calib: Option<PathBuf>,

    /// Pixels per millimetre for images that need no correction.
    /// Ignored when --calib is given.
    #[arg(long)]
    ppmm: Option<f64>,

    /// Measurement configuration (JSON); missing fields keep defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl CliCalibArgs {
    fn load(&self) -> CliResult<(CalibrationRecord, Measurer)> {
        let calib = match (&self.calib, self.ppmm) {
            (Some(path), _) => {
                tracing::info!("Loading calibration: {}", path.display());
                CalibrationRecord::from_json_file(path)?
            }
            // Identity record: measured without resampling.
            (None, Some(ppmm)) => {
                let record = CalibrationRecord::identity(1600, 1200, ppmm);
                record.validate()?;
                record
            }
            (None, None) => return Err("provide --calib or --ppmm".into()),
        };
        let config = match &self.config {
            Some(path) => MeasureConfig::from_json_file(path)?,
            None => MeasureConfig::default(),
        };
        Ok((calib, Measurer::new(config)))
    }
}

#[derive(Debug, Clone, Args)]
struct CliImageArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Path to write the full analysis (JSON).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Path to write the annotated, corrected image.
    #[arg(long)]
    annotated: Option<PathBuf>,

    #[command(flatten)]
    calib: CliCalibArgs,
}

#[derive(Debug, Clone, Args)]
struct CliFolderArgs {
    /// Folder holding the images.
    #[arg(long)]
    dir: PathBuf,

    /// Path to write the folder result (JSON).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write annotated images to <dir>/../<NAME>/<folder name>/.
    #[arg(long)]
    results_dir: Option<String>,

    /// Measure images on all cores.
    #[arg(long)]
    parallel: bool,

    #[command(flatten)]
    calib: CliCalibArgs,
}

#[derive(Debug, Clone, Args)]
struct CliTreeArgs {
    /// Root folder; every subfolder is one batch.
    #[arg(long)]
    root: PathBuf,

    /// Path to write the tree report (JSON).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Results folder under the root (skipped when measuring).
    #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
    results_dir: String,

    /// Write annotated images to <root>/<results-dir>/<subfolder>/.
    #[arg(long)]
    annotate: bool,

    /// Measure images on all cores.
    #[arg(long)]
    parallel: bool,

    #[command(flatten)]
    calib: CliCalibArgs,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::MeasureImage(args) => run_measure_image(&args),
        Commands::MeasureFolder(args) => run_measure_folder(&args),
        Commands::MeasureTree(args) => run_measure_tree(&args),
        Commands::DefaultConfig => run_default_config(),
    }
}

fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, &json)?;
    tracing::info!("Results written to {}", path.display());
    Ok(())
}

fn fmt_mm(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

fn print_folder_table(res: &FolderResult) {
    println!("{}", res.folder);
    println!(
        "  {:<32} {:>10} {:>10} {:>12}",
        "image", "edge 1", "edge 2", "diameter"
    );
    for (label, row) in res.table_rows() {
        println!(
            "  {:<32} {:>10} {:>10} {:>12}",
            label,
            fmt_mm(row.edge1_mm),
            fmt_mm(row.edge2_mm),
            fmt_mm(row.bore_diameter_mm)
        );
    }
    for f in &res.failures {
        println!("  failed: {} ({})", f.file_name, f.message);
    }
}

fn print_tree_summary(report: &TreeReport) {
    println!(
        "{:<24} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "folder", "e1 mean", "e1 std", "e2 mean", "e2 std", "d mean", "d std"
    );
    for s in &report.summary {
        println!(
            "{:<24} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            s.folder,
            fmt_mm(s.edge1_mm.mean),
            fmt_mm(s.edge1_mm.std_dev),
            fmt_mm(s.edge2_mm.mean),
            fmt_mm(s.edge2_mm.std_dev),
            fmt_mm(s.bore_diameter_mm.mean),
            fmt_mm(s.bore_diameter_mm.std_dev),
        );
    }
}

// ── measure-image ──────────────────────────────────────────────────────

fn run_measure_image(args: &CliImageArgs) -> CliResult<()> {
    let (calib, measurer) = args.calib.load()?;
    let corrector = calib.corrector()?;

    let (analysis, mut corrected) =
        measurer.measure_file(&args.image, corrector.as_ref(), calib.ppmm)?;

    tracing::info!(
        "Image {}x{}, {} lines -> {} edges",
        analysis.image_size[0],
        analysis.image_size[1],
        analysis.lines.len(),
        analysis.edges.len()
    );
    println!("bore diameter: {} mm", fmt_mm(analysis.bore_diameter_mm));
    println!("edge 1:        {} mm", fmt_mm(analysis.classification.edge1_mm));
    println!("edge 2:        {} mm", fmt_mm(analysis.classification.edge2_mm));

    if let Some(out) = &args.out {
        write_json(&analysis, out)?;
    }
    if let Some(path) = &args.annotated {
        boregauge::annotate(&mut corrected, &analysis, &measurer.config().annotate);
        corrected.save(path).map_err(|e| -> CliError {
            format!("Failed to write {}: {}", path.display(), e).into()
        })?;
        tracing::info!("Annotated image written to {}", path.display());
    }
    Ok(())
}

// ── measure-folder ─────────────────────────────────────────────────────

fn run_measure_folder(args: &CliFolderArgs) -> CliResult<()> {
    let (calib, measurer) = args.calib.load()?;

    let annotate_dir = match &args.results_dir {
        Some(name) => {
            let folder = args
                .dir
                .file_name()
                .ok_or_else(|| -> CliError { "--dir has no folder name".into() })?;
            let parent = args.dir.parent().unwrap_or_else(|| Path::new("."));
            Some(parent.join(name).join(folder))
        }
        None => None,
    };
    let options = FolderOptions {
        parallel: args.parallel,
        annotate_dir,
    };

    let res = boregauge::measure_folder(&args.dir, &measurer, &calib, &options)?;
    tracing::info!(
        "Measured {} images ({} failed)",
        res.rows.len(),
        res.failures.len()
    );
    print_folder_table(&res);

    if let Some(out) = &args.out {
        write_json(&res, out)?;
    }
    Ok(())
}

// ── measure-tree ───────────────────────────────────────────────────────

fn run_measure_tree(args: &CliTreeArgs) -> CliResult<()> {
    let (calib, measurer) = args.calib.load()?;
    let options = TreeOptions {
        parallel: args.parallel,
        results_dir: args.results_dir.clone(),
        annotate: args.annotate,
    };

    let report = boregauge::measure_tree(&args.root, &measurer, &calib, &options)?;
    tracing::info!("Measured {} folders", report.folders.len());
    for res in &report.folders {
        print_folder_table(res);
        println!();
    }
    print_tree_summary(&report);

    if let Some(out) = &args.out {
        write_json(&report, out)?;
    }
    Ok(())
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config() -> CliResult<()> {
    let json = serde_json::to_string_pretty(&MeasureConfig::default())?;
    println!("{}", json);
    Ok(())
}
