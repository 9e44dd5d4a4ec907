//! tidewatch - enhance underwater imagery and report maritime threats

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use tidewatch::batch::{self, BatchItemOutcome, WorkerPool};
use tidewatch::detect::{self, Detection, DetectorBackend, ReplayBackend, SidecarBackend};
use tidewatch::metrics::{self, QualityReport};
use tidewatch::ui::{ItemProgress, Ui};
use tidewatch::workflow::EnhanceReport;
use tidewatch::{analysis, TidewatchConfig, Workflow};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE", global = true)]
    ui: String,
    /// Directory for enhanced and annotated images (overrides config).
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    /// Produce reports without writing any image.
    #[arg(long, global = true)]
    no_write: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enhance images and score each result against its original.
    Enhance {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Worker threads (overrides config).
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Compare an original image with an enhanced one.
    Metrics { original: PathBuf, enhanced: PathBuf },
    /// Classify and draw detector output for one image.
    Detect {
        input: PathBuf,
        /// Enhance the image before detection.
        #[arg(long)]
        enhance: bool,
        #[command(flatten)]
        detection: DetectionArgs,
    },
    /// Aggregate detections from earlier `detect` reports or detection lists.
    Analyze {
        #[arg(required = true)]
        reports: Vec<PathBuf>,
    },
    /// Run the full chain over images or directories of images.
    Batch {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Worker threads (overrides config).
        #[arg(long)]
        workers: Option<usize>,
        #[command(flatten)]
        detection: DetectionArgs,
    },
    /// List the threat taxonomy.
    Threats,
}

#[derive(Args, Debug)]
struct DetectionArgs {
    /// JSON file of raw detections to apply to every image.
    #[arg(long, conflicts_with = "sidecar_dir")]
    detections: Option<PathBuf>,
    /// Directory holding `<image>.detections.json` sidecars.
    #[arg(long)]
    sidecar_dir: Option<PathBuf>,
    #[arg(long)]
    confidence_threshold: Option<f64>,
    #[arg(long)]
    nms_threshold: Option<f32>,
    #[arg(long)]
    max_detections: Option<usize>,
}

impl DetectionArgs {
    fn apply(&self, cfg: &mut TidewatchConfig) {
        if let Some(v) = self.confidence_threshold {
            cfg.detection.params.confidence_threshold = v;
        }
        if let Some(v) = self.nms_threshold {
            cfg.detection.params.nms_threshold = v;
        }
        if let Some(v) = self.max_detections {
            cfg.detection.params.max_detections = v;
        }
        if let Some(dir) = &self.sidecar_dir {
            cfg.detection.sidecar_dir = Some(dir.clone());
        }
    }

    fn backend(&self, cfg: &TidewatchConfig) -> Result<Box<dyn DetectorBackend>> {
        if let Some(path) = &self.detections {
            return Ok(Box::new(ReplayBackend::from_file(path)?));
        }
        Ok(match &cfg.detection.sidecar_dir {
            Some(dir) => Box::new(SidecarBackend::in_dir(dir)),
            None => Box::new(SidecarBackend::beside_images()),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetectionsFile {
    List(Vec<Detection>),
    Report { detections: Vec<Detection> },
}

#[derive(Serialize)]
struct EnhanceOutput {
    total_images: usize,
    processed: usize,
    failed: usize,
    image_results: Vec<BatchItemOutcome<EnhanceReport>>,
}

#[derive(Serialize)]
struct ReportRead {
    detections: usize,
}

#[derive(Serialize)]
struct AnalyzeOutput {
    total_reports: usize,
    failed: usize,
    total_threats: usize,
    report_results: Vec<BatchItemOutcome<ReportRead>>,
    pattern_analysis: analysis::PatternReport,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&cli.ui), is_tty, !stdout_is_tty);

    let mut cfg = ui.run("Load config", TidewatchConfig::load)?;
    if let Some(dir) = &cli.output_dir {
        cfg.output.dir = dir.clone();
    }
    if cli.no_write {
        cfg.output.write_images = false;
    }

    match &cli.command {
        Command::Enhance { inputs, workers } => {
            if let Some(n) = workers {
                cfg.batch.workers = *n;
            }
            cfg.validate()?;
            let inputs = batch::expand_inputs(inputs)?;
            let workflow = Workflow::from_config(&cfg, None)?;
            let pool = WorkerPool::new(cfg.batch.workers)?;
            let mut progress = ui.items(inputs.len(), "images");
            let image_results = batch::run_each(
                &pool,
                &inputs,
                |input| workflow.enhance(input),
                |outcome| track(&mut progress, outcome),
            );
            progress.finish();
            let failed = image_results.iter().filter(|o| o.is_failed()).count();
            print_json(&EnhanceOutput {
                total_images: image_results.len(),
                processed: image_results.len() - failed,
                failed,
                image_results,
            })
        }
        Command::Metrics { original, enhanced } => {
            let report = ui.run("Compute metrics", || {
                let m = metrics::evaluate_files(original, enhanced)?;
                Ok(QualityReport::new(m, &cfg.quality))
            })?;
            print_json(&report)
        }
        Command::Detect {
            input,
            enhance,
            detection,
        } => {
            detection.apply(&mut cfg);
            cfg.validate()?;
            let workflow = Workflow::from_config(&cfg, Some(detection.backend(&cfg)?))?;
            let report = ui.run(&format!("Detect {}", input.display()), || {
                workflow.detect(input, *enhance)
            })?;
            print_json(&report)
        }
        Command::Analyze { reports } => {
            let mut detections = Vec::new();
            let mut progress = ui.items(reports.len(), "reports");
            let report_results: Vec<BatchItemOutcome<ReportRead>> = reports
                .iter()
                .map(|path| {
                    let read = read_detections(path).map(|list| {
                        let count = list.len();
                        detections.extend(list);
                        ReportRead { detections: count }
                    });
                    let outcome = BatchItemOutcome::from_result(path, read);
                    track(&mut progress, &outcome);
                    outcome
                })
                .collect();
            progress.finish();
            let pattern_analysis = analysis::analyze(&detections);
            print_json(&AnalyzeOutput {
                total_reports: reports.len(),
                failed: report_results.iter().filter(|o| o.is_failed()).count(),
                total_threats: pattern_analysis.total_threats(),
                report_results,
                pattern_analysis,
            })
        }
        Command::Batch {
            inputs,
            workers,
            detection,
        } => {
            detection.apply(&mut cfg);
            if let Some(n) = workers {
                cfg.batch.workers = *n;
            }
            cfg.validate()?;
            let inputs = batch::expand_inputs(inputs)?;
            if inputs.is_empty() {
                return Err(anyhow!("no supported images found"));
            }
            let workflow = Workflow::from_config(&cfg, Some(detection.backend(&cfg)?))?;
            let pool = WorkerPool::new(cfg.batch.workers)?;
            let mut progress = ui.items(inputs.len(), "images");
            let report = batch::run_batch(
                &workflow,
                &pool,
                &inputs,
                cfg.batch.max_images,
                |outcome| track(&mut progress, outcome),
            )?;
            progress.finish();
            print_json(&report)
        }
        Command::Threats => print_json(&detect::catalogue()),
    }
}

fn track<R>(progress: &mut ItemProgress, outcome: &BatchItemOutcome<R>) {
    progress.item_done(&outcome.input().display().to_string(), outcome.is_failed());
}

fn read_detections(path: &Path) -> Result<Vec<Detection>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file: DetectionsFile = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid detections in {}: {}", path.display(), e))?;
    Ok(match file {
        DetectionsFile::List(list) => list,
        DetectionsFile::Report { detections } => detections,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
