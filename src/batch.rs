//! Fan-out/fan-in over a fixed set of worker threads.
//!
//! Workers claim item indices from a shared atomic cursor and send each
//! outcome back over a channel. Results come back in input order, and one
//! failing item never affects the others. Aggregation happens only after
//! every worker has finished.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::analysis::{self, PatternReport};
use crate::error::{ErrorKind, PipelineError};
use crate::ingest;
use crate::workflow::{ImageReport, Workflow};

pub const DEFAULT_MAX_BATCH: usize = 20;

pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(PipelineError::invalid("worker count must be at least 1").into());
        }
        Ok(Self { workers })
    }

    /// One worker per available core.
    pub fn per_core() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn run<T, R, F>(&self, items: &[T], work: F) -> Vec<Result<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Result<R> + Sync,
    {
        self.run_observed(items, work, |_, _| {})
    }

    /// Like [`run`](Self::run), calling `observe` as each item finishes.
    /// `observe` runs on the calling thread, in completion order.
    pub fn run_observed<T, R, F, O>(&self, items: &[T], work: F, mut observe: O) -> Vec<Result<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Result<R> + Sync,
        O: FnMut(usize, &Result<R>),
    {
        if items.is_empty() {
            return Vec::new();
        }
        let mut slots: Vec<Option<Result<R>>> = items.iter().map(|_| None).collect();

        let cursor = AtomicUsize::new(0);
        let workers = self.workers.min(items.len());
        let (tx, rx) = mpsc::channel::<(usize, Result<R>)>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let cursor = &cursor;
                let work = &work;
                scope.spawn(move || loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(item) = items.get(index) else {
                        break;
                    };
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(item)))
                        .unwrap_or_else(|_| {
                            Err(PipelineError::new(
                                ErrorKind::BatchItem,
                                format!("item {index} panicked"),
                            )
                            .into())
                        });
                    if tx.send((index, outcome)).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for (index, outcome) in rx {
                observe(index, &outcome);
                slots[index] = Some(outcome);
            }
        });

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    Err(PipelineError::new(
                        ErrorKind::BatchItem,
                        format!("worker stopped before finishing item {index}"),
                    )
                    .into())
                })
            })
            .collect()
    }
}

/// Result for one input. `R` is the per-item report of the operation that ran.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchItemOutcome<R = ImageReport> {
    Completed {
        input: PathBuf,
        #[serde(flatten)]
        report: R,
    },
    Failed {
        input: PathBuf,
        /// Code of the underlying error kind, `BATCH_ITEM` when untyped.
        code: &'static str,
        error: String,
    },
}

impl<R> BatchItemOutcome<R> {
    pub fn from_result(input: &Path, result: Result<R>) -> Self {
        match result {
            Ok(report) => BatchItemOutcome::Completed {
                input: input.to_path_buf(),
                report,
            },
            Err(err) => {
                let kind = PipelineError::kind_of(&err).unwrap_or(ErrorKind::BatchItem);
                log::warn!("{} failed: {:#}", input.display(), err);
                BatchItemOutcome::Failed {
                    input: input.to_path_buf(),
                    code: kind.code(),
                    error: format!("{err:#}"),
                }
            }
        }
    }

    pub fn input(&self) -> &Path {
        match self {
            BatchItemOutcome::Completed { input, .. } | BatchItemOutcome::Failed { input, .. } => {
                input
            }
        }
    }

    pub fn report(&self) -> Option<&R> {
        match self {
            BatchItemOutcome::Completed { report, .. } => Some(report),
            BatchItemOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, BatchItemOutcome::Failed { .. })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchReport {
    pub total_images: usize,
    pub processed: usize,
    pub failed: usize,
    pub total_threats: usize,
    pub image_results: Vec<BatchItemOutcome>,
    pub pattern_analysis: PatternReport,
    /// Seconds since the Unix epoch.
    pub completed_at: u64,
}

/// Run `workflow` over every input and aggregate the detections.
///
/// `on_item` is called as each image finishes, from the calling thread.
pub fn run_batch(
    workflow: &Workflow,
    pool: &WorkerPool,
    inputs: &[PathBuf],
    max_images: usize,
    mut on_item: impl FnMut(&BatchItemOutcome),
) -> Result<BatchReport> {
    if inputs.len() > max_images {
        return Err(PipelineError::invalid(format!(
            "maximum {} images per batch, got {}",
            max_images,
            inputs.len()
        ))
        .into());
    }

    let image_results = run_each(pool, inputs, |input| workflow.process(input), on_item);
    summarize(image_results)
}

/// Run `work` over every input on `pool`. Each failure stays attached to its
/// input; the returned outcomes are in input order.
pub fn run_each<R, F>(
    pool: &WorkerPool,
    inputs: &[PathBuf],
    work: F,
    mut on_item: impl FnMut(&BatchItemOutcome<R>),
) -> Vec<BatchItemOutcome<R>>
where
    R: Send,
    F: Fn(&Path) -> Result<R> + Sync,
{
    let results = pool.run_observed(
        inputs,
        |input| Ok(BatchItemOutcome::from_result(input, work(input))),
        |_, result| {
            if let Ok(outcome) = result {
                on_item(outcome);
            }
        },
    );
    results
        .into_iter()
        .zip(inputs)
        .map(|(result, input)| {
            result.unwrap_or_else(|err| BatchItemOutcome::from_result(input, Err(err)))
        })
        .collect()
}

fn summarize(image_results: Vec<BatchItemOutcome>) -> Result<BatchReport> {
    let pattern_analysis = analysis::analyze(
        image_results
            .iter()
            .filter_map(BatchItemOutcome::report)
            .flat_map(|r| r.detection.detections.iter()),
    );
    let failed = image_results.iter().filter(|o| o.is_failed()).count();
    let report = BatchReport {
        total_images: image_results.len(),
        processed: image_results.len() - failed,
        failed,
        total_threats: pattern_analysis.total_threats(),
        image_results,
        pattern_analysis,
        completed_at: crate::now_s()?,
    };
    log::info!(
        "batch done: {} images, {} failed, {} threats",
        report.total_images,
        report.failed,
        report.total_threats
    );
    Ok(report)
}

/// Expand directories into the supported image files they contain, sorted
/// by name. Plain file arguments are kept as given.
pub fn expand_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)
                .map_err(|e| anyhow!("failed to read directory {}: {}", path.display(), e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && ingest::is_supported_format(p))
                .collect();
            found.sort();
            inputs.extend(found);
        } else {
            inputs.push(path.clone());
        }
    }
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn results_come_back_in_input_order() {
        let pool = WorkerPool::new(3).unwrap();
        let items: Vec<u64> = (0..12).collect();
        let results = pool.run(&items, |&n| {
            thread::sleep(Duration::from_millis((12 - n) * 2));
            Ok(n * 10)
        });
        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..12).map(|n| n * 10).collect::<Vec<_>>());
    }

    #[test]
    fn one_failure_does_not_cancel_the_rest() {
        let pool = WorkerPool::new(2).unwrap();
        let items = vec![1, 2, 3, 4];
        let results = pool.run(&items, |&n| {
            if n == 2 {
                Err(anyhow!("item {n} is corrupt"))
            } else {
                Ok(n)
            }
        });
        assert_eq!(results.len(), 4);
        assert!(results[1].is_err());
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
    }

    #[test]
    fn observer_sees_every_item() {
        let pool = WorkerPool::new(4).unwrap();
        let items: Vec<usize> = (0..9).collect();
        let mut seen = Vec::new();
        pool.run_observed(&items, |&n| Ok(n), |index, _| seen.push(index));
        seen.sort();
        assert_eq!(seen, items);
    }

    #[test]
    fn run_each_attributes_failures_to_their_inputs() {
        let pool = WorkerPool::new(2).unwrap();
        let inputs: Vec<PathBuf> = ["a.png", "b.png", "c.png", "d.png"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let mut seen = 0;
        let outcomes = run_each(
            &pool,
            &inputs,
            |input| match input.to_str() {
                Some("b.png") => Err(PipelineError::image_load("b.png is corrupt").into()),
                Some("c.png") => panic!("decoder blew up"),
                _ => Ok(input.to_string_lossy().len()),
            },
            |_| seen += 1,
        );
        assert_eq!(seen, 4);
        let inputs_back: Vec<&Path> = outcomes.iter().map(BatchItemOutcome::input).collect();
        assert_eq!(inputs_back, inputs.iter().map(PathBuf::as_path).collect::<Vec<_>>());
        assert_eq!(outcomes[0].report(), Some(&5));
        assert_eq!(outcomes[3].report(), Some(&5));
        match (&outcomes[1], &outcomes[2]) {
            (
                BatchItemOutcome::Failed { code: load, .. },
                BatchItemOutcome::Failed { code: panicked, .. },
            ) => {
                assert_eq!(*load, "IMAGE_LOAD");
                assert_eq!(*panicked, "BATCH_ITEM");
            }
            other => panic!("expected two failures, got {other:?}"),
        }
    }

    #[test]
    fn zero_workers_is_invalid() {
        let err = WorkerPool::new(0).err().unwrap();
        assert_eq!(
            PipelineError::kind_of(&err),
            Some(ErrorKind::InvalidParameters)
        );
    }

    #[test]
    fn empty_input_runs_nothing() {
        let pool = WorkerPool::per_core();
        let results: Vec<Result<()>> = pool.run(&Vec::<u8>::new(), |_| Ok(()));
        assert!(results.is_empty());
    }

    #[test]
    fn expand_inputs_lists_supported_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let inputs = expand_inputs(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }
}
