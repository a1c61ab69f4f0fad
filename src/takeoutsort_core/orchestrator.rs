use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::unbounded;
use indicatif::ProgressBar;

use crate::takeoutsort_core::error::Result;
use crate::takeoutsort_core::exif::MetadataTool;
use crate::takeoutsort_core::ledger::Ledger;
use crate::takeoutsort_core::workers::{Task, TaskContext, TaskOutcome, process_task};

const MIN_WORKERS: usize = 4;
const MAX_WORKERS: usize = 8;

/// Default pool size: one less than the CPU count, kept within 4..=8.
pub fn worker_count() -> usize {
    num_cpus::get().saturating_sub(1).clamp(MIN_WORKERS, MAX_WORKERS)
}

/// Shared interruption flag. Workers finish their current task and stop taking new ones.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Aggregate counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Succeeded, but no date could be determined.
    pub unresolved: usize,
    pub interrupted: bool,
    pub failures: Vec<TaskFailure>,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Every task ran, none failed, and the run was not interrupted.
    pub fn is_complete(&self) -> bool {
        !self.interrupted && self.failed == 0 && self.processed() == self.total
    }
}

struct Tally<'a> {
    summary: RunSummary,
    ledger: Option<&'a mut Ledger>,
}

impl Tally<'_> {
    fn record(&mut self, task: &Task, outcome: TaskOutcome, bar: &ProgressBar) {
        let media = task.media();
        let name = media.filename();

        match outcome {
            TaskOutcome::Succeeded { message, dated } => {
                self.summary.succeeded += 1;
                if !dated {
                    self.summary.unresolved += 1;
                }
                if let Some(ledger) = self.ledger.as_deref_mut() {
                    ledger.mark_processed(&media.path);
                }
                log::info!("✓ {}: {}", name, message);
            }
            TaskOutcome::Failed { message } => {
                self.summary.failed += 1;
                log::error!("✗ {}: {}", name, message);
                self.summary.failures.push(TaskFailure {
                    path: media.path.clone(),
                    message,
                });
            }
        }

        bar.set_message(name);
        bar.inc(1);
    }
}

/// Execute `tasks` on a dedicated pool of `workers` threads.
///
/// Each worker builds its own `MetadataTool` from `factory`. Successful tasks
/// are marked in `ledger` when one is given. Tasks left unclaimed because no
/// worker could build a tool are reported as failed.
pub fn run_tasks<T, F>(
    tasks: Vec<Task>,
    ctx: &TaskContext,
    factory: F,
    workers: usize,
    ledger: Option<&mut Ledger>,
    bar: &ProgressBar,
    cancel: &CancelToken,
) -> Result<RunSummary>
where
    T: MetadataTool,
    F: Fn() -> Result<T> + Sync,
{
    let total = tasks.len();
    let workers = workers.max(1);
    bar.set_length(total as u64);
    log::info!("Processing {} files with {} workers", total, workers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("takeoutsort-worker-{}", i))
        .build()?;

    let (job_tx, job_rx) = unbounded::<Task>();
    for task in tasks {
        if job_tx.send(task).is_err() {
            log::error!("Failed to queue task for workers");
            break;
        }
    }
    drop(job_tx);

    let tally = Mutex::new(Tally {
        summary: RunSummary {
            total,
            ..Default::default()
        },
        ledger,
    });

    pool.scope(|s| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let tally = &tally;
            let factory = &factory;

            s.spawn(move |_| {
                let mut tool = match factory() {
                    Ok(tool) => tool,
                    Err(e) => {
                        log::error!("A worker failed to initialize its metadata tool: {}", e);
                        return;
                    }
                };

                while !cancel.is_cancelled() {
                    let Ok(task) = job_rx.recv() else {
                        break;
                    };
                    let outcome = process_task(&mut tool, &task, ctx);

                    let mut tally = tally.lock().unwrap_or_else(|e| e.into_inner());
                    tally.record(&task, outcome, bar);
                }
            });
        }
    });

    let mut tally = tally.into_inner().unwrap_or_else(|e| e.into_inner());
    let leftovers: Vec<Task> = job_rx.try_iter().collect();

    if cancel.is_cancelled() && !leftovers.is_empty() {
        log::warn!("Interrupted with {} files not started", leftovers.len());
        tally.summary.interrupted = true;
    } else {
        for task in leftovers {
            let outcome = TaskOutcome::Failed {
                message: "No metadata tool available".to_string(),
            };
            tally.record(&task, outcome, bar);
        }
    }

    bar.finish_with_message("Processing complete");
    Ok(tally.summary)
}
