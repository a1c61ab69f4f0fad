use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::ProgressBar;

use crate::takeoutsort_core::error::{Result, TakeoutError};
use crate::takeoutsort_core::exif::MetadataTool;
use crate::takeoutsort_core::orchestrator::{CancelToken, RunSummary, run_tasks, worker_count};
use crate::takeoutsort_core::resolve::{DEFAULT_MIN_AGE_DAYS, ResolveOptions, days};
use crate::takeoutsort_core::scan::collect_media;
use crate::takeoutsort_core::workers::{Task, TaskContext};

/// Options for moving files out of an `Unknown` folder.
#[derive(Debug, Clone)]
pub struct ReorganizeOptions {
    pub use_file_time: bool,
    pub min_age: Duration,
    pub workers: usize,
}

impl Default for ReorganizeOptions {
    fn default() -> Self {
        ReorganizeOptions {
            use_file_time: true,
            min_age: days(DEFAULT_MIN_AGE_DAYS),
            workers: worker_count(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReorganizeReport {
    pub summary: RunSummary,
    /// Dated files were moved under `<output_root>/<year>/<Month>`.
    pub output_root: PathBuf,
}

/// Re-resolve every file under `unknown_dir` and move the dated ones into the
/// year/month tree next to it. Files that still have no date stay where they are.
pub fn run<T, F>(
    unknown_dir: &Path,
    options: &ReorganizeOptions,
    factory: F,
    bar: &ProgressBar,
    cancel: &CancelToken,
) -> Result<ReorganizeReport>
where
    T: MetadataTool,
    F: Fn() -> Result<T> + Sync,
{
    if !unknown_dir.is_dir() {
        return Err(TakeoutError::NotADirectory(unknown_dir.to_path_buf()));
    }

    let unknown_dir = unknown_dir.canonicalize()?;
    let output_root = unknown_dir
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| TakeoutError::Argument(format!("{} has no parent folder", unknown_dir.display())))?;

    let media = collect_media(&unknown_dir)?;
    log::info!(
        "Reorganizing {} files from {} into {}",
        media.len(),
        unknown_dir.display(),
        output_root.display()
    );

    let ctx = TaskContext::new(
        output_root.clone(),
        ResolveOptions {
            use_file_time: options.use_file_time,
            min_age: options.min_age,
        },
    );

    let tasks: Vec<Task> = media.into_iter().map(|media| Task::Relocate { media }).collect();
    let summary = if tasks.is_empty() {
        RunSummary::default()
    } else {
        run_tasks(tasks, &ctx, factory, options.workers, None, bar, cancel)?
    };

    Ok(ReorganizeReport {
        summary,
        output_root,
    })
}
