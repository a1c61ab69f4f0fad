use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::takeoutsort_core::error::Result;
use crate::takeoutsort_core::exif::MetadataTool;
use crate::takeoutsort_core::guess::SimilarityIndex;
use crate::takeoutsort_core::ledger::Ledger;
use crate::takeoutsort_core::orchestrator::{CancelToken, RunSummary, run_tasks, worker_count};
use crate::takeoutsort_core::placement::output_root;
use crate::takeoutsort_core::record::MetadataRecord;
use crate::takeoutsort_core::resolve::ResolveOptions;
use crate::takeoutsort_core::scan::{Pairing, ScanReport, scan_folder};
use crate::takeoutsort_core::workers::{Task, TaskContext};

/// Options for a normal run over an export folder.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Borrow dates from similarly numbered files for unpaired media.
    pub guess_dates: bool,
    pub resolve: ResolveOptions,
    pub workers: usize,
    /// Forget the ledger before starting.
    pub reset_ledger: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            guess_dates: false,
            resolve: ResolveOptions::default(),
            workers: worker_count(),
            reset_ledger: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Files skipped because the ledger already had them.
    pub already_processed: usize,
    /// Reference files available for date guessing.
    pub index_size: usize,
    pub output_root: PathBuf,
    /// The ledger was deleted after a complete run.
    pub ledger_cleared: bool,
}

/// Scan `input_root` and process everything in it.
pub fn run<T, F>(
    input_root: &Path,
    options: &RunOptions,
    factory: F,
    bar: &ProgressBar,
    cancel: &CancelToken,
) -> Result<RunReport>
where
    T: MetadataTool,
    F: Fn() -> Result<T> + Sync,
{
    let scan = scan_folder(input_root)?;
    process_scan(input_root, &scan, options, factory, bar, cancel)
}

/// Process the result of an earlier scan of `input_root`.
pub fn process_scan<T, F>(
    input_root: &Path,
    scan: &ScanReport,
    options: &RunOptions,
    factory: F,
    bar: &ProgressBar,
    cancel: &CancelToken,
) -> Result<RunReport>
where
    T: MetadataTool,
    F: Fn() -> Result<T> + Sync,
{
    let mut ledger = Ledger::for_input_root(input_root);
    if options.reset_ledger {
        ledger.reset();
    }

    let pending_paired: Vec<&Pairing> = scan
        .paired
        .iter()
        .filter(|p| !ledger.is_processed(&p.media.path))
        .collect();
    let pending_unpaired: Vec<_> = scan
        .unpaired
        .iter()
        .filter(|m| !ledger.is_processed(&m.path))
        .collect();

    let already_processed = scan.total() - pending_paired.len() - pending_unpaired.len();
    if already_processed > 0 {
        log::info!("Resume detected: skipping {} previously completed files", already_processed);
    }

    let index = if options.guess_dates && !pending_unpaired.is_empty() {
        Some(build_similarity_index(&scan.paired))
    } else {
        None
    };

    let mut tasks: Vec<Task> = pending_paired
        .into_iter()
        .map(|p| Task::Paired {
            media: p.media.clone(),
            record: p.record.clone(),
        })
        .collect();
    tasks.extend(pending_unpaired.into_iter().map(|media| Task::Unpaired {
        media: media.clone(),
        guess: index.as_ref().and_then(|i| i.guess(&media.filename())),
    }));

    let ctx = TaskContext::new(output_root(input_root), options.resolve);

    let mut report = RunReport {
        summary: RunSummary::default(),
        already_processed,
        index_size: index.as_ref().map_or(0, SimilarityIndex::len),
        output_root: ctx.output_root.clone(),
        ledger_cleared: false,
    };

    if tasks.is_empty() {
        log::info!("Nothing to process in {}", input_root.display());
        return Ok(report);
    }

    report.summary = run_tasks(
        tasks,
        &ctx,
        factory,
        options.workers,
        Some(&mut ledger),
        bar,
        cancel,
    )?;

    ledger.flush();
    log::info!(
        "Saved processing state ({} new, {} total)",
        ledger.newly_processed(),
        ledger.len()
    );

    if report.summary.is_complete() {
        ledger.reset();
        report.ledger_cleared = true;
    }

    Ok(report)
}

/// Index every paired file whose record carries a date.
pub fn build_similarity_index(paired: &[Pairing]) -> SimilarityIndex {
    let dated: Vec<_> = paired
        .par_iter()
        .filter_map(|p| {
            let date = MetadataRecord::load(&p.record).ok()?.resolved_date()?;
            Some((p.media.filename(), date))
        })
        .collect();

    let mut index = SimilarityIndex::new();
    for (filename, date) in dated {
        index.insert(&filename, date);
    }
    log::info!("Built date index: {} files with dates available for guessing", index.len());
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::takeoutsort_core::dates::from_unix_timestamp;
    use crate::takeoutsort_core::exif::DateTag;
    use crate::takeoutsort_core::ledger::LEDGER_FILE_NAME;
    use crate::takeoutsort_core::placement::destination_dir;
    use crate::takeoutsort_core::testutil::FakeTool;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    const TAKEN: i64 = 1_600_000_000;

    fn options() -> RunOptions {
        RunOptions {
            workers: 2,
            ..Default::default()
        }
    }

    fn export(dir: &TempDir) {
        dir.child("Takeout/IMG_100.jpg").write_binary(b"one").unwrap();
        dir.child("Takeout/IMG_100.jpg.json")
            .write_str(r#"{"title": "IMG_100.jpg", "photoTakenTime": {"timestamp": "1600000000"}}"#)
            .unwrap();
        dir.child("Takeout/IMG_150.jpg").write_binary(b"two").unwrap();
        dir.child("Takeout/IMG_150.jpg.json")
            .write_str(r#"{"title": "IMG_150.jpg", "photoTakenTime": {"timestamp": "1600000000"}}"#)
            .unwrap();
        dir.child("Takeout/IMG_105.jpg").write_binary(b"three").unwrap();
    }

    fn dated_dir(dir: &TempDir) -> PathBuf {
        destination_dir(
            &output_root(dir.path()),
            Some(&from_unix_timestamp(TAKEN).unwrap()),
        )
    }

    #[test]
    fn test_full_run_places_and_clears_ledger() {
        let dir = TempDir::new().unwrap();
        export(&dir);
        let tool = FakeTool::new();

        let report = run(
            dir.path(),
            &options(),
            || Ok(tool.clone()),
            &ProgressBar::hidden(),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.succeeded, 3);
        assert_eq!(report.summary.unresolved, 1);
        assert!(report.ledger_cleared);
        assert!(!dir.path().join(LEDGER_FILE_NAME).exists());
        assert_eq!(tool.embed_count(), 2);

        assert!(dated_dir(&dir).join("IMG_100.jpg").exists());
        assert!(dated_dir(&dir).join("IMG_150.jpg").exists());
        assert!(report.output_root.join("Unknown/IMG_105.jpg").exists());
    }

    #[test]
    fn test_guessing_places_unpaired_by_neighbour() {
        let dir = TempDir::new().unwrap();
        export(&dir);
        let run_options = RunOptions {
            guess_dates: true,
            ..options()
        };

        let report = run(
            dir.path(),
            &run_options,
            || Ok(FakeTool::new()),
            &ProgressBar::hidden(),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(report.index_size, 2);
        assert_eq!(report.summary.unresolved, 0);
        assert!(dated_dir(&dir).join("IMG_105.jpg").exists());
    }

    #[test]
    fn test_resume_skips_ledger_entries() {
        let dir = TempDir::new().unwrap();
        export(&dir);

        let first = FakeTool::new().failing_for("IMG_150");
        let report = run(
            dir.path(),
            &options(),
            || Ok(first.clone()),
            &ProgressBar::hidden(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.summary.failed, 1);
        assert!(!report.ledger_cleared);
        assert_eq!(Ledger::for_input_root(dir.path()).len(), 2);
        assert!(!dated_dir(&dir).join("IMG_150.jpg").exists());

        let second = FakeTool::new();
        let report = run(
            dir.path(),
            &options(),
            || Ok(second.clone()),
            &ProgressBar::hidden(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.already_processed, 2);
        assert_eq!(report.summary.total, 1);
        assert_eq!(second.embed_count(), 1);
        assert!(report.ledger_cleared);

        assert!(dated_dir(&dir).join("IMG_150.jpg").exists());
        assert!(!dated_dir(&dir).join("IMG_100_1.jpg").exists());
    }

    #[test]
    fn test_rerun_of_reconciled_files_is_stable() {
        let dir = TempDir::new().unwrap();
        export(&dir);
        let taken = from_unix_timestamp(TAKEN).unwrap();
        let tool = FakeTool::new()
            .with_date("IMG_100.jpg", DateTag::DateTimeOriginal, taken)
            .with_date("IMG_150.jpg", DateTag::DateTimeOriginal, taken);

        for _ in 0..2 {
            let report = run(
                dir.path(),
                &options(),
                || Ok(tool.clone()),
                &ProgressBar::hidden(),
                &CancelToken::new(),
            )
            .unwrap();
            assert!(report.summary.is_complete());
        }

        assert_eq!(tool.embed_count(), 0);
        assert!(!dated_dir(&dir).join("IMG_100_1.jpg").exists());
        assert!(!dated_dir(&dir).join("IMG_150_1.jpg").exists());
        assert!(!output_root(dir.path()).join("Unknown/IMG_105_1.jpg").exists());
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_rerun_of_embedded_video_is_stable() {
        let dir = TempDir::new().unwrap();
        dir.child("Takeout/clip.mp4").write_binary(b"frames").unwrap();
        dir.child("Takeout/clip.mp4.json")
            .write_str(r#"{"title": "clip.mp4", "photoTakenTime": {"timestamp": "1600000000"}}"#)
            .unwrap();
        // The source itself never carries a date.
        let tool = FakeTool::new();

        for _ in 0..2 {
            let report = run(
                dir.path(),
                &options(),
                || Ok(tool.clone()),
                &ProgressBar::hidden(),
                &CancelToken::new(),
            )
            .unwrap();
            assert!(report.summary.is_complete());
            assert!(report.ledger_cleared);
        }

        assert_eq!(tool.embed_count(), 1);
        assert_eq!(files_in(&dated_dir(&dir)), vec!["clip.mp4".to_string()]);
    }

    #[test]
    fn test_same_photo_in_two_albums_is_kept_twice() {
        let dir = TempDir::new().unwrap();
        dir.child("Takeout/Album A/a.jpg").write_binary(b"same").unwrap();
        dir.child("Takeout/Album B/a.jpg").write_binary(b"same").unwrap();
        let unknown = output_root(dir.path()).join("Unknown");

        for _ in 0..2 {
            let report = run(
                dir.path(),
                &options(),
                || Ok(FakeTool::new()),
                &ProgressBar::hidden(),
                &CancelToken::new(),
            )
            .unwrap();
            assert_eq!(report.summary.succeeded, 2);
            assert_eq!(files_in(&unknown), vec!["a.jpg".to_string(), "a_1.jpg".to_string()]);
        }
    }

    #[test]
    fn test_same_paired_photo_in_two_albums_is_kept_twice() {
        let dir = TempDir::new().unwrap();
        for album in ["Album A", "Album B"] {
            dir.child(format!("Takeout/{}/a.jpg", album)).write_binary(b"same").unwrap();
            dir.child(format!("Takeout/{}/a.jpg.json", album))
                .write_str(r#"{"title": "a.jpg", "photoTakenTime": {"timestamp": "1600000000"}}"#)
                .unwrap();
        }
        let tool = FakeTool::new();

        for _ in 0..2 {
            run(
                dir.path(),
                &options(),
                || Ok(tool.clone()),
                &ProgressBar::hidden(),
                &CancelToken::new(),
            )
            .unwrap();
            assert_eq!(
                files_in(&dated_dir(&dir)),
                vec!["a.jpg".to_string(), "a_1.jpg".to_string()]
            );
        }
        assert_eq!(tool.embed_count(), 2);
    }

    #[test]
    fn test_reset_ledger_reprocesses() {
        let dir = TempDir::new().unwrap();
        export(&dir);
        let scan = scan_folder(dir.path()).unwrap();

        let mut ledger = Ledger::for_input_root(dir.path());
        for media in &scan.unpaired {
            ledger.mark_processed(&media.path);
        }
        ledger.flush();

        let run_options = RunOptions {
            reset_ledger: true,
            ..options()
        };
        let report = process_scan(
            dir.path(),
            &scan,
            &run_options,
            || Ok(FakeTool::new()),
            &ProgressBar::hidden(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.already_processed, 0);
        assert_eq!(report.summary.total, 3);
    }

    #[test]
    fn test_empty_folder() {
        let dir = TempDir::new().unwrap();
        let report = run(
            dir.path(),
            &options(),
            || Ok(FakeTool::new()),
            &ProgressBar::hidden(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.summary.total, 0);
        assert!(!report.ledger_cleared);
    }
}
