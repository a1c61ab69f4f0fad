use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use simplelog::{CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, WriteLogger};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use takeoutsort::takeoutsort_core::orchestrator::RunSummary;
use takeoutsort::takeoutsort_core::resolve::days;
use takeoutsort::takeoutsort_core::{
    CancelToken, Cli, Commands, ExifToolBackend, Ledger, MetadataTool, ReorganizeOptions,
    ResolveOptions, RunOptions, ScanReport, TakeoutError, VerifyReport, exiftool_available,
    local_offset, process, reorganize, scan_folder, verify_output, worker_count,
};

const PREVIEW_LIMIT: usize = 10;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The local offset can only be read safely before other threads exist.
    local_offset();

    // Initialize loggers
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Warn,
        Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )];

    if cli.log {
        loggers.push(WriteLogger::new(
            cli.log_level,
            Config::default(),
            File::create("takeoutsort.log")?,
        ));
    }

    CombinedLogger::init(loggers)?;

    match cli.command {
        Commands::Run {
            input_dir,
            guess_dates,
            no_guess,
            use_file_time,
            min_age_days,
            workers,
            reset,
            yes,
        } => {
            require_exiftool()?;

            let input_dir = match input_dir {
                Some(dir) => dir,
                None => prompt_input_folder()?,
            };
            let input_dir = existing_dir(&input_dir)?;

            println!("Scanning {} for photos and videos...", input_dir.display());
            let scan = scan_folder(&input_dir)?;
            if scan.is_empty() {
                println!("No media files found.");
                println!("Make sure you're pointing to a cloud photo export folder.");
                return Ok(());
            }
            print_scan_summary(&scan);

            let guess_dates = if guess_dates {
                true
            } else if no_guess || yes || scan.unpaired.is_empty() {
                false
            } else {
                println!("\n{} file(s) have no JSON metadata.", scan.unpaired.len());
                println!("Example: IMG_3689 with metadata can help date IMG_3690");
                confirm("Guess dates based on similar filenames? [y/N]: ", false)?
            };

            if !yes && !confirm("\nReady to process files. Continue? [y/N]: ", false)? {
                println!("Cancelled by user");
                return Ok(());
            }

            let options = RunOptions {
                guess_dates,
                resolve: ResolveOptions {
                    use_file_time,
                    min_age: days(min_age_days),
                },
                workers: workers.unwrap_or_else(worker_count),
                reset_ledger: reset,
            };

            let cancel = install_cancel_handler()?;
            let bar = progress_bar()?;
            let report = process::process_scan(
                &input_dir,
                &scan,
                &options,
                ExifToolBackend::new,
                &bar,
                &cancel,
            )?;

            if report.already_processed > 0 {
                println!(
                    "\nSkipped {} previously completed file(s)",
                    report.already_processed
                );
            }
            if report.index_size > 0 {
                println!("Date index: {} file(s) available for guessing", report.index_size);
            }

            if report.summary.total == 0 {
                println!("\nAll files already processed!");
                println!("To reprocess, run `takeoutsort reset {}`", input_dir.display());
            } else {
                print_run_summary(&report.summary);
                if report.ledger_cleared {
                    println!("\nProcessing complete, processing state cleared.");
                } else {
                    println!("\nProgress saved. Run again to resume where you left off.");
                }
            }
            println!("\nOutput location: {}", report.output_root.display());

            if report.summary.interrupted {
                return Err(TakeoutError::Cancelled.into());
            }
        }

        Commands::Reorganize {
            unknown_dir,
            no_file_time,
            min_age_days,
            workers,
        } => {
            require_exiftool()?;
            let unknown_dir = existing_dir(&unknown_dir)?;

            let options = ReorganizeOptions {
                use_file_time: !no_file_time,
                min_age: days(min_age_days),
                workers: workers.unwrap_or_else(worker_count),
            };
            if options.use_file_time {
                println!(
                    "Using file modification times older than {} day(s) as a fallback",
                    min_age_days
                );
            }

            let cancel = install_cancel_handler()?;
            let bar = progress_bar()?;
            let report = reorganize::run(&unknown_dir, &options, ExifToolBackend::new, &bar, &cancel)?;

            if report.summary.total == 0 {
                println!("No media files found in {}", unknown_dir.display());
                return Ok(());
            }

            print_run_summary(&report.summary);
            let moved = report.summary.succeeded - report.summary.unresolved;
            println!(
                "\n{} file(s) moved into {}",
                moved,
                report.output_root.display()
            );

            if report.summary.interrupted {
                return Err(TakeoutError::Cancelled.into());
            }
        }

        Commands::Scan { input_dir } => {
            let input_dir = existing_dir(&input_dir)?;
            let scan = scan_folder(&input_dir)?;
            if scan.is_empty() {
                println!("No media files found.");
            } else {
                print_scan_summary(&scan);
            }

            let ledger = Ledger::for_input_root(&input_dir);
            if !ledger.is_empty() {
                println!("\n{} file(s) already processed in a previous run", ledger.len());
            }
        }

        Commands::Verify { output_dir } => {
            let output_dir = existing_dir(&output_dir)?;
            println!("Verifying {}", output_dir.display());

            let mut backend = if exiftool_available() {
                Some(ExifToolBackend::new()?)
            } else {
                println!("exiftool not found, skipping the metadata check");
                None
            };

            let bar = progress_bar()?;
            let report = verify_output(
                &output_dir,
                backend.as_mut().map(|b| b as &mut dyn MetadataTool),
                &bar,
            )?;
            print_verify_summary(&report);

            if !report.is_healthy() {
                return Err(TakeoutError::CorruptOutput(report.unreadable.len()).into());
            }
        }

        Commands::Reset { input_dir } => {
            let input_dir = existing_dir(&input_dir)?;
            let mut ledger = Ledger::for_input_root(&input_dir);
            let count = ledger.len();
            ledger.reset();
            println!("Cleared processing state ({} file(s))", count);
        }
    }

    Ok(())
}

fn require_exiftool() -> Result<()> {
    if !exiftool_available() {
        eprintln!("Please install exiftool (https://exiftool.org) and make sure it is in PATH.");
        return Err(TakeoutError::ExiftoolMissing.into());
    }
    Ok(())
}

fn existing_dir(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(TakeoutError::PathNotFound(path.to_path_buf()).into());
    }
    if !path.is_dir() {
        return Err(TakeoutError::NotADirectory(path.to_path_buf()).into());
    }
    path.canonicalize()
        .with_context(|| format!("Could not resolve {}", path.display()))
}

fn prompt_input_folder() -> Result<PathBuf> {
    loop {
        print!("Enter the path to your export folder: ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            bail!("No input folder given");
        }

        let cleaned = input.trim().trim_matches(|c| c == '"' || c == '\'');
        let path = expand_home(cleaned);
        if path.is_dir() {
            return Ok(path);
        }
        println!("Not a directory: {}", path.display());
    }
}

fn expand_home(input: &str) -> PathBuf {
    match (input.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(input),
    }
}

fn confirm(question: &str, default: bool) -> Result<bool> {
    print!("{}", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(match input.trim().to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    })
}

fn install_cancel_handler() -> Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted, finishing files in progress...");
        handler_token.cancel();
    })?;
    Ok(cancel)
}

fn progress_bar() -> Result<ProgressBar> {
    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?;
    Ok(ProgressBar::new(0).with_style(bar_style))
}

fn print_scan_summary(scan: &ScanReport) {
    println!("\nFound {} media file(s)", scan.total());
    println!("  {} images, {} videos", scan.images, scan.videos);
    println!("  {} with JSON metadata", scan.paired.len());
    println!("  {} without JSON metadata", scan.unpaired.len());

    println!("\nPreview:");
    for pairing in scan.paired.iter().take(PREVIEW_LIMIT) {
        let record = pairing
            .record
            .file_name()
            .unwrap_or_default()
            .to_string_lossy();
        println!("  {}  <-  {}", pairing.media.filename(), record);
    }
    let remaining = PREVIEW_LIMIT.saturating_sub(scan.paired.len());
    for media in scan.unpaired.iter().take(remaining) {
        println!("  {}  (no metadata)", media.filename());
    }
    if scan.total() > PREVIEW_LIMIT {
        println!("  ... and {} more", scan.total() - PREVIEW_LIMIT);
    }
}

fn print_run_summary(summary: &RunSummary) {
    println!("\nProcessing Summary");
    println!("─────────────────────────────────");
    println!("Total:       {:>8}", summary.total);
    println!("Successful:  {:>8}", summary.succeeded);
    println!("Failed:      {:>8}", summary.failed);
    println!("No date:     {:>8}", summary.unresolved);
    if summary.interrupted {
        println!("Not started: {:>8}", summary.total - summary.processed());
    }
    println!("─────────────────────────────────");

    for failure in summary.failures.iter().take(PREVIEW_LIMIT) {
        println!("  ✗ {}: {}", failure.path.display(), failure.message);
    }
    if summary.failures.len() > PREVIEW_LIMIT {
        println!("  ... and {} more failures", summary.failures.len() - PREVIEW_LIMIT);
    }

    if summary.failed == 0 && !summary.interrupted {
        println!("\nAll files processed successfully!");
    } else if summary.succeeded == 0 {
        println!("\nNo files were processed successfully");
    }
}

fn print_verify_summary(report: &VerifyReport) {
    println!("\nChecked {} media file(s)", report.total);
    println!("\nVerification Results");
    println!("─────────────────────────────────");
    println!("Total:       {:>8}", report.total);
    println!("Readable:    {:>8}", report.readable);
    println!("Unreadable:  {:>8}", report.unreadable.len());
    match &report.metadata {
        Some(check) => {
            println!("With date:   {:>8}", check.with_date);
            println!("No date:     {:>8}", check.without_date.len());
        }
        None => println!("Metadata check skipped (exiftool not found)"),
    }
    println!("─────────────────────────────────");

    print_problem_files("Corrupted/unreadable files:", &report.unreadable);
    if let Some(check) = &report.metadata {
        print_problem_files("Images without DateTimeOriginal:", &check.without_date);
    }

    if report.is_clean() {
        println!("\nAll files verified successfully!");
    } else if report.is_healthy() {
        println!("\nAll files readable, but some are missing metadata");
    }
}

fn print_problem_files(title: &str, files: &[PathBuf]) {
    if files.is_empty() {
        return;
    }
    println!("\n{}", title);
    for path in files.iter().take(PREVIEW_LIMIT) {
        println!("  • {}", path.display());
    }
    if files.len() > PREVIEW_LIMIT {
        println!("  ... and {} more", files.len() - PREVIEW_LIMIT);
    }
}
