use clap::{Parser, Subcommand};
use simplelog::LevelFilter;
use std::path::PathBuf;

use crate::takeoutsort_core::resolve::DEFAULT_MIN_AGE_DAYS;

#[derive(Parser, Debug)]
#[command(author, version, about = "Embed cloud-export JSON metadata into photos and videos and sort them by date")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable file logging to takeoutsort.log
    #[arg(long = "log", global = true)]
    pub log: bool,

    /// Log level for file logging (debug, info, warn, error)
    #[arg(long, default_value_t = LevelFilter::Debug, global = true)]
    pub log_level: LevelFilter,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed metadata and sort an export folder into Output/<year>/<Month>
    Run {
        /// Export folder (prompted for when omitted)
        input_dir: Option<PathBuf>,

        /// Guess dates for files without metadata from similarly numbered files
        #[arg(long, conflicts_with = "no_guess")]
        guess_dates: bool,

        /// Never guess dates, and don't ask
        #[arg(long)]
        no_guess: bool,

        /// Fall back to file modification times when a file has no embedded date
        #[arg(long)]
        use_file_time: bool,

        /// Ignore modification times younger than this many days
        #[arg(long, default_value_t = DEFAULT_MIN_AGE_DAYS)]
        min_age_days: u64,

        /// Number of parallel workers (defaults to CPU count - 1, between 4 and 8)
        #[arg(long)]
        workers: Option<usize>,

        /// Forget previously processed files and start over
        #[arg(long)]
        reset: bool,

        /// Don't ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Move files out of an Output/Unknown folder once a date can be found
    Reorganize {
        /// The Unknown folder to reorganize
        #[arg(required = true)]
        unknown_dir: PathBuf,

        /// Don't fall back to file modification times
        #[arg(long)]
        no_file_time: bool,

        /// Ignore modification times younger than this many days
        #[arg(long, default_value_t = DEFAULT_MIN_AGE_DAYS)]
        min_age_days: u64,

        /// Number of parallel workers
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Show how media files pair with their JSON records, without changing anything
    Scan {
        /// Export folder to scan
        #[arg(required = true)]
        input_dir: PathBuf,
    },

    /// Check that the files in an Output folder are readable and carry dates
    Verify {
        /// The Output folder to check
        #[arg(required = true)]
        output_dir: PathBuf,
    },

    /// Delete the saved processing state of an export folder
    Reset {
        /// Export folder whose state should be cleared
        #[arg(required = true)]
        input_dir: PathBuf,
    },
}
