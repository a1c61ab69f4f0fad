use crate::takeoutsort_core::dates::{Provenance, ResolvedDate, from_unix_timestamp};
use crate::takeoutsort_core::exif::{DateTag, MetadataTool};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use time::PrimitiveDateTime;

/// Default minimum age for a filesystem timestamp to be trusted.
pub const DEFAULT_MIN_AGE_DAYS: u64 = 30;

const MIN_FILE_TIME_YEAR: i32 = 2000;

/// Options for file-based date resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Fall back to the file modification time when no embedded date exists.
    pub use_file_time: bool,
    /// Modification times younger than this are assumed to come from copying.
    pub min_age: Duration,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            use_file_time: false,
            min_age: days(DEFAULT_MIN_AGE_DAYS),
        }
    }
}

pub fn days(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(86_400))
}

/// Best date from the file itself: embedded dates, then (optionally) the
/// filesystem time, then the caller's similarity guess.
pub fn resolve_from_file(
    tool: &mut dyn MetadataTool,
    path: &Path,
    options: &ResolveOptions,
    guess: Option<ResolvedDate>,
) -> Option<ResolvedDate> {
    if let Some(date) = embedded_date(tool, path) {
        return Some(date);
    }

    if options.use_file_time {
        if let Some(date) = filesystem_date(path, options.min_age) {
            return Some(date);
        }
    }

    guess
}

/// First parseable embedded date among DateTimeOriginal, CreateDate and ModifyDate.
pub fn embedded_date(tool: &mut dyn MetadataTool, path: &Path) -> Option<ResolvedDate> {
    let provenances = [
        Provenance::EmbeddedPrimary,
        Provenance::EmbeddedFallback,
        Provenance::EmbeddedSecondary,
    ];

    DateTag::FALLBACK_CHAIN
        .iter()
        .zip(provenances)
        .find_map(|(tag, provenance)| {
            tool.read_date(path, *tag)
                .map(|at| ResolvedDate::new(at, provenance))
        })
}

fn filesystem_date(path: &Path, min_age: Duration) -> Option<ResolvedDate> {
    let modified = match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(e) => {
            log::debug!("No modification time for {}: {}", path.display(), e);
            return None;
        }
    };

    let accepted = accept_filesystem_time(modified, SystemTime::now(), min_age);
    if accepted.is_none() {
        log::debug!("Rejected file time for {} (too recent or implausible)", path.display());
    }
    accepted.map(|at| ResolvedDate::new(at, Provenance::FileSystemTime))
}

/// Accept a modification time only if it is from year 2000 or later, not in
/// the future, and at least `min_age` before `now`.
pub fn accept_filesystem_time(
    modified: SystemTime,
    now: SystemTime,
    min_age: Duration,
) -> Option<PrimitiveDateTime> {
    let age = now.duration_since(modified).ok()?;
    if age < min_age {
        return None;
    }

    let seconds = modified.duration_since(UNIX_EPOCH).ok()?.as_secs();
    let at = from_unix_timestamp(i64::try_from(seconds).ok()?)?;
    if at.year() < MIN_FILE_TIME_YEAR {
        return None;
    }
    Some(at)
}
