use std::fs;
use std::path::{Path, PathBuf};

use crate::takeoutsort_core::dates::ResolvedDate;
use crate::takeoutsort_core::error::{Result, TakeoutError};
use crate::takeoutsort_core::exif::{EmbedRequest, MetadataTool};
use crate::takeoutsort_core::media::MediaFile;
use crate::takeoutsort_core::placement::{ClaimSet, PlaceMode, destination_dir, place_file, set_file_date};
use crate::takeoutsort_core::reconcile::{find_embedded_copy, has_matching_metadata};
use crate::takeoutsort_core::record::MetadataRecord;
use crate::takeoutsort_core::resolve::{ResolveOptions, resolve_from_file};

/// One unit of work. Tasks are independent of each other.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Media with a sidecar record: embed the record and place by its date.
    Paired { media: MediaFile, record: PathBuf },
    /// Media without a record: place by the best file-based date.
    Unpaired {
        media: MediaFile,
        guess: Option<ResolvedDate>,
    },
    /// A file already under `Unknown`: move it into the dated tree if possible.
    Relocate { media: MediaFile },
}

impl Task {
    pub fn media(&self) -> &MediaFile {
        match self {
            Task::Paired { media, .. } | Task::Unpaired { media, .. } | Task::Relocate { media } => media,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// `dated` is false when the file ended up without any date.
    Succeeded { message: String, dated: bool },
    Failed { message: String },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            TaskOutcome::Succeeded { message, .. } | TaskOutcome::Failed { message } => message,
        }
    }
}

/// Settings shared by every task in a run, plus the run's destination claims.
#[derive(Debug)]
pub struct TaskContext {
    pub output_root: PathBuf,
    pub resolve: ResolveOptions,
    pub claims: ClaimSet,
}

impl TaskContext {
    pub fn new(output_root: PathBuf, resolve: ResolveOptions) -> Self {
        TaskContext {
            output_root,
            resolve,
            claims: ClaimSet::new(),
        }
    }
}

/// Run one task to completion. Every error is converted into `TaskOutcome::Failed`.
pub fn process_task(tool: &mut dyn MetadataTool, task: &Task, ctx: &TaskContext) -> TaskOutcome {
    let result = match task {
        Task::Paired { media, record } => process_paired(tool, media, record, ctx),
        Task::Unpaired { media, guess } => process_unpaired(tool, media, *guess, ctx),
        Task::Relocate { media } => process_relocate(tool, media, ctx),
    };

    result.unwrap_or_else(|e| TaskOutcome::Failed {
        message: e.to_string(),
    })
}

fn process_paired(
    tool: &mut dyn MetadataTool,
    media: &MediaFile,
    record_path: &Path,
    ctx: &TaskContext,
) -> Result<TaskOutcome> {
    let record = match MetadataRecord::load(record_path) {
        Ok(record) => record,
        Err(e) => {
            log::warn!("{}; processing {} without it", e, media.filename());
            return process_unpaired(tool, media, None, ctx);
        }
    };

    let record_date = record.resolved_date();
    let date = record_date.or_else(|| resolve_from_file(tool, &media.path, &ctx.resolve, None));
    let dest_dir = destination_dir(&ctx.output_root, date.as_ref().map(|d| &d.at));

    if let Some(record_date) = record_date {
        let existing = if has_matching_metadata(tool, &media.path, record_date.at) {
            let placed = place_file(
                &media.path,
                &dest_dir,
                &media.filename(),
                PlaceMode::CopyVerbatim,
                &ctx.claims,
            )?;
            Some(placed.path)
        } else {
            // Stamped by an earlier run whose ledger was already cleared.
            find_embedded_copy(
                tool,
                &dest_dir,
                &media.filename(),
                media.kind,
                record_date.at,
                &ctx.claims,
            )
        };

        if let Some(path) = existing {
            apply_date(&path, &record_date);
            return Ok(TaskOutcome::Succeeded {
                message: format!("Already has metadata (Date: {})", record_date.display_day()),
                dated: true,
            });
        }
    }

    let placed = place_file(&media.path, &dest_dir, &media.filename(), PlaceMode::Copy, &ctx.claims)?;
    let request = EmbedRequest::from_record(&record, date.map(|d| d.at));

    if let Err(e) = tool.embed(&placed.path, media.kind, &request) {
        discard(&placed.path);
        return Err(TakeoutError::Exiftool(e));
    }

    if let Some(date) = &date {
        if let Err(e) = set_file_date(&placed.path, date) {
            discard(&placed.path);
            return Err(TakeoutError::PlacementFailed {
                source_path: media.path.clone(),
                destination: placed.path,
                error: e,
            });
        }
    }

    Ok(TaskOutcome::Succeeded {
        message: request.summary(),
        dated: date.is_some(),
    })
}

fn process_unpaired(
    tool: &mut dyn MetadataTool,
    media: &MediaFile,
    guess: Option<ResolvedDate>,
    ctx: &TaskContext,
) -> Result<TaskOutcome> {
    let date = resolve_from_file(tool, &media.path, &ctx.resolve, guess);
    let dest_dir = destination_dir(&ctx.output_root, date.as_ref().map(|d| &d.at));
    let placed = place_file(&media.path, &dest_dir, &media.filename(), PlaceMode::CopyVerbatim, &ctx.claims)?;

    match date {
        Some(date) => {
            apply_date(&placed.path, &date);
            Ok(TaskOutcome::Succeeded {
                message: format!("Date: {} ({})", date.display_day(), date.provenance),
                dated: true,
            })
        }
        None => Ok(TaskOutcome::Succeeded {
            message: "No date (moved to Unknown)".to_string(),
            dated: false,
        }),
    }
}

fn process_relocate(
    tool: &mut dyn MetadataTool,
    media: &MediaFile,
    ctx: &TaskContext,
) -> Result<TaskOutcome> {
    let Some(date) = resolve_from_file(tool, &media.path, &ctx.resolve, None) else {
        return Ok(TaskOutcome::Succeeded {
            message: "No date found, left in place".to_string(),
            dated: false,
        });
    };

    let dest_dir = destination_dir(&ctx.output_root, Some(&date.at));
    let placed = place_file(&media.path, &dest_dir, &media.filename(), PlaceMode::Move, &ctx.claims)?;
    apply_date(&placed.path, &date);

    Ok(TaskOutcome::Succeeded {
        message: format!(
            "Moved to {}/{} (Date: {}, {})",
            date.at.year(),
            date.at.month(),
            date.display_day(),
            date.provenance
        ),
        dated: true,
    })
}

/// Best-effort mtime update for files whose content is already final.
fn apply_date(path: &Path, date: &ResolvedDate) {
    if let Err(e) = set_file_date(path, date) {
        log::warn!("Could not update file timestamp for {}: {}", path.display(), e);
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::warn!("Could not remove partial output {}: {}", path.display(), e);
    }
}
