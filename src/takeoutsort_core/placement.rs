use crate::takeoutsort_core::dates::ResolvedDate;
use crate::takeoutsort_core::error::{Result, TakeoutError};
use base64::{Engine, engine::general_purpose};
use filetime::FileTime;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use time::PrimitiveDateTime;

/// Folder created inside the input root for organized output.
pub const OUTPUT_DIR_NAME: &str = "Output";

/// Bucket for files without any resolvable date.
pub const UNKNOWN_DIR_NAME: &str = "Unknown";

const MAX_COLLISION_SUFFIX: u32 = 100_000;

/// How the data reaches its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceMode {
    /// Copy; the destination will be modified afterwards (e.g. embedding).
    Copy,
    /// Copy unchanged. An identical file left by an earlier run is reused.
    CopyVerbatim,
    /// Rename (or copy and delete across filesystems).
    Move,
}

/// Outcome of committing a file to its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub path: PathBuf,
    /// An identical file was already there; nothing was written.
    pub reused: bool,
}

/// Destination names taken during one run.
///
/// A name created in this run is never handed to another task, even when the
/// content matches. Files left by earlier runs can be reused by one task only.
#[derive(Debug, Default)]
pub struct ClaimSet {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `path` for the caller. False if another task already has it.
    pub fn claim(&self, path: &Path) -> bool {
        self.lock().insert(path.to_path_buf())
    }

    pub fn release(&self, path: &Path) {
        self.lock().remove(path);
    }

    pub fn is_claimed(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.claimed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Candidate `counter` for `filename` in `dest_dir`: the name itself, then `_1`, `_2`, ...
pub fn candidate_path(dest_dir: &Path, filename: &str, counter: u32) -> PathBuf {
    if counter == 0 {
        dest_dir.join(filename)
    } else {
        dest_dir.join(suffixed_name(filename, counter))
    }
}

/// Existing files at `filename`, `filename_1`, ... up to the first free name.
pub fn existing_candidates(dest_dir: &Path, filename: &str) -> impl Iterator<Item = PathBuf> {
    (0..MAX_COLLISION_SUFFIX)
        .map(move |counter| candidate_path(dest_dir, filename, counter))
        .take_while(|candidate| candidate.exists())
}

/// Commit `source` into `dest_dir` under `filename`, appending `_<n>` on collision.
///
/// Each candidate name is claimed in `claims` and then created exclusively, so
/// concurrent callers never receive the same destination.
pub fn place_file(
    source: &Path,
    dest_dir: &Path,
    filename: &str,
    mode: PlaceMode,
    claims: &ClaimSet,
) -> Result<Placement> {
    let fail = |destination: PathBuf, error: io::Error| TakeoutError::PlacementFailed {
        source_path: source.to_path_buf(),
        destination,
        error,
    };

    fs::create_dir_all(dest_dir).map_err(|e| fail(dest_dir.to_path_buf(), e))?;
    let source_len = fs::metadata(source)
        .map_err(|e| fail(dest_dir.join(filename), e))?
        .len();

    for counter in 0..MAX_COLLISION_SUFFIX {
        let candidate = candidate_path(dest_dir, filename, counter);
        if !claims.claim(&candidate) {
            continue;
        }

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(claimed) => {
                drop(claimed);
                if counter > 0 {
                    log::info!("Name collision detected, using: {}", candidate.display());
                }
                if let Err(e) = transfer(source, &candidate, mode) {
                    let _ = fs::remove_file(&candidate);
                    return Err(fail(candidate, e));
                }
                return Ok(Placement {
                    path: candidate,
                    reused: false,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // Left by an earlier run: free for one reuser.
                claims.release(&candidate);
                if mode == PlaceMode::CopyVerbatim
                    && same_content(source, source_len, &candidate).unwrap_or(false)
                    && claims.claim(&candidate)
                {
                    log::debug!(
                        "{} already placed at {}",
                        source.display(),
                        candidate.display()
                    );
                    return Ok(Placement {
                        path: candidate,
                        reused: true,
                    });
                }
            }
            Err(e) => {
                claims.release(&candidate);
                return Err(fail(candidate, e));
            }
        }
    }

    Err(fail(
        dest_dir.join(filename),
        io::Error::other("no free destination name"),
    ))
}

fn transfer(source: &Path, destination: &Path, mode: PlaceMode) -> io::Result<()> {
    match mode {
        PlaceMode::Copy | PlaceMode::CopyVerbatim => copy_preserving_mtime(source, destination),
        PlaceMode::Move => {
            if fs::rename(source, destination).is_ok() {
                return Ok(());
            }
            // Different filesystem: copy, then remove the original.
            copy_preserving_mtime(source, destination)?;
            fs::remove_file(source)
        }
    }
}

fn copy_preserving_mtime(source: &Path, destination: &Path) -> io::Result<()> {
    fs::copy(source, destination)?;
    let metadata = fs::metadata(source)?;
    filetime::set_file_mtime(destination, FileTime::from_last_modification_time(&metadata))
}

/// Set the modification time of a placed file to its resolved date.
pub fn set_file_date(path: &Path, date: &ResolvedDate) -> io::Result<()> {
    filetime::set_file_mtime(path, FileTime::from_unix_time(date.unix_timestamp(), 0))
}

fn same_content(source: &Path, source_len: u64, candidate: &Path) -> io::Result<bool> {
    if fs::metadata(candidate)?.len() != source_len {
        return Ok(false);
    }
    Ok(hash_file(source)? == hash_file(candidate)?)
}

/// Calculate SHA256 hash of a file, returned as base64.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(general_purpose::STANDARD.encode(hasher.finalize()))
}
