use base64::{Engine, engine::general_purpose};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Ledger filename inside the input root.
pub const LEDGER_FILE_NAME: &str = ".processing_state.json";

/// Number of new entries between incremental flushes.
pub const FLUSH_INTERVAL: usize = 10;

/// Persistent set of source files that finished embedding and placement.
///
/// Entries are opaque hashes of resolved absolute paths. Deleting the backing
/// file forces a full reprocess.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    processed: HashSet<String>,
    newly_processed: usize,
}

impl Ledger {
    /// Load the ledger at `path`. A missing or corrupt file yields an empty ledger.
    pub fn load(path: &Path) -> Self {
        let processed = match read_entries(path) {
            Ok(Some(entries)) => {
                log::info!(
                    "Loaded processing state: {} files previously processed",
                    entries.len()
                );
                entries
            }
            Ok(None) => HashSet::new(),
            Err(e) => {
                log::warn!(
                    "Could not load state file {}: {}, starting fresh",
                    path.display(),
                    e
                );
                HashSet::new()
            }
        };

        Ledger {
            path: path.to_path_buf(),
            processed,
            newly_processed: 0,
        }
    }

    pub fn for_input_root(input_root: &Path) -> Self {
        Self::load(&input_root.join(LEDGER_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    /// Entries added during this session.
    pub fn newly_processed(&self) -> usize {
        self.newly_processed
    }

    pub fn is_processed(&self, file: &Path) -> bool {
        self.processed.contains(&ledger_key(file))
    }

    /// Record a completed file. Every `FLUSH_INTERVAL`th new entry is flushed to disk.
    pub fn mark_processed(&mut self, file: &Path) {
        if self.processed.insert(ledger_key(file)) {
            self.newly_processed += 1;
            if self.newly_processed % FLUSH_INTERVAL == 0 {
                self.flush();
            }
        }
    }

    /// Write the full set to disk. Failures are logged, never raised.
    pub fn flush(&self) {
        match self.write_entries() {
            Ok(()) => log::debug!(
                "Saved processing state: {} files",
                self.processed.len()
            ),
            Err(e) => log::error!(
                "Failed to save state file {}: {}",
                self.path.display(),
                e
            ),
        }
    }

    /// Forget everything and delete the backing file.
    pub fn reset(&mut self) {
        self.processed.clear();
        self.newly_processed = 0;

        match fs::remove_file(&self.path) {
            Ok(()) => log::info!("Cleared processing state"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not delete state file {}: {}", self.path.display(), e),
        }
    }

    fn write_entries(&self) -> std::io::Result<()> {
        let mut entries: Vec<&String> = self.processed.iter().collect();
        entries.sort();

        // Write to a temp file first, then rename for atomicity.
        let temp_path = self.path.with_extension("json.tmp");
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        serde_json::to_writer_pretty(&mut writer, &entries)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&temp_path, &self.path)
    }
}

fn read_entries(path: &Path) -> std::io::Result<Option<HashSet<String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let reader = BufReader::new(File::open(path)?);
    let entries: Vec<String> = serde_json::from_reader(reader)?;
    Ok(Some(entries.into_iter().collect()))
}

/// Stable identity of a file: base64 SHA-256 of its resolved absolute path.
pub fn ledger_key(file: &Path) -> String {
    let resolved = file
        .canonicalize()
        .or_else(|_| std::path::absolute(file))
        .unwrap_or_else(|_| file.to_path_buf());

    let mut hasher = Sha256::new();
    hasher.update(resolved.to_string_lossy().as_bytes());
    general_purpose::STANDARD.encode(hasher.finalize())
}
