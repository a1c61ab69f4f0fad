use crate::takeoutsort_core::dates::{Provenance, ResolvedDate};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").unwrap());

/// Largest accepted distance between sequence numbers.
pub const MAX_GUESS_DISTANCE: u64 = 100;

#[derive(Debug, Clone)]
struct IndexEntry {
    filename: String,
    stem: String,
    number: Option<u64>,
    date: ResolvedDate,
}

/// Index of (filename, date) for every file whose date came from its record.
///
/// Cameras and apps hand out increasing IDs (`IMG_3689`, `IMG_3690`, ...), so a
/// file with no metadata can borrow the date of its closest numbered neighbour.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    entries: Vec<IndexEntry>,
}

impl SimilarityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: &str, date: ResolvedDate) {
        self.entries.push(IndexEntry {
            filename: filename.to_string(),
            stem: file_stem(filename).to_string(),
            number: extract_number(filename),
            date,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Guess a date for `filename` from the closest reference with the same prefix.
    pub fn guess(&self, filename: &str) -> Option<ResolvedDate> {
        let Some(target) = extract_number(filename) else {
            log::debug!("No number found in filename: {}", filename);
            return None;
        };
        let prefix = filename_prefix(filename);

        let closest = self
            .entries
            .iter()
            .filter(|e| e.stem.starts_with(prefix))
            .filter_map(|e| e.number.map(|n| (n.abs_diff(target), e)))
            .min_by_key(|(distance, _)| *distance);

        match closest {
            Some((distance, entry)) if distance <= MAX_GUESS_DISTANCE => {
                log::info!(
                    "Guessing date for {} from {} (distance: {})",
                    filename,
                    entry.filename,
                    distance
                );
                Some(entry.date.with_provenance(Provenance::SimilarityGuess))
            }
            Some((distance, _)) => {
                log::debug!("Closest file too far ({}) for: {}", distance, filename);
                None
            }
            None => {
                log::debug!("No similar files found for: {}", filename);
                None
            }
        }
    }
}

fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

/// The sequence number in a filename: the longest run of at least three digits
/// (first one on ties), else the last run of any length.
///
/// `IMG_3689.JPG` -> 3689, `VID20220101_7.mp4` -> 20220101, `pic7.png` -> 7
pub fn extract_number(filename: &str) -> Option<u64> {
    let runs: Vec<&str> = DIGITS_RE.find_iter(filename).map(|m| m.as_str()).collect();

    let mut longest: Option<&str> = None;
    for run in runs.iter().filter(|r| r.len() >= 3) {
        if longest.is_none_or(|l| run.len() > l.len()) {
            longest = Some(run);
        }
    }

    longest.or_else(|| runs.last().copied())?.parse().ok()
}

/// The non-digit prefix of the filename stem: `IMG_3689.JPG` -> `IMG_`.
pub fn filename_prefix(filename: &str) -> &str {
    let stem = file_stem(filename);
    let end = stem.find(|c: char| c.is_ascii_digit()).unwrap_or(stem.len());
    &stem[..end]
}
