use crate::takeoutsort_core::error::{Result, TakeoutError};
use crate::takeoutsort_core::media::{MediaFile, MediaKind, is_resource_fork};
use crate::takeoutsort_core::placement::OUTPUT_DIR_NAME;
use crate::takeoutsort_core::record::MetadataRecord;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Highest `(N)` disambiguation suffix tried by the matcher.
const MAX_NUMBERED_SUFFIX: u32 = 99;

/// A media file and its sidecar record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub media: MediaFile,
    pub record: PathBuf,
}

/// Result of scanning an export folder.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub paired: Vec<Pairing>,
    pub unpaired: Vec<MediaFile>,
    pub images: usize,
    pub videos: usize,
}

impl ScanReport {
    pub fn total(&self) -> usize {
        self.paired.len() + self.unpaired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Find the sidecar record for a media file.
///
/// Tries `<name>.json`, then `<name>(N).json` for N in 1..=99, then any
/// `<name>*.json` whose `title` field equals the media filename.
pub fn find_matching_record(media_path: &Path) -> Option<PathBuf> {
    let parent = media_path.parent()?;
    let media_name = media_path.file_name()?.to_str()?;

    let exact = parent.join(format!("{}.json", media_name));
    if exact.is_file() {
        log::debug!("Found exact JSON match: {}", exact.display());
        return Some(exact);
    }

    for n in 1..=MAX_NUMBERED_SUFFIX {
        let numbered = parent.join(format!("{}({}).json", media_name, n));
        if numbered.is_file() {
            log::debug!("Found numbered JSON match: {}", numbered.display());
            return Some(numbered);
        }
    }

    let title_match = prefixed_records(parent, media_name)
        .into_iter()
        .find(|candidate| match MetadataRecord::load(candidate) {
            Ok(record) => record.title.as_deref() == Some(media_name),
            Err(e) => {
                log::debug!("Skipping invalid JSON {}: {}", candidate.display(), e);
                false
            }
        });

    match &title_match {
        Some(path) => log::debug!("Found JSON via title match: {}", path.display()),
        None => log::debug!("No matching JSON found for: {}", media_name),
    }
    title_match
}

/// `<media_name>*.json` siblings, excluding resource forks, in sorted order.
fn prefixed_records(dir: &Path, media_name: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(media_name) && n.ends_with(".json"))
        })
        .filter(|p| !is_resource_fork(p) && p.is_file())
        .collect();

    candidates.sort();
    candidates
}

/// Collect media files under `root`, skipping `<root>/Output` and resource forks.
pub fn collect_media(root: &Path) -> Result<Vec<MediaFile>> {
    if !root.is_dir() {
        return Err(TakeoutError::NotADirectory(root.to_path_buf()));
    }

    let output_dir = root.join(OUTPUT_DIR_NAME);
    let mut media: Vec<MediaFile> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.path() != output_dir)
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| !is_resource_fork(e.path()))
        .filter_map(|e| MediaFile::from_path(e.path()))
        .collect();

    media.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(media)
}

/// Recursively scan an export folder and pair every media file with its record.
pub fn scan_folder(root: &Path) -> Result<ScanReport> {
    log::info!("Scanning {}", root.display());
    let media = collect_media(root)?;

    let matched: Vec<(MediaFile, Option<PathBuf>)> = media
        .into_par_iter()
        .map(|m| {
            let record = find_matching_record(&m.path);
            (m, record)
        })
        .collect();

    let mut report = ScanReport::default();
    for (media, record) in matched {
        match media.kind {
            MediaKind::Image => report.images += 1,
            MediaKind::Video => report.videos += 1,
        }
        match record {
            Some(record) => {
                log::debug!("Paired: {} <-> {}", media.path.display(), record.display());
                report.paired.push(Pairing { media, record });
            }
            None => {
                log::debug!("No JSON metadata found for: {}", media.path.display());
                report.unpaired.push(media);
            }
        }
    }

    log::info!(
        "Found {} media files with JSON metadata, {} without",
        report.paired.len(),
        report.unpaired.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;

    #[test]
    fn test_exact_match_wins_over_numbered() {
        let dir = TempDir::new().unwrap();
        dir.child("a.jpg").write_binary(b"img").unwrap();
        dir.child("a.jpg.json").write_str("{}").unwrap();
        dir.child("a.jpg(1).json").write_str("{}").unwrap();

        let found = find_matching_record(dir.child("a.jpg").path()).unwrap();
        assert_eq!(found, dir.child("a.jpg.json").path());
    }

    #[test]
    fn test_numbered_match() {
        let dir = TempDir::new().unwrap();
        dir.child("a.jpg").write_binary(b"img").unwrap();
        dir.child("a.jpg(3).json").write_str("{}").unwrap();
        dir.child("a.jpg(7).json").write_str("{}").unwrap();
        dir.child("a.jpg.supplemental.json")
            .write_str(r#"{"title": "a.jpg"}"#)
            .unwrap();

        let found = find_matching_record(dir.child("a.jpg").path()).unwrap();
        assert_eq!(found, dir.child("a.jpg(3).json").path());
    }

    #[test]
    fn test_title_match() {
        let dir = TempDir::new().unwrap();
        dir.child("a.jpg").write_binary(b"img").unwrap();
        dir.child("._a.jpg.meta.json")
            .write_str(r#"{"title": "a.jpg"}"#)
            .unwrap();
        dir.child("a.jpg.broken.json").write_str("{oops").unwrap();
        dir.child("a.jpg.other.json")
            .write_str(r#"{"title": "b.jpg"}"#)
            .unwrap();
        dir.child("a.jpg.supplemental-metadata.json")
            .write_str(r#"{"title": "a.jpg"}"#)
            .unwrap();

        let found = find_matching_record(dir.child("a.jpg").path()).unwrap();
        assert_eq!(found, dir.child("a.jpg.supplemental-metadata.json").path());
    }

    #[test]
    fn test_no_match() {
        let dir = TempDir::new().unwrap();
        dir.child("a.jpg").write_binary(b"img").unwrap();
        dir.child("b.jpg.json").write_str("{}").unwrap();
        assert!(find_matching_record(dir.child("a.jpg").path()).is_none());
    }

    #[test]
    fn test_scan_folder() {
        let dir = TempDir::new().unwrap();
        dir.child("Takeout/2021/IMG_1.JPG").write_binary(b"1").unwrap();
        dir.child("Takeout/2021/IMG_1.JPG.json").write_str("{}").unwrap();
        dir.child("Takeout/2021/clip.mp4").write_binary(b"2").unwrap();
        dir.child("Takeout/2021/._clip.mp4").write_binary(b"fork").unwrap();
        dir.child("Takeout/notes.txt").write_str("hi").unwrap();
        dir.child("Output/2020/May/old.jpg").write_binary(b"3").unwrap();

        let report = scan_folder(dir.path()).unwrap();
        assert_eq!(report.total(), 2);
        assert_eq!(report.paired.len(), 1);
        assert_eq!(report.unpaired.len(), 1);
        assert_eq!(report.images, 1);
        assert_eq!(report.videos, 1);
        assert_eq!(report.paired[0].media.filename(), "IMG_1.JPG");
        assert_eq!(report.unpaired[0].filename(), "clip.mp4");
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = TempDir::new().unwrap();
        let result = scan_folder(&dir.path().join("nope"));
        assert!(matches!(result, Err(TakeoutError::NotADirectory(_))));
    }
}
