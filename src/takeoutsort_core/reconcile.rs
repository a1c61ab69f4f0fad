use crate::takeoutsort_core::exif::{DateTag, MetadataTool};
use crate::takeoutsort_core::media::MediaKind;
use crate::takeoutsort_core::placement::{ClaimSet, existing_candidates};
use std::path::{Path, PathBuf};
use time::PrimitiveDateTime;

/// Embedded and record dates this close are considered the same capture time.
pub const MATCH_TOLERANCE_SECS: i64 = 60;

/// Check whether `path` already carries the record date in its primary date tag.
///
/// A match means a previous run (or the export itself) embedded the metadata,
/// so the file only needs to be placed.
pub fn has_matching_metadata(
    tool: &mut dyn MetadataTool,
    path: &Path,
    record_date: PrimitiveDateTime,
) -> bool {
    has_matching_date(tool, path, DateTag::DateTimeOriginal, record_date)
}

/// The tag an embed writes first for `kind`.
pub fn embedded_tag(kind: MediaKind) -> DateTag {
    match kind {
        MediaKind::Image => DateTag::DateTimeOriginal,
        MediaKind::Video => DateTag::CreateDate,
    }
}

/// Find a copy of `filename` in `dest_dir` that an earlier run already stamped
/// with `record_date`, and claim it.
///
/// Candidates written during the current run are skipped.
pub fn find_embedded_copy(
    tool: &mut dyn MetadataTool,
    dest_dir: &Path,
    filename: &str,
    kind: MediaKind,
    record_date: PrimitiveDateTime,
    claims: &ClaimSet,
) -> Option<PathBuf> {
    existing_candidates(dest_dir, filename).find(|candidate| {
        !claims.is_claimed(candidate)
            && has_matching_date(&mut *tool, candidate, embedded_tag(kind), record_date)
            && claims.claim(candidate)
    })
}

fn has_matching_date(
    tool: &mut dyn MetadataTool,
    path: &Path,
    tag: DateTag,
    record_date: PrimitiveDateTime,
) -> bool {
    let Some(embedded) = tool.read_date(path, tag) else {
        return false;
    };

    let diff = (embedded - record_date).whole_seconds().abs();
    if diff <= MATCH_TOLERANCE_SECS {
        log::info!(
            "File {} already has matching metadata, skipping",
            path.display()
        );
        true
    } else {
        log::debug!(
            "Date mismatch for {}: embedded={}, record={}",
            path.display(),
            embedded,
            record_date
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::takeoutsort_core::testutil::FakeTool;
    use assert_fs::TempDir;
    use std::fs;
    use time::macros::datetime;

    #[test]
    fn test_matching_within_a_minute() {
        let mut tool = FakeTool::new()
            .with_date("a.jpg", DateTag::DateTimeOriginal, datetime!(2021-01-01 10:00:45));
        assert!(has_matching_metadata(&mut tool, Path::new("/in/a.jpg"), datetime!(2021-01-01 10:00:00)));
        assert!(has_matching_metadata(&mut tool, Path::new("/in/a.jpg"), datetime!(2021-01-01 10:01:45)));
    }

    #[test]
    fn test_mismatch() {
        let mut tool = FakeTool::new()
            .with_date("a.jpg", DateTag::DateTimeOriginal, datetime!(2021-01-01 10:00:00));
        assert!(!has_matching_metadata(&mut tool, Path::new("/in/a.jpg"), datetime!(2021-01-01 10:01:01)));
    }

    #[test]
    fn test_embedded_copy_from_earlier_run() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path();
        fs::write(dest.join("clip.mp4"), b"other month").unwrap();
        fs::write(dest.join("clip_1.mp4"), b"stamped").unwrap();
        let mut tool = FakeTool::new().with_date_at(
            &dest.join("clip_1.mp4"),
            DateTag::CreateDate,
            datetime!(2021-01-01 10:00:00),
        );

        let claims = ClaimSet::new();
        let found = find_embedded_copy(
            &mut tool,
            dest,
            "clip.mp4",
            MediaKind::Video,
            datetime!(2021-01-01 10:00:20),
            &claims,
        );
        assert_eq!(found, Some(dest.join("clip_1.mp4")));
        assert!(claims.is_claimed(&dest.join("clip_1.mp4")));

        // Already taken by another task this run.
        let again = find_embedded_copy(
            &mut tool,
            dest,
            "clip.mp4",
            MediaKind::Video,
            datetime!(2021-01-01 10:00:20),
            &claims,
        );
        assert_eq!(again, None);
    }

    #[test]
    fn test_no_embedded_copy_without_date() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), b"plain").unwrap();
        let found = find_embedded_copy(
            &mut FakeTool::new(),
            dir.path(),
            "a.jpg",
            MediaKind::Image,
            datetime!(2021-01-01 10:00:00),
            &ClaimSet::new(),
        );
        assert_eq!(found, None);
    }

    #[test]
    fn test_absent_or_other_tag_only() {
        let mut tool = FakeTool::new()
            .with_date("a.jpg", DateTag::CreateDate, datetime!(2021-01-01 10:00:00));
        assert!(!has_matching_metadata(&mut tool, Path::new("/in/a.jpg"), datetime!(2021-01-01 10:00:00)));
        assert!(!has_matching_metadata(&mut tool, Path::new("/in/b.jpg"), datetime!(2021-01-01 10:00:00)));
    }
}
