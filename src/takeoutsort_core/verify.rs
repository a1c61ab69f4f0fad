use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;

use crate::takeoutsort_core::error::Result;
use crate::takeoutsort_core::exif::{DateTag, MetadataTool};
use crate::takeoutsort_core::media::{MediaFile, MediaKind};
use crate::takeoutsort_core::scan::collect_media;

/// Bytes read from each file to prove it can be opened and read.
const READ_CHECK_BYTES: u64 = 1024;

/// Embedded-date check over the images of an output tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataCheck {
    pub with_date: usize,
    pub without_date: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub total: usize,
    pub readable: usize,
    pub unreadable: Vec<PathBuf>,
    /// `None` when no metadata tool was available.
    pub metadata: Option<MetadataCheck>,
}

impl VerifyReport {
    /// Every file could be read. Missing dates don't count against this.
    pub fn is_healthy(&self) -> bool {
        self.unreadable.is_empty()
    }

    /// Healthy, and every checked image carries a `DateTimeOriginal`.
    pub fn is_clean(&self) -> bool {
        self.is_healthy()
            && self
                .metadata
                .as_ref()
                .is_none_or(|check| check.without_date.is_empty())
    }
}

/// Check every media file under `output_dir`.
///
/// Each file must be readable. With a tool, images must also carry an embedded
/// `DateTimeOriginal`; videos are only read.
pub fn verify_output(
    output_dir: &Path,
    tool: Option<&mut dyn MetadataTool>,
    bar: &ProgressBar,
) -> Result<VerifyReport> {
    let files = collect_media(output_dir)?;
    log::info!("Verifying {} files in {}", files.len(), output_dir.display());
    Ok(verify_files(&files, tool, bar))
}

pub fn verify_files(
    files: &[MediaFile],
    mut tool: Option<&mut dyn MetadataTool>,
    bar: &ProgressBar,
) -> VerifyReport {
    bar.set_length(files.len() as u64);

    let mut report = VerifyReport {
        total: files.len(),
        metadata: tool.as_ref().map(|_| MetadataCheck::default()),
        ..Default::default()
    };

    for file in files {
        bar.set_message(file.filename());

        match check_readable(&file.path) {
            Ok(()) => report.readable += 1,
            Err(e) => {
                log::warn!("Unreadable file {}: {}", file.path.display(), e);
                report.unreadable.push(file.path.clone());
            }
        }

        if let (Some(tool), Some(check)) = (tool.as_deref_mut(), report.metadata.as_mut()) {
            if file.kind == MediaKind::Image {
                if tool.read_date(&file.path, DateTag::DateTimeOriginal).is_some() {
                    check.with_date += 1;
                } else {
                    log::debug!("No DateTimeOriginal in {}", file.path.display());
                    check.without_date.push(file.path.clone());
                }
            }
        }

        bar.inc(1);
    }

    bar.finish_with_message("Verification complete");
    report
}

fn check_readable(path: &Path) -> io::Result<()> {
    let mut head = Vec::new();
    File::open(path)?.take(READ_CHECK_BYTES).read_to_end(&mut head)?;
    Ok(())
}
