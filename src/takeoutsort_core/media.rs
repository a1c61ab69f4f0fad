use std::path::{Path, PathBuf};

/// Image file extensions (lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "heic", "heif", "webp", "bmp", "tif", "tiff", "avif",
    // RAW formats
    "dng", "nef", "cr2", "arw",
];

/// Video file extensions (lowercase). These select the QuickTime tag schema when embedding.
pub const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "avi", "m4v", "3gp", "mkv", "mts"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A discovered photo or video. Identity is the resolved absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaFile {
    /// Classify `path` and resolve it to an absolute path. Returns `None` for non-media files.
    pub fn from_path(path: &Path) -> Option<Self> {
        let kind = detect_media_kind(path)?;
        let path = path
            .canonicalize()
            .or_else(|_| std::path::absolute(path))
            .unwrap_or_else(|_| path.to_path_buf());
        Some(MediaFile { path, kind })
    }

    /// The original filename, e.g. `IMG_0001.JPG`.
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}

/// Detect media kind from the file extension, case-insensitively.
pub fn detect_media_kind(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();

    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Some(MediaKind::Image);
    }
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return Some(MediaKind::Video);
    }
    None
}

/// macOS resource-fork artifacts (`._IMG_0001.JPG`) are never media or records.
pub fn is_resource_fork(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("._"))
}
