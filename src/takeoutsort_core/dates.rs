use std::sync::OnceLock;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

/// Date format used by exiftool for reading and writing tags.
pub const EXIF_DATE_FORMAT: &[time::format_description::FormatItem] =
    format_description!("[year]:[month]:[day] [hour]:[minute]:[second]");

const EXIF_DAY_FORMAT: &[time::format_description::FormatItem] =
    format_description!("[year]:[month]:[day]");

/// Short human-readable date used in task messages.
pub const DISPLAY_DATE_FORMAT: &[time::format_description::FormatItem] =
    format_description!("[year]-[month]-[day]");

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Where a resolved date came from. Variant order is the priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Provenance {
    RecordPrimary,
    RecordFallback,
    EmbeddedPrimary,
    EmbeddedFallback,
    EmbeddedSecondary,
    FileSystemTime,
    SimilarityGuess,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::RecordPrimary => "JSON",
            Provenance::RecordFallback => "JSON creation time",
            Provenance::EmbeddedPrimary => "EXIF",
            Provenance::EmbeddedFallback => "EXIF create date",
            Provenance::EmbeddedSecondary => "EXIF modify date",
            Provenance::FileSystemTime => "file time",
            Provenance::SimilarityGuess => "guessed",
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Provenance::RecordPrimary | Provenance::RecordFallback)
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A timestamp in local wall-clock time plus its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub at: PrimitiveDateTime,
    pub provenance: Provenance,
}

impl ResolvedDate {
    pub fn new(at: PrimitiveDateTime, provenance: Provenance) -> Self {
        ResolvedDate { at, provenance }
    }

    /// Re-label a date, e.g. when a reference file's date is borrowed by a guess.
    pub fn with_provenance(self, provenance: Provenance) -> Self {
        ResolvedDate { provenance, ..self }
    }

    pub fn display_day(&self) -> String {
        self.at
            .format(DISPLAY_DATE_FORMAT)
            .unwrap_or_else(|_| self.at.date().to_string())
    }

    /// Seconds since the epoch, interpreting the wall-clock time in the local offset.
    pub fn unix_timestamp(&self) -> i64 {
        to_unix_timestamp(self.at)
    }
}

/// Local UTC offset, captured once. Call early in `main` before threads are spawned.
pub fn local_offset() -> UtcOffset {
    *LOCAL_OFFSET.get_or_init(|| UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC))
}

/// Convert epoch seconds to local wall-clock time. Out-of-range values yield `None`.
pub fn from_unix_timestamp(seconds: i64) -> Option<PrimitiveDateTime> {
    let dt = OffsetDateTime::from_unix_timestamp(seconds)
        .ok()?
        .to_offset(local_offset());
    Some(PrimitiveDateTime::new(dt.date(), dt.time()))
}

pub fn to_unix_timestamp(at: PrimitiveDateTime) -> i64 {
    at.assume_offset(local_offset()).unix_timestamp()
}

/// Parse an exiftool date string.
///
/// Accepts `YYYY:MM:DD HH:MM:SS`. Trailing sub-seconds or offsets are ignored,
/// and when the time part is unusable the date alone is taken at midnight.
pub fn parse_exif_date(value: &str) -> Option<PrimitiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = PrimitiveDateTime::parse(value, EXIF_DATE_FORMAT) {
        return Some(dt);
    }

    if let Some(head) = value.get(..19) {
        if let Ok(dt) = PrimitiveDateTime::parse(head, EXIF_DATE_FORMAT) {
            return Some(dt);
        }
    }

    let day = value.split_whitespace().next()?;
    Date::parse(day, EXIF_DAY_FORMAT)
        .ok()
        .map(|d| PrimitiveDateTime::new(d, Time::MIDNIGHT))
}

/// Format a timestamp for an exiftool tag assignment.
pub fn format_exif_date(at: &PrimitiveDateTime) -> String {
    at.format(EXIF_DATE_FORMAT)
        .unwrap_or_else(|_| format!("{} {}", at.date(), at.time()))
}
