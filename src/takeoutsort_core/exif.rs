use crate::takeoutsort_core::dates::{format_exif_date, parse_exif_date};
use crate::takeoutsort_core::error::{Result, TakeoutError};
use crate::takeoutsort_core::media::MediaKind;
use crate::takeoutsort_core::record::{GeoPoint, MetadataRecord};
use exiftool::ExifTool;
use serde::Deserialize;
use std::path::Path;
use time::PrimitiveDateTime;

/// Embedded date attributes, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateTag {
    DateTimeOriginal,
    CreateDate,
    ModifyDate,
}

impl DateTag {
    pub const FALLBACK_CHAIN: [DateTag; 3] =
        [DateTag::DateTimeOriginal, DateTag::CreateDate, DateTag::ModifyDate];

    pub fn as_str(&self) -> &'static str {
        match self {
            DateTag::DateTimeOriginal => "DateTimeOriginal",
            DateTag::CreateDate => "CreateDate",
            DateTag::ModifyDate => "ModifyDate",
        }
    }
}

/// The attribute set stamped into a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedRequest {
    pub date: Option<PrimitiveDateTime>,
    pub geo: Option<GeoPoint>,
    pub people: Vec<String>,
    pub description: Option<String>,
    pub identifier: Option<String>,
}

impl EmbedRequest {
    pub fn from_record(record: &MetadataRecord, date: Option<PrimitiveDateTime>) -> Self {
        EmbedRequest {
            date,
            geo: record.geo,
            people: record.people.clone(),
            description: record.description.clone(),
            identifier: record.url.clone(),
        }
    }

    /// Short summary used in task messages, e.g. `Date: 2021-01-01, People: 2`.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(date) = &self.date {
            parts.push(format!("Date: {}", date.date()));
        }
        if let Some(geo) = &self.geo {
            parts.push(format!("GPS: {:.4}, {:.4}", geo.latitude, geo.longitude));
        }
        if !self.people.is_empty() {
            parts.push(format!("People: {}", self.people.len()));
        }
        if self.description.is_some() {
            parts.push("Desc: Yes".to_string());
        }
        if parts.is_empty() {
            "No metadata".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// The metadata embedding collaborator.
///
/// Each worker owns one instance, so implementations may keep a long-lived
/// process and need not be `Sync`.
pub trait MetadataTool {
    /// Read one embedded date attribute. Missing or unparseable values are `None`.
    fn read_date(&mut self, path: &Path, tag: DateTag) -> Option<PrimitiveDateTime>;

    /// Stamp `request` into the file in place. Failures carry a diagnostic.
    fn embed(
        &mut self,
        path: &Path,
        kind: MediaKind,
        request: &EmbedRequest,
    ) -> std::result::Result<(), String>;
}

/// Embedded date fields as reported by `exiftool -j`.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
struct EmbeddedDates {
    #[serde(default)]
    date_time_original: Option<String>,
    #[serde(default)]
    create_date: Option<String>,
    #[serde(default)]
    modify_date: Option<String>,
}

impl EmbeddedDates {
    fn get(&self, tag: DateTag) -> Option<&str> {
        match tag {
            DateTag::DateTimeOriginal => self.date_time_original.as_deref(),
            DateTag::CreateDate => self.create_date.as_deref(),
            DateTag::ModifyDate => self.modify_date.as_deref(),
        }
    }
}

/// `MetadataTool` backed by a persistent exiftool process.
pub struct ExifToolBackend {
    exiftool: ExifTool,
}

impl ExifToolBackend {
    pub fn new() -> Result<Self> {
        let exiftool = ExifTool::new().map_err(|e| TakeoutError::Exiftool(e.to_string()))?;
        Ok(ExifToolBackend { exiftool })
    }
}

impl MetadataTool for ExifToolBackend {
    fn read_date(&mut self, path: &Path, tag: DateTag) -> Option<PrimitiveDateTime> {
        let arg = format!("-{}", tag.as_str());
        let dates: EmbeddedDates = match self.exiftool.read_metadata(path, &[arg.as_str()]) {
            Ok(dates) => dates,
            Err(e) => {
                log::debug!("Error reading {} from {}: {}", tag.as_str(), path.display(), e);
                return None;
            }
        };

        let value = dates.get(tag)?;
        let parsed = parse_exif_date(value);
        if parsed.is_none() {
            log::debug!("Could not parse {} '{}' in {}", tag.as_str(), value, path.display());
        }
        parsed
    }

    fn embed(
        &mut self,
        path: &Path,
        kind: MediaKind,
        request: &EmbedRequest,
    ) -> std::result::Result<(), String> {
        let args = build_embed_args(path, kind, request)?;
        log::debug!("Running exiftool with: {}", args.join(" "));

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.exiftool
            .execute_lines(&arg_refs)
            .map(|_| ())
            .map_err(|e| format!("exiftool failed for {}: {}", path.display(), e))
    }
}

/// Build exiftool arguments for the attribute schema of `kind`. The file path comes last.
pub fn build_embed_args(
    path: &Path,
    kind: MediaKind,
    request: &EmbedRequest,
) -> std::result::Result<Vec<String>, String> {
    let path_str = path
        .to_str()
        .ok_or_else(|| format!("Path is not valid UTF-8: {}", path.display()))?;

    let mut args = vec!["-overwrite_original".to_string()];

    match kind {
        MediaKind::Video => {
            // QuickTime containers only get dates.
            if let Some(date) = &request.date {
                let date = format_exif_date(date);
                args.push(format!("-QuickTime:CreateDate={}", date));
                args.push(format!("-QuickTime:ModifyDate={}", date));
                args.push(format!("-XMP:DateCreated={}", date));
            }
        }
        MediaKind::Image => {
            if let Some(date) = &request.date {
                let date = format_exif_date(date);
                args.push(format!("-DateTimeOriginal={}", date));
                args.push(format!("-CreateDate={}", date));
                args.push(format!("-ModifyDate={}", date));
            }

            if let Some(geo) = &request.geo {
                let lat_ref = if geo.latitude < 0.0 { "S" } else { "N" };
                let lon_ref = if geo.longitude < 0.0 { "W" } else { "E" };
                let alt_ref = if geo.altitude < 0.0 { "Below Sea Level" } else { "Above Sea Level" };
                args.push(format!("-GPSLatitude={}", geo.latitude.abs()));
                args.push(format!("-GPSLatitudeRef={}", lat_ref));
                args.push(format!("-GPSLongitude={}", geo.longitude.abs()));
                args.push(format!("-GPSLongitudeRef={}", lon_ref));
                args.push(format!("-GPSAltitude={}", geo.altitude.abs()));
                args.push(format!("-GPSAltitudeRef={}", alt_ref));
            }

            if !request.people.is_empty() {
                args.push("-IPTC:CodedCharacterSet=UTF8".to_string());
            }
            for person in &request.people {
                let name = single_line(person);
                args.push(format!("-XMP:PersonInImage={}", name));
                // Remove-then-add keeps keywords unique across repeated runs.
                args.push(format!("-IPTC:Keywords-={}", name));
                args.push(format!("-IPTC:Keywords+={}", name));
            }

            if let Some(description) = &request.description {
                args.push(format!("-ImageDescription={}", single_line(description)));
            }

            if let Some(identifier) = &request.identifier {
                args.push(format!("-XMP:Identifier={}", single_line(identifier)));
            }
        }
    }

    args.push(path_str.to_string());
    Ok(args)
}

/// exiftool reads one argument per line in `-stay_open` mode.
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Check if exiftool is available on the system.
pub fn exiftool_available() -> bool {
    std::process::Command::new("exiftool")
        .arg("-ver")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
