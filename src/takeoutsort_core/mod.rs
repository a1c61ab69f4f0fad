pub mod cli;
pub mod dates;
pub mod error;
pub mod exif;
pub mod guess;
pub mod ledger;
pub mod media;
pub mod orchestrator;
pub mod placement;
pub mod process;
pub mod reconcile;
pub mod record;
pub mod reorganize;
pub mod resolve;
pub mod scan;
pub mod verify;
pub mod workers;

#[cfg(test)]
pub(crate) mod testutil;

pub use cli::{Cli, Commands};
pub use dates::{Provenance, ResolvedDate, local_offset};
pub use error::{Result, TakeoutError};
pub use exif::{DateTag, EmbedRequest, ExifToolBackend, MetadataTool, exiftool_available};
pub use ledger::Ledger;
pub use media::{MediaFile, MediaKind};
pub use orchestrator::{CancelToken, RunSummary, worker_count};
pub use process::{RunOptions, RunReport};
pub use record::MetadataRecord;
pub use reorganize::{ReorganizeOptions, ReorganizeReport};
pub use resolve::ResolveOptions;
pub use scan::{Pairing, ScanReport, scan_folder};
pub use verify::{VerifyReport, verify_output};
pub use workers::{Task, TaskOutcome};
