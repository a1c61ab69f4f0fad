use crate::takeoutsort_core::exif::{DateTag, EmbedRequest, MetadataTool};
use crate::takeoutsort_core::media::MediaKind;
use crate::takeoutsort_core::reconcile::embedded_tag;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use time::PrimitiveDateTime;

#[derive(Default)]
struct FakeState {
    dates: HashMap<(String, DateTag), PrimitiveDateTime>,
    written: HashMap<(PathBuf, DateTag), PrimitiveDateTime>,
    embeds: Vec<(PathBuf, EmbedRequest)>,
    fail_embeds_for: Vec<String>,
}

/// Scripted `MetadataTool` for exercising the pipeline without exiftool.
///
/// Seeded dates are keyed by file name so copies inherit the source's embedded
/// dates, like a verbatim copy would. Embedded dates stick to the exact path.
#[derive(Clone, Default)]
pub struct FakeTool {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date(self, filename: &str, tag: DateTag, at: PrimitiveDateTime) -> Self {
        self.state
            .lock()
            .unwrap()
            .dates
            .insert((filename.to_string(), tag), at);
        self
    }

    pub fn with_date_at(self, path: &Path, tag: DateTag, at: PrimitiveDateTime) -> Self {
        self.state
            .lock()
            .unwrap()
            .written
            .insert((path.to_path_buf(), tag), at);
        self
    }

    pub fn failing_for(self, filename: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_embeds_for
            .push(filename.to_string());
        self
    }

    pub fn embeds(&self) -> Vec<(PathBuf, EmbedRequest)> {
        self.state.lock().unwrap().embeds.clone()
    }

    pub fn embed_count(&self) -> usize {
        self.state.lock().unwrap().embeds.len()
    }
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

impl MetadataTool for FakeTool {
    fn read_date(&mut self, path: &Path, tag: DateTag) -> Option<PrimitiveDateTime> {
        let state = self.state.lock().unwrap();
        state
            .written
            .get(&(path.to_path_buf(), tag))
            .or_else(|| state.dates.get(&(name_of(path), tag)))
            .copied()
    }

    fn embed(
        &mut self,
        path: &Path,
        kind: MediaKind,
        request: &EmbedRequest,
    ) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        let name = name_of(path);
        if state.fail_embeds_for.iter().any(|f| name.starts_with(f.as_str())) {
            return Err(format!("exiftool failed for {}", path.display()));
        }
        if let Some(at) = request.date {
            state.written.insert((path.to_path_buf(), embedded_tag(kind)), at);
        }
        state.embeds.push((path.to_path_buf(), request.clone()));
        Ok(())
    }
}
