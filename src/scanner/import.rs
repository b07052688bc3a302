//! Replays an exported tree as if it were being scanned.

use std::io::Read;
use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};

use serde_json::{Map, Value};

use crate::error::{DustpanError, Result};
use crate::tracker::PathTracker;

use super::builder::TreeBuilder;
use super::entry::{DirEntry, Exclusion};
use super::export::MAJOR_VERSION;
use super::walker::{ScanSource, Step};

/// Scan source reading a JSON export.
///
/// The document is parsed on the first step; later steps walk it with an
/// explicit stack so deep trees do not recurse.
pub struct ImportScan {
    reader: Option<Box<dyn Read>>,
    /// Remaining children of every open directory.
    stack: Vec<std::vec::IntoIter<Value>>,
    pending_leave: bool,
}

impl ImportScan {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self {
            reader: Some(reader),
            stack: Vec::new(),
            pending_leave: false,
        }
    }

    fn start(
        &mut self,
        reader: Box<dyn Read>,
        builder: &mut TreeBuilder,
        tracker: &mut PathTracker,
    ) -> Result<Step> {
        let document: Value = serde_json::from_reader(reader)
            .map_err(|e| DustpanError::Import(format!("invalid JSON: {e}")))?;

        let Value::Array(mut parts) = document else {
            return Err(DustpanError::Import("expected a JSON array".into()));
        };
        match parts.first().and_then(Value::as_u64) {
            Some(MAJOR_VERSION) => {}
            Some(other) => {
                return Err(DustpanError::Import(format!(
                    "unsupported format version {other}"
                )))
            }
            None => return Err(DustpanError::Import("missing format version".into())),
        }
        if parts.len() < 4 {
            return Err(DustpanError::Import("missing directory tree".into()));
        }
        let root = parts.swap_remove(3);

        match root {
            Value::Array(items) => {
                let mut items = items.into_iter();
                let info = items
                    .next()
                    .ok_or_else(|| DustpanError::Import("empty root directory".into()))?;
                let info = as_info(&info)?;
                let name = info_name(info)?;
                tracker.set(name);
                let dir = dir_entry(PathBuf::from(name), info);
                if dir.error.is_some() {
                    let current = tracker.current().to_owned();
                    tracker.record_error(&current);
                }
                builder.open_dir(dir);
                self.stack.push(items);
                Ok(Step::More)
            }
            Value::Object(info) => {
                let name = info_name(&info)?;
                tracker.set(name);
                builder.add(file_entry(PathBuf::from(name), &info));
                Ok(Step::Done)
            }
            _ => Err(DustpanError::Import("invalid root entry".into())),
        }
    }

    fn visit(&mut self, item: Value, builder: &mut TreeBuilder, tracker: &mut PathTracker) -> Result<()> {
        let parent = builder
            .current_dir()
            .map(|dir| dir.path.clone())
            .unwrap_or_default();

        match item {
            Value::Array(items) => {
                let mut items = items.into_iter();
                let info = items
                    .next()
                    .ok_or_else(|| DustpanError::Import("directory without info".into()))?;
                let info = as_info(&info)?;
                let name = info_name(info)?;
                tracker.enter(name);
                let path = parent.join(name);
                let dir = dir_entry(path, info);
                if dir.error.is_some() {
                    let current = tracker.current().to_owned();
                    tracker.record_error(&current);
                }
                if dir.excluded.is_some() {
                    builder.add(dir);
                    self.pending_leave = true;
                } else {
                    builder.open_dir(dir);
                    self.stack.push(items);
                }
            }
            Value::Object(info) => {
                let name = info_name(&info)?;
                tracker.enter(name);
                self.pending_leave = true;
                let entry = file_entry(parent.join(name), &info);
                if entry.error.is_some() {
                    let current = tracker.current().to_owned();
                    tracker.record_error(&current);
                }
                builder.add(entry);
            }
            _ => return Err(DustpanError::Import("invalid entry".into())),
        }
        Ok(())
    }
}

fn as_info(value: &Value) -> Result<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| DustpanError::Import("expected an info object".into()))
}

fn info_name(info: &Map<String, Value>) -> Result<&str> {
    info.get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| DustpanError::Import("entry without a name".into()))
}

fn number(info: &Map<String, Value>, key: &str) -> Option<u64> {
    info.get(key).and_then(Value::as_u64)
}

fn apply_flags(entry: &mut DirEntry, info: &Map<String, Value>) {
    entry.dev = number(info, "dev");
    entry.mtime = number(info, "mtime").map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
    if info.get("read_error").and_then(Value::as_bool).unwrap_or(false) {
        entry.error = Some("read error".into());
    }
    entry.excluded = info
        .get("excluded")
        .and_then(Value::as_str)
        .map(Exclusion::from_name);
}

fn dir_entry(path: PathBuf, info: &Map<String, Value>) -> DirEntry {
    let mut dir = DirEntry::new_dir(path, None);
    apply_flags(&mut dir, info);
    dir
}

fn file_entry(path: PathBuf, info: &Map<String, Value>) -> DirEntry {
    let mut file = DirEntry::new_file(
        path,
        number(info, "asize").unwrap_or(0),
        number(info, "dsize").unwrap_or(0),
        None,
    );
    apply_flags(&mut file, info);
    if let Some(reason) = file.excluded {
        file = file.with_exclusion(reason);
    }
    file
}

impl ScanSource for ImportScan {
    fn step(
        &mut self,
        builder: &mut TreeBuilder,
        tracker: &mut PathTracker,
        budget: usize,
    ) -> Result<Step> {
        if let Some(reader) = self.reader.take() {
            return self.start(reader, builder, tracker);
        }

        for _ in 0..budget.max(1) {
            if self.pending_leave {
                tracker.leave();
                self.pending_leave = false;
            }

            let Some(children) = self.stack.last_mut() else {
                return Ok(Step::Done);
            };
            match children.next() {
                Some(item) => self.visit(item, builder, tracker)?,
                None => {
                    self.stack.pop();
                    builder.close_dir();
                    if self.stack.is_empty() {
                        return Ok(Step::Done);
                    }
                    tracker.leave();
                }
            }
        }
        Ok(Step::More)
    }
}
