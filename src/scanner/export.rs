//! JSON export in the ncdu interchange format.
//!
//! The document is `[1, 2, {metadata}, <root>]` where a directory is an array
//! holding its info object followed by its children, and a file is a bare info
//! object.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Map, Value};

use super::entry::DirEntry;

pub const MAJOR_VERSION: u64 = 1;
pub const MINOR_VERSION: u64 = 2;

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn info_object(entry: &DirEntry) -> Value {
    let mut info = Map::new();
    info.insert("name".into(), json!(entry.name));
    // Directory sizes are recomputed from their children on import.
    if !entry.is_dir {
        if entry.size > 0 {
            info.insert("asize".into(), json!(entry.size));
        }
        if entry.disk_usage > 0 {
            info.insert("dsize".into(), json!(entry.disk_usage));
        }
    }
    if let Some(dev) = entry.dev {
        info.insert("dev".into(), json!(dev));
    }
    if let Some(mtime) = entry.mtime {
        info.insert("mtime".into(), json!(unix_seconds(mtime)));
    }
    if entry.error.is_some() {
        info.insert("read_error".into(), json!(true));
    }
    if let Some(reason) = entry.excluded {
        info.insert("excluded".into(), json!(reason.as_str()));
    }
    Value::Object(info)
}

/// Convert a tree into its JSON form.
pub fn entry_to_value(entry: &DirEntry) -> Value {
    if !entry.is_dir {
        return info_object(entry);
    }
    let mut items = Vec::with_capacity(entry.children.len() + 1);
    items.push(info_object(entry));
    items.extend(entry.children.iter().map(entry_to_value));
    Value::Array(items)
}

/// Write a complete export document for `root`.
pub fn write_export<W: Write>(mut out: W, root: &DirEntry) -> std::io::Result<()> {
    // The root carries its full path, everything else just a name.
    let mut root_value = entry_to_value(root);
    let root_name = json!(root.path.to_string_lossy());
    match &mut root_value {
        Value::Array(items) => {
            if let Some(Value::Object(info)) = items.first_mut() {
                info.insert("name".into(), root_name);
            }
        }
        Value::Object(info) => {
            info.insert("name".into(), root_name);
        }
        _ => {}
    }

    let document = json!([
        MAJOR_VERSION,
        MINOR_VERSION,
        {
            "progname": env!("CARGO_PKG_NAME"),
            "progver": env!("CARGO_PKG_VERSION"),
            "timestamp": unix_seconds(SystemTime::now()),
        },
        root_value,
    ]);
    serde_json::to_writer(&mut out, &document)?;
    out.write_all(b"\n")?;
    out.flush()
}
