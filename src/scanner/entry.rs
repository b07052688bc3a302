use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Represents a file or directory with its metadata and size information.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Full path to the file or directory
    pub path: PathBuf,

    /// Entry name (last component of path)
    pub name: String,

    /// True if this is a directory
    pub is_dir: bool,

    /// Apparent size in bytes (sum of file sizes)
    pub size: u64,

    /// Actual disk usage in bytes (accounting for block size)
    pub disk_usage: u64,

    /// Number of files (1 for files, recursive count for dirs)
    pub file_count: u64,

    /// Number of subdirectories (recursive)
    pub dir_count: u64,

    /// Device the entry lives on
    pub dev: Option<u64>,

    /// Last modification time, only recorded in extended mode
    pub mtime: Option<SystemTime>,

    /// Why the entry was not descended into, if it was skipped
    pub excluded: Option<Exclusion>,

    /// Child entries (empty for files)
    pub children: Vec<DirEntry>,

    /// Error message if we couldn't read this entry (permission denied, etc.)
    pub error: Option<String>,
}

/// Reason an entry was listed but not scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Matched an exclude pattern
    Pattern,
    /// On a different filesystem with `--one-file-system`
    OtherFs,
    /// A kernel pseudo filesystem with `--exclude-kernfs`
    KernFs,
    /// Tagged with CACHEDIR.TAG with `--exclude-caches`
    Cache,
}

impl Exclusion {
    /// Name used in the export format. Cache directories are written as
    /// pattern exclusions, which is all other readers of the format know.
    pub fn as_str(self) -> &'static str {
        match self {
            Exclusion::Pattern | Exclusion::Cache => "pattern",
            Exclusion::OtherFs => "otherfs",
            Exclusion::KernFs => "kernfs",
        }
    }

    /// Parse an export name. Unknown names (like `frmlnk`) count as pattern exclusions.
    pub fn from_name(name: &str) -> Self {
        match name {
            "otherfs" => Exclusion::OtherFs,
            "kernfs" => Exclusion::KernFs,
            _ => Exclusion::Pattern,
        }
    }
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

impl DirEntry {
    pub fn new_dir(path: PathBuf, mtime: Option<SystemTime>) -> Self {
        Self {
            name: name_of(&path),
            path,
            is_dir: true,
            size: 0,
            disk_usage: 0,
            file_count: 0,
            dir_count: 0,
            dev: None,
            mtime,
            excluded: None,
            children: Vec::new(),
            error: None,
        }
    }

    pub fn new_file(path: PathBuf, size: u64, disk_usage: u64, mtime: Option<SystemTime>) -> Self {
        Self {
            name: name_of(&path),
            path,
            is_dir: false,
            size,
            disk_usage,
            file_count: 1,
            dir_count: 0,
            dev: None,
            mtime,
            excluded: None,
            children: Vec::new(),
            error: None,
        }
    }

    /// An entry that could not be read at all.
    pub fn new_error(path: PathBuf, error: String) -> Self {
        Self {
            name: name_of(&path),
            path,
            is_dir: false,
            size: 0,
            disk_usage: 0,
            file_count: 0,
            dir_count: 0,
            dev: None,
            mtime: None,
            excluded: None,
            children: Vec::new(),
            error: Some(error),
        }
    }

    pub fn with_dev(mut self, dev: u64) -> Self {
        self.dev = Some(dev);
        self
    }

    /// Flag the entry as skipped. Skipped files do not count as files.
    pub fn with_exclusion(mut self, reason: Exclusion) -> Self {
        self.excluded = Some(reason);
        if !self.is_dir {
            self.file_count = 0;
        }
        self
    }

    /// Recompute sizes and counts from the direct children.
    pub fn recalculate_totals(&mut self) {
        if !self.is_dir {
            return;
        }
        self.size = 0;
        self.disk_usage = 0;
        self.file_count = 0;
        self.dir_count = 0;
        for child in &self.children {
            self.size += child.size;
            self.disk_usage += child.disk_usage;
            self.file_count += child.file_count;
            self.dir_count += child.dir_count + u64::from(child.is_dir);
        }
    }

    /// Sort children by disk usage, largest first, then by name.
    pub fn sort_by_size(&mut self) {
        self.children.sort_by(|a, b| {
            b.disk_usage
                .cmp(&a.disk_usage)
                .then_with(|| b.size.cmp(&a.size))
                .then_with(|| a.name.cmp(&b.name))
        });
    }

    /// Whether this entry or anything below it failed to read.
    pub fn has_errors(&self) -> bool {
        self.error.is_some() || self.children.iter().any(DirEntry::has_errors)
    }

    /// Walk down a list of child indices.
    pub fn descend(&self, indices: &[usize]) -> Option<&DirEntry> {
        indices
            .iter()
            .try_fold(self, |entry, &idx| entry.children.get(idx))
    }

    /// Remove the child at `indices` and fix up totals along the way.
    pub fn remove_at(&mut self, indices: &[usize]) -> Option<DirEntry> {
        let (&last, parents) = indices.split_last()?;
        self.remove_nested(parents, last)
    }

    fn remove_nested(&mut self, parents: &[usize], last: usize) -> Option<DirEntry> {
        let removed = match parents.split_first() {
            None => {
                if last >= self.children.len() {
                    return None;
                }
                self.children.remove(last)
            }
            Some((&idx, rest)) => self.children.get_mut(idx)?.remove_nested(rest, last)?,
        };
        self.recalculate_totals();
        Some(removed)
    }
}
