//! Incremental tree construction.
//!
//! Scan sources report entries in depth-first order; the builder keeps the
//! chain of open directories and folds each one into its parent when closed.

use super::entry::DirEntry;

#[derive(Debug, Default)]
pub struct TreeBuilder {
    open: Vec<DirEntry>,
    root: Option<DirEntry>,
    items: u64,
    total_size: u64,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a directory. Entries added afterwards become its children.
    pub fn open_dir(&mut self, dir: DirEntry) {
        self.items += 1;
        self.open.push(dir);
    }

    /// Add a leaf entry (or a directory that will not be descended into).
    pub fn add(&mut self, entry: DirEntry) {
        self.items += 1;
        self.total_size += entry.disk_usage;
        self.attach(entry);
    }

    /// Finish the innermost open directory.
    pub fn close_dir(&mut self) {
        if let Some(mut dir) = self.open.pop() {
            dir.recalculate_totals();
            dir.sort_by_size();
            self.attach(dir);
        }
    }

    fn attach(&mut self, entry: DirEntry) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(entry),
            None => self.root = Some(entry),
        }
    }

    /// Mark the innermost open directory as only partially readable.
    pub fn mark_error(&mut self, message: String) {
        if let Some(dir) = self.open.last_mut() {
            dir.error = Some(message);
        }
    }

    /// The innermost open directory.
    pub fn current_dir(&self) -> Option<&DirEntry> {
        self.open.last()
    }

    /// Number of open directories.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Entries seen so far.
    pub fn items(&self) -> u64 {
        self.items
    }

    /// Disk usage of the entries seen so far.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Close every open directory and hand out the tree.
    pub fn finish(&mut self) -> Option<DirEntry> {
        while !self.open.is_empty() {
            self.close_dir();
        }
        self.root.take()
    }
}
