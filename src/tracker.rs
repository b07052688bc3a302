//! Current traversal path and scan error bookkeeping.
//!
//! The scanner updates the tracker while it walks; the progress and error
//! overlays only ever read from it.

/// A text buffer that grows by doubling and never gives memory back.
#[derive(Debug, Default, Clone)]
pub struct GrowBuf {
    buf: String,
    growths: usize,
}

impl GrowBuf {
    /// Smallest capacity allocated on first use.
    pub const MIN_CAPACITY: usize = 128;

    pub fn new() -> Self {
        Self::default()
    }

    /// Make room for a total length of `needed` bytes.
    fn reserve_total(&mut self, needed: usize) {
        let capacity = self.buf.capacity();
        if capacity >= needed {
            return;
        }
        let target = needed.max(capacity * 2).max(Self::MIN_CAPACITY);
        self.buf.reserve_exact(target - self.buf.len());
        self.growths += 1;
    }

    pub fn set(&mut self, text: &str) {
        self.reserve_total(text.len());
        self.buf.clear();
        self.buf.push_str(text);
    }

    pub fn push_str(&mut self, text: &str) {
        self.reserve_total(self.buf.len() + text.len());
        self.buf.push_str(text);
    }

    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Number of times the buffer had to reallocate.
    pub fn growths(&self) -> usize {
        self.growths
    }
}

/// Tracks the item being visited, the last recoverable error and the fatal error.
#[derive(Debug, Clone)]
pub struct PathTracker {
    current: GrowBuf,
    last_error: GrowBuf,
    has_error: bool,
    fatal: Option<String>,
}

impl Default for PathTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PathTracker {
    pub fn new() -> Self {
        let mut current = GrowBuf::new();
        current.set("/");
        Self {
            current,
            last_error: GrowBuf::new(),
            has_error: false,
            fatal: None,
        }
    }

    /// Replace the whole current path. Trailing slashes are dropped except for the root.
    ///
    /// Relative input is resolved against the current path, so the result stays absolute.
    pub fn set(&mut self, path: &str) {
        if !path.starts_with('/') {
            for component in path.split('/') {
                match component {
                    "" | "." => {}
                    ".." => self.leave(),
                    name => self.enter(name),
                }
            }
            return;
        }
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            self.current.set("/");
        } else {
            self.current.set(trimmed);
        }
    }

    /// Descend into `name`.
    pub fn enter(&mut self, name: &str) {
        if self.current.as_str() != "/" {
            self.current.push_str("/");
        }
        self.current.push_str(name);
    }

    /// Drop the last path component.
    pub fn leave(&mut self) {
        match self.current.as_str().rfind('/') {
            None => self.current.set("/"),
            Some(0) => self.current.truncate(1),
            Some(idx) => self.current.truncate(idx),
        }
    }

    pub fn current(&self) -> &str {
        self.current.as_str()
    }

    /// Remember `path` as the location of the most recent recoverable error.
    pub fn record_error(&mut self, path: &str) {
        self.last_error.set(path);
        self.has_error = true;
    }

    pub fn clear_error(&mut self) {
        self.last_error.clear();
        self.has_error = false;
    }

    pub fn last_error(&self) -> Option<&str> {
        self.has_error.then(|| self.last_error.as_str())
    }

    /// Set or clear the fatal error. A new message always replaces the old one.
    pub fn set_fatal(&mut self, message: Option<String>) {
        self.fatal = message;
    }

    pub fn fatal(&self) -> Option<&str> {
        self.fatal.as_deref()
    }

    /// Reallocation count of the current-path buffer.
    pub fn path_growths(&self) -> usize {
        self.current.growths()
    }
}
