//! Exclude-pattern store.
//!
//! Patterns follow gitignore syntax: a pattern without a slash matches the
//! entry name at any depth, a leading slash anchors it to the filesystem root.

use std::fs;
use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::CliError;

#[derive(Debug, Clone)]
pub struct ExcludeRules {
    patterns: Vec<String>,
    matcher: Gitignore,
}

impl Default for ExcludeRules {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            matcher: Gitignore::empty(),
        }
    }
}

impl ExcludeRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pattern(&mut self, pattern: &str) -> Result<(), CliError> {
        self.patterns.push(pattern.to_string());
        match build_matcher(&self.patterns) {
            Ok(matcher) => {
                self.matcher = matcher;
                Ok(())
            }
            Err(err) => {
                self.patterns.pop();
                Err(CliError::ExcludePattern {
                    pattern: pattern.to_string(),
                    message: err.to_string(),
                })
            }
        }
    }

    /// Add every non-empty line of `path` as a pattern.
    pub fn add_from_file(&mut self, path: &Path) -> Result<(), CliError> {
        let contents = fs::read_to_string(path).map_err(|source| CliError::ExcludeFile {
            path: path.to_path_buf(),
            source,
        })?;
        for line in contents.lines() {
            let line = line.trim_end_matches('\r');
            if !line.is_empty() {
                self.add_pattern(line)?;
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
        self.matcher = Gitignore::empty();
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check an absolute path against the rules.
    pub fn matches(&self, path: &Path, is_dir: bool) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        self.matcher.matched(path, is_dir).is_ignore()
    }
}

fn build_matcher(patterns: &[String]) -> Result<Gitignore, ignore::Error> {
    let mut builder = GitignoreBuilder::new("/");
    for pattern in patterns {
        builder.add_line(None, pattern)?;
    }
    builder.build()
}
