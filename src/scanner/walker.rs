use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{DustpanError, Result};
use crate::tracker::PathTracker;

use super::builder::TreeBuilder;
use super::entry::{DirEntry, Exclusion};
use super::options::ScanOptions;
use super::size::{apparent_size, disk_usage};

/// Outcome of one bounded unit of scan work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    More,
    Done,
}

/// Something that produces a directory tree a few entries at a time.
///
/// An `Err` is fatal: the tree cannot be trusted and the scan stops.
/// Recoverable problems are recorded on the tracker and in the tree instead.
pub trait ScanSource {
    fn step(
        &mut self,
        builder: &mut TreeBuilder,
        tracker: &mut PathTracker,
        budget: usize,
    ) -> Result<Step>;
}

/// Live filesystem traversal, one `walkdir` entry at a time.
pub struct LiveScan {
    root: PathBuf,
    options: ScanOptions,
    walker: Option<walkdir::IntoIter>,
    root_dev: u64,
    /// The tracker holds the name of a leaf that has not been left yet.
    pending_leave: bool,
}

impl LiveScan {
    pub fn new(root: impl Into<PathBuf>, options: ScanOptions) -> Self {
        Self {
            root: root.into(),
            options,
            walker: None,
            root_dev: 0,
            pending_leave: false,
        }
    }

    /// Resolve the root and open it. Any failure here is fatal.
    fn start(&mut self, builder: &mut TreeBuilder, tracker: &mut PathTracker) -> Result<Step> {
        tracker.set(&self.root.to_string_lossy());
        let root = self.root.canonicalize().map_err(|source| DustpanError::Io {
            path: self.root.clone(),
            source,
        })?;
        tracker.set(&root.to_string_lossy());

        let metadata = fs::metadata(&root).map_err(|source| DustpanError::Io {
            path: root.clone(),
            source,
        })?;
        self.root_dev = metadata.dev();

        if !metadata.is_dir() {
            builder.add(self.file_entry(root, &metadata).with_dev(self.root_dev));
            return Ok(Step::Done);
        }

        builder.open_dir(DirEntry::new_dir(root.clone(), self.mtime(&metadata)).with_dev(self.root_dev));
        self.walker = Some(WalkDir::new(&root).follow_links(false).min_depth(1).into_iter());
        self.root = root;
        Ok(Step::More)
    }

    fn mtime(&self, metadata: &fs::Metadata) -> Option<std::time::SystemTime> {
        if self.options.extended {
            metadata.modified().ok()
        } else {
            None
        }
    }

    fn file_entry(&self, path: PathBuf, metadata: &fs::Metadata) -> DirEntry {
        DirEntry::new_file(
            path,
            apparent_size(metadata),
            disk_usage(metadata),
            self.mtime(metadata),
        )
    }

    /// Why a directory should be listed but not descended into.
    fn dir_exclusion(&self, path: &Path, dev: u64, parent_dev: Option<u64>) -> Option<Exclusion> {
        if self.options.one_file_system && dev != self.root_dev {
            return Some(Exclusion::OtherFs);
        }
        if self.options.exclude_kernfs
            && parent_dev != Some(dev)
            && ScanOptions::is_kernfs(path)
        {
            return Some(Exclusion::KernFs);
        }
        if self.options.exclude_caches && ScanOptions::is_cache_dir(path) {
            return Some(Exclusion::Cache);
        }
        None
    }

    fn visit(
        &mut self,
        entry: walkdir::DirEntry,
        builder: &mut TreeBuilder,
        tracker: &mut PathTracker,
    ) {
        sync_depth(builder, tracker, entry.depth());

        let path = entry.path().to_path_buf();
        let file_type = entry.file_type();
        let name = entry.file_name().to_string_lossy();
        tracker.enter(&name);
        self.pending_leave = true;

        if self.options.excludes.matches(&path, file_type.is_dir()) {
            let excluded = if file_type.is_dir() {
                DirEntry::new_dir(path, None)
            } else {
                DirEntry::new_file(path, 0, 0, None)
            };
            builder.add(excluded.with_exclusion(Exclusion::Pattern));
            self.skip_dir(file_type.is_dir());
            return;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "Cannot stat entry");
                tracker.record_error(&path.to_string_lossy());
                builder.add(DirEntry::new_error(path, err.to_string()));
                return;
            }
        };

        let metadata = if file_type.is_symlink() && self.options.follow_symlinks {
            match fs::metadata(&path) {
                Ok(target) if !target.is_dir() => target,
                _ => metadata,
            }
        } else {
            metadata
        };

        if !metadata.is_dir() {
            builder.add(self.file_entry(path, &metadata).with_dev(metadata.dev()));
            return;
        }

        let dev = metadata.dev();
        let parent_dev = builder.current_dir().and_then(|dir| dir.dev);
        let dir = DirEntry::new_dir(path, self.mtime(&metadata)).with_dev(dev);
        match self.dir_exclusion(&dir.path, dev, parent_dev) {
            Some(reason) => {
                tracing::debug!(path = %dir.path.display(), ?reason, "Skipping directory");
                builder.add(dir.with_exclusion(reason));
                self.skip_dir(true);
            }
            None => {
                builder.open_dir(dir);
                self.pending_leave = false;
            }
        }
    }

    fn skip_dir(&mut self, is_dir: bool) {
        if is_dir {
            if let Some(walker) = self.walker.as_mut() {
                walker.skip_current_dir();
            }
        }
    }

    fn failure(&mut self, err: walkdir::Error, builder: &mut TreeBuilder, tracker: &mut PathTracker) -> Result<()> {
        let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
        let message = err
            .io_error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| err.to_string());

        if err.depth() == 0 {
            return Err(DustpanError::Io {
                path,
                source: std::io::Error::other(message),
            });
        }

        tracing::debug!(path = %path.display(), error = %message, "Scan error");
        tracker.record_error(&path.to_string_lossy());

        // A directory that was opened but could not be listed.
        if builder.current_dir().map(|dir| dir.path == path).unwrap_or(false) {
            builder.mark_error(message);
            return Ok(());
        }

        sync_depth(builder, tracker, err.depth());
        builder.add(DirEntry::new_error(path, message));
        Ok(())
    }
}

/// Close directories until the builder sits at the parent of an entry at `depth`.
fn sync_depth(builder: &mut TreeBuilder, tracker: &mut PathTracker, depth: usize) {
    while builder.depth() > depth {
        builder.close_dir();
        tracker.leave();
    }
}

impl ScanSource for LiveScan {
    fn step(
        &mut self,
        builder: &mut TreeBuilder,
        tracker: &mut PathTracker,
        budget: usize,
    ) -> Result<Step> {
        if self.walker.is_none() {
            return self.start(builder, tracker);
        }

        for _ in 0..budget.max(1) {
            if self.pending_leave {
                tracker.leave();
                self.pending_leave = false;
            }

            let next = match self.walker.as_mut().and_then(|walker| walker.next()) {
                Some(next) => next,
                None => {
                    sync_depth(builder, tracker, 0);
                    tracker.set(&self.root.to_string_lossy());
                    self.walker = None;
                    return Ok(Step::Done);
                }
            };

            match next {
                Ok(entry) => self.visit(entry, builder, tracker),
                Err(err) => self.failure(err, builder, tracker)?,
            }
        }
        Ok(Step::More)
    }
}

/// Drive a source to completion without any UI.
pub fn scan_to_end(source: &mut dyn ScanSource, tracker: &mut PathTracker) -> Result<Option<DirEntry>> {
    let mut builder = TreeBuilder::new();
    while source.step(&mut builder, tracker, 256)? == Step::More {}
    Ok(builder.finish())
}

/// Scan a directory and return a tree of DirEntry
pub fn scan_directory(root: &Path, options: &ScanOptions) -> Result<DirEntry> {
    let mut source = LiveScan::new(root, options.clone());
    let mut tracker = PathTracker::new();
    scan_to_end(&mut source, &mut tracker)?.ok_or_else(|| DustpanError::Io {
        path: root.to_path_buf(),
        source: std::io::Error::other("scan produced no entries"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_structure() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        File::create(root.join("file1.txt"))
            .unwrap()
            .write_all(b"hello")
            .unwrap();
        File::create(root.join("file2.txt"))
            .unwrap()
            .write_all(b"world!")
            .unwrap();

        fs::create_dir(root.join("subdir")).unwrap();
        File::create(root.join("subdir/nested.txt"))
            .unwrap()
            .write_all(b"nested content")
            .unwrap();

        File::create(root.join(".hidden"))
            .unwrap()
            .write_all(b"secret")
            .unwrap();

        dir
    }

    #[test]
    fn test_scan_directory_basic() {
        let dir = create_test_structure();
        let result = scan_directory(dir.path(), &ScanOptions::default()).unwrap();

        assert!(result.is_dir);
        assert_eq!(result.size, 5 + 6 + 14 + 6);
        assert_eq!(result.file_count, 4);
        assert_eq!(result.dir_count, 1);
    }

    #[test]
    fn test_scan_nonexistent_path() {
        let result = scan_directory(Path::new("/nonexistent/path/12345"), &ScanOptions::default());
        assert!(matches!(result, Err(DustpanError::Io { .. })));
    }

    #[test]
    fn test_scan_sizes_are_accumulated() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("subdir")).unwrap();
        fs::write(root.join("subdir/file1.txt"), vec![b'a'; 100]).unwrap();
        fs::write(root.join("subdir/file2.txt"), vec![b'b'; 200]).unwrap();

        let result = scan_directory(root, &ScanOptions::default()).unwrap();
        assert_eq!(result.size, 300);
        let subdir = result.children.iter().find(|c| c.name == "subdir").unwrap();
        assert_eq!(subdir.size, 300);
    }

    #[test]
    fn test_small_budget_matches_full_scan() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            let sub = dir.path().join(format!("dir{i}"));
            fs::create_dir(&sub).unwrap();
            for j in 0..4 {
                fs::write(sub.join(format!("f{j}")), b"content").unwrap();
            }
        }

        let mut source = LiveScan::new(dir.path(), ScanOptions::default());
        let mut tracker = PathTracker::new();
        let mut builder = TreeBuilder::new();
        let mut steps = 0;
        while source.step(&mut builder, &mut tracker, 1).unwrap() == Step::More {
            steps += 1;
        }
        let root = builder.finish().unwrap();
        assert!(steps >= 25);
        assert_eq!(root.file_count, 20);
        assert_eq!(root.dir_count, 5);
        assert_eq!(builder.items(), 26);
    }

    #[test]
    fn test_tracker_follows_traversal() {
        let dir = create_test_structure();
        let root = dir.path().canonicalize().unwrap();
        let mut source = LiveScan::new(&root, ScanOptions::default());
        let mut tracker = PathTracker::new();
        let mut builder = TreeBuilder::new();

        source.step(&mut builder, &mut tracker, 1).unwrap();
        assert_eq!(tracker.current(), root.to_string_lossy());

        while source.step(&mut builder, &mut tracker, 1).unwrap() == Step::More {
            assert!(tracker.current().starts_with(&*root.to_string_lossy()));
        }
        assert_eq!(tracker.current(), root.to_string_lossy());
    }

    #[test]
    fn test_exclude_pattern_keeps_node() {
        let dir = create_test_structure();
        let mut options = ScanOptions::default();
        options.excludes.add_pattern("subdir").unwrap();

        let result = scan_directory(dir.path(), &options).unwrap();
        let subdir = result.children.iter().find(|c| c.name == "subdir").unwrap();
        assert_eq!(subdir.excluded, Some(Exclusion::Pattern));
        assert!(subdir.children.is_empty());
        assert_eq!(result.file_count, 3);
    }

    #[test]
    fn test_exclude_caches() {
        let dir = create_test_structure();
        let mut tag = super::super::options::CACHEDIR_TAG_SIGNATURE.to_vec();
        tag.push(b'\n');
        fs::write(dir.path().join("subdir/CACHEDIR.TAG"), tag).unwrap();

        let result = scan_directory(dir.path(), &ScanOptions::new().with_exclude_caches(true)).unwrap();
        let subdir = result.children.iter().find(|c| c.name == "subdir").unwrap();
        assert_eq!(subdir.excluded, Some(Exclusion::Cache));

        let result = scan_directory(dir.path(), &ScanOptions::default()).unwrap();
        let subdir = result.children.iter().find(|c| c.name == "subdir").unwrap();
        assert_eq!(subdir.excluded, None);
        assert_eq!(subdir.children.len(), 2);
    }

    /// Child directories of `dir` that are mount points of another filesystem.
    #[cfg(target_os = "linux")]
    fn mounted_children(dir: &Path) -> Vec<(String, PathBuf)> {
        let Ok(parent) = fs::symlink_metadata(dir) else {
            return Vec::new();
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let meta = fs::symlink_metadata(e.path()).ok()?;
                (meta.is_dir() && meta.dev() != parent.dev())
                    .then(|| (e.file_name().to_string_lossy().into_owned(), e.path()))
            })
            .collect()
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_one_file_system_flags_mount_points() {
        let root = Path::new("/sys/fs");
        let mounts = mounted_children(root);
        if mounts.is_empty() {
            return;
        }

        let result = scan_directory(root, &ScanOptions::new().with_one_file_system(true)).unwrap();
        for (name, _) in &mounts {
            let child = result.children.iter().find(|c| &c.name == name).unwrap();
            assert_eq!(child.excluded, Some(Exclusion::OtherFs), "{name}");
            assert!(child.children.is_empty());
        }
        assert!(result
            .children
            .iter()
            .filter(|c| !mounts.iter().any(|(name, _)| name == &c.name))
            .all(|c| c.excluded != Some(Exclusion::OtherFs)));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_exclude_kernfs_flags_pseudo_mounts() {
        let root = Path::new("/sys/fs");
        let kernfs: Vec<_> = mounted_children(root)
            .into_iter()
            .filter(|(_, path)| ScanOptions::is_kernfs(path))
            .collect();
        if kernfs.is_empty() {
            return;
        }

        let result = scan_directory(root, &ScanOptions::new().with_exclude_kernfs(true)).unwrap();
        for (name, _) in &kernfs {
            let child = result.children.iter().find(|c| &c.name == name).unwrap();
            assert_eq!(child.excluded, Some(Exclusion::KernFs), "{name}");
            assert!(child.children.is_empty());
        }
    }

    #[test]
    fn test_kernfs_not_flagged_on_regular_tree() {
        let dir = create_test_structure();
        let result = scan_directory(dir.path(), &ScanOptions::new().with_exclude_kernfs(true)).unwrap();
        assert!(result.children.iter().all(|c| c.excluded.is_none()));
    }

    #[test]
    fn test_symlinks_not_followed_by_default() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("target"), vec![0u8; 1000]).unwrap();
        std::os::unix::fs::symlink(dir.path().join("target"), dir.path().join("link")).unwrap();

        let result = scan_directory(dir.path(), &ScanOptions::default()).unwrap();
        let link = result.children.iter().find(|c| c.name == "link").unwrap();
        assert!(link.size < 1000);

        let result = scan_directory(dir.path(), &ScanOptions::new().with_follow_symlinks(true)).unwrap();
        let link = result.children.iter().find(|c| c.name == "link").unwrap();
        assert_eq!(link.size, 1000);
    }

    #[test]
    fn test_extended_records_mtime() {
        let dir = create_test_structure();
        let plain = scan_directory(dir.path(), &ScanOptions::default()).unwrap();
        assert!(plain.children.iter().all(|c| c.mtime.is_none()));

        let extended = scan_directory(dir.path(), &ScanOptions::new().with_extended(true)).unwrap();
        assert!(extended.children.iter().all(|c| c.mtime.is_some()));
    }

    #[test]
    fn test_unreadable_directory_is_recoverable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = create_test_structure();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("inner"), b"x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root can read anything, nothing to check then.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let mut source = LiveScan::new(dir.path(), ScanOptions::default());
        let mut tracker = PathTracker::new();
        let root = scan_to_end(&mut source, &mut tracker).unwrap().unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let locked_entry = root.children.iter().find(|c| c.name == "locked").unwrap();
        assert!(locked_entry.error.is_some());
        assert!(tracker.last_error().unwrap().ends_with("locked"));
        assert!(tracker.fatal().is_none());
    }
}
