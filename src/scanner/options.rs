use std::path::Path;

use super::exclude::ExcludeRules;

/// Configuration options for directory scanning operations.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Stay on the same filesystem (don't cross mount points)
    pub one_file_system: bool,

    /// Follow symbolic links that point to non-directories
    pub follow_symlinks: bool,

    /// Skip directories tagged with a valid CACHEDIR.TAG
    pub exclude_caches: bool,

    /// Skip Linux pseudo filesystems (procfs, sysfs, cgroup, ...)
    pub exclude_kernfs: bool,

    /// Record modification times
    pub extended: bool,

    /// Pattern based exclusions
    pub excludes: ExcludeRules,
}

/// First bytes of a valid cache directory tag.
pub const CACHEDIR_TAG_SIGNATURE: &[u8] = b"Signature: 8a477f597d28d172789f06886806bc55";

impl ScanOptions {
    /// Create a new ScanOptions with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to stay on the same filesystem
    pub fn with_one_file_system(mut self, enabled: bool) -> Self {
        self.one_file_system = enabled;
        self
    }

    /// Set whether to follow symbolic links
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn with_exclude_caches(mut self, enabled: bool) -> Self {
        self.exclude_caches = enabled;
        self
    }

    pub fn with_exclude_kernfs(mut self, enabled: bool) -> Self {
        self.exclude_kernfs = enabled;
        self
    }

    pub fn with_extended(mut self, enabled: bool) -> Self {
        self.extended = enabled;
        self
    }

    /// Set exclusion rules
    pub fn with_excludes(mut self, excludes: ExcludeRules) -> Self {
        self.excludes = excludes;
        self
    }

    /// Check whether `dir` holds a CACHEDIR.TAG file with the standard signature.
    pub fn is_cache_dir(dir: &Path) -> bool {
        use std::io::Read;

        let Ok(mut file) = std::fs::File::open(dir.join("CACHEDIR.TAG")) else {
            return false;
        };
        let mut head = [0u8; CACHEDIR_TAG_SIGNATURE.len()];
        file.read_exact(&mut head).is_ok() && head == CACHEDIR_TAG_SIGNATURE
    }

    /// Check whether `dir` is the mount point of a kernel pseudo filesystem.
    #[cfg(target_os = "linux")]
    pub fn is_kernfs(dir: &Path) -> bool {
        use nix::sys::statfs::{
            statfs, BPF_FS_MAGIC, CGROUP2_SUPER_MAGIC, CGROUP_SUPER_MAGIC, DEBUGFS_MAGIC,
            DEVPTS_SUPER_MAGIC, PROC_SUPER_MAGIC, SECURITYFS_MAGIC, SYSFS_MAGIC, TRACEFS_MAGIC,
        };

        let Ok(stat) = statfs(dir) else {
            return false;
        };
        let fs_type = stat.filesystem_type();
        [
            BPF_FS_MAGIC,
            CGROUP2_SUPER_MAGIC,
            CGROUP_SUPER_MAGIC,
            DEBUGFS_MAGIC,
            DEVPTS_SUPER_MAGIC,
            PROC_SUPER_MAGIC,
            SECURITYFS_MAGIC,
            SYSFS_MAGIC,
            TRACEFS_MAGIC,
        ]
        .contains(&fs_type)
    }

    #[cfg(not(target_os = "linux"))]
    pub fn is_kernfs(_dir: &Path) -> bool {
        false
    }
}
