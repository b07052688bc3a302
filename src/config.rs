use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CliError, ConfigError};
use crate::scanner::{ExcludeRules, ScanOptions};

/// Refresh interval selected by `--fast-ui-updates` (and the default).
pub const FAST_UPDATE_DELAY_MS: u64 = 100;
/// Refresh interval selected by `-q` / `--slow-ui-updates`.
pub const SLOW_UPDATE_DELAY_MS: u64 = 2000;

/// Color scheme of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    Off,
    Dark,
    #[default]
    DarkBg,
}

impl Theme {
    /// Parse a `--color` argument.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "off" => Some(Theme::Off),
            "dark" => Some(Theme::Dark),
            "dark-bg" => Some(Theme::DarkBg),
            _ => None,
        }
    }
}

/// How much feedback to give while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiLevel {
    /// No output at all (`-0`).
    None,
    /// A single progress line on stderr (`-1`).
    Line,
    /// The full-screen dashboard (`-2`).
    Full,
}

/// Runtime configuration, assembled once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Refresh interval in milliseconds
    pub update_delay: u64,
    pub one_file_system: bool,
    pub extended: bool,
    /// 1 disables deletion, 2 also disables the shell
    pub read_only: u8,
    /// Explicitly selected UI level (None = pick from export settings)
    pub ui: Option<UiLevel>,
    /// Use base 10 prefixes
    pub si: bool,
    pub follow_symlinks: bool,
    pub excludes: ExcludeRules,
    pub exclude_caches: bool,
    pub exclude_kernfs: bool,
    pub follow_firmlinks: bool,
    pub confirm_quit: bool,
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            update_delay: FAST_UPDATE_DELAY_MS,
            one_file_system: false,
            extended: false,
            read_only: 0,
            ui: None,
            si: false,
            follow_symlinks: false,
            excludes: ExcludeRules::new(),
            exclude_caches: false,
            exclude_kernfs: false,
            follow_firmlinks: true,
            confirm_quit: false,
            theme: Theme::default(),
        }
    }
}

/// `NO_COLOR` counts as set whenever it is present, even when empty.
pub fn no_color_requested(value: Option<&std::ffi::OsStr>) -> bool {
    value.is_some()
}

impl Config {
    /// Build the starting configuration from file defaults and the environment.
    pub fn from_file(file: &FileConfig, no_color: bool) -> Result<Self, CliError> {
        let mut excludes = ExcludeRules::new();
        for pattern in &file.exclude {
            excludes.add_pattern(pattern)?;
        }

        let theme = match file.color {
            Some(theme) => theme,
            None if no_color => Theme::Off,
            None => Theme::default(),
        };

        Ok(Self {
            update_delay: if file.slow_ui_updates {
                SLOW_UPDATE_DELAY_MS
            } else {
                FAST_UPDATE_DELAY_MS
            },
            one_file_system: file.one_file_system,
            extended: file.extended,
            follow_symlinks: file.follow_symlinks,
            excludes,
            exclude_caches: file.exclude_caches,
            exclude_kernfs: file.exclude_kernfs,
            follow_firmlinks: file.follow_firmlinks,
            si: file.si,
            confirm_quit: file.confirm_quit,
            theme,
            ..Self::default()
        })
    }

    /// Options handed to the live scanner.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions::new()
            .with_one_file_system(self.one_file_system)
            .with_follow_symlinks(self.follow_symlinks)
            .with_exclude_caches(self.exclude_caches)
            .with_exclude_kernfs(self.exclude_kernfs)
            .with_extended(self.extended)
            .with_excludes(self.excludes.clone())
    }

    pub fn deletion_allowed(&self) -> bool {
        self.read_only == 0
    }

    pub fn shell_allowed(&self) -> bool {
        self.read_only < 2
    }
}

/// Optional on-disk defaults (`~/.config/dustpan/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub slow_ui_updates: bool,
    pub one_file_system: bool,
    pub extended: bool,
    pub follow_symlinks: bool,
    /// Exclude patterns, same syntax as `--exclude`
    pub exclude: Vec<String>,
    pub exclude_caches: bool,
    pub exclude_kernfs: bool,
    pub follow_firmlinks: bool,
    pub si: bool,
    pub confirm_quit: bool,
    /// Color scheme: off, dark, dark-bg
    pub color: Option<Theme>,
    /// Write logs to this file instead of stderr
    pub log_file: Option<PathBuf>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            slow_ui_updates: false,
            one_file_system: false,
            extended: false,
            follow_symlinks: false,
            exclude: vec![],
            exclude_caches: false,
            exclude_kernfs: false,
            follow_firmlinks: true,
            si: false,
            confirm_quit: false,
            color: None,
            log_file: None,
        }
    }
}

impl FileConfig {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dustpan").join("config.toml"))
    }

    /// Load the config file.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
            path: path.clone(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ConfigError::ParseError { path, source })
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}
