//! Command line handling.
//!
//! [`ArgParser`] turns the raw argument list into a stream of options and
//! positional arguments; [`parse_args`] interprets that stream and builds the
//! startup [`Invocation`].

use std::path::Path;

use crate::config::{Config, Theme, UiLevel, FAST_UPDATE_DELAY_MS, SLOW_UPDATE_DELAY_MS};
use crate::error::CliError;

/// One item produced by [`ArgParser::next_arg`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// An option, spelled with its dashes (`-x`, `--exclude`).
    Option(String),
    Positional(String),
}

/// Cursor over the raw argument list.
#[derive(Debug)]
pub struct ArgParser {
    args: std::vec::IntoIter<String>,
    /// Letters left over from a short option run like `-rLx`.
    short_run: Option<String>,
    /// The most recent option, as matched by callers.
    last: String,
    /// Text after `=` in a long option, until somebody asks for it.
    attached: Option<String>,
    /// Set once a bare `--` has been seen.
    separator_seen: bool,
}

impl ArgParser {
    /// `args` must not include the program name.
    pub fn new<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            args: args.into_iter().collect::<Vec<_>>().into_iter(),
            short_run: None,
            last: String::new(),
            attached: None,
            separator_seen: false,
        }
    }

    /// Produce the next option or positional argument, `None` at the end.
    pub fn next_arg(&mut self) -> Result<Option<Arg>, CliError> {
        if self.attached.is_some() {
            return Err(CliError::UnexpectedArgument(self.last.clone()));
        }
        if let Some(run) = self.short_run.take() {
            return Ok(Some(self.short_option(&run)));
        }

        loop {
            let Some(token) = self.args.next() else {
                return Ok(None);
            };

            if self.separator_seen || !token.starts_with('-') {
                return Ok(Some(Arg::Positional(token)));
            }
            if token == "-" {
                return Err(CliError::InvalidOption);
            }
            if token == "--" {
                self.separator_seen = true;
                continue;
            }

            if token.starts_with("--") {
                match token.split_once('=') {
                    Some((name, value)) => {
                        self.last = name.to_string();
                        self.attached = Some(value.to_string());
                    }
                    None => self.last = token,
                }
                return Ok(Some(Arg::Option(self.last.clone())));
            }

            return Ok(Some(self.short_option(&token[1..])));
        }
    }

    fn short_option(&mut self, run: &str) -> Arg {
        let mut chars = run.chars();
        if let Some(letter) = chars.next() {
            self.last = format!("-{letter}");
        }
        let rest = chars.as_str();
        self.short_run = (!rest.is_empty()).then(|| rest.to_string());
        Arg::Option(self.last.clone())
    }

    /// Take the value of the option just returned by [`next_arg`](Self::next_arg).
    pub fn value(&mut self) -> Result<String, CliError> {
        if let Some(run) = self.short_run.take() {
            return Ok(run);
        }
        if let Some(value) = self.attached.take() {
            return Ok(value);
        }
        self.args
            .next()
            .ok_or_else(|| CliError::MissingArgument(self.last.clone()))
    }

    /// The most recently returned option.
    pub fn last(&self) -> &str {
        &self.last
    }
}

/// What the process should do after argument parsing.
#[derive(Debug)]
pub enum CliAction {
    Help,
    Version,
    Run(Invocation),
}

/// Everything needed to start a session.
#[derive(Debug)]
pub struct Invocation {
    pub config: Config,
    /// Export target (`-` = stdout)
    pub export: Option<String>,
    /// Import source (`-` = stdin)
    pub import: Option<String>,
    /// Directory to scan
    pub dir: Option<String>,
}

impl Invocation {
    pub fn scan_root(&self) -> &str {
        self.dir.as_deref().unwrap_or(".")
    }

    /// The explicit UI level, or no feedback when exporting to stdout,
    /// a single line when exporting to a file, the dashboard otherwise.
    pub fn ui_level(&self) -> UiLevel {
        match (self.config.ui, self.export.as_deref()) {
            (Some(level), _) => level,
            (None, Some("-")) => UiLevel::None,
            (None, Some(_)) => UiLevel::Line,
            (None, None) => UiLevel::Full,
        }
    }

    /// Whether the dashboard must talk to `/dev/tty` because stdio carries data.
    pub fn uses_dev_tty(&self) -> bool {
        self.export.as_deref() == Some("-") || self.import.as_deref() == Some("-")
    }
}

/// Interpret the command line on top of `config`.
pub fn parse_args<I>(args: I, mut config: Config) -> Result<CliAction, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut parser = ArgParser::new(args);
    let mut export = None;
    let mut import = None;
    let mut dir: Option<String> = None;

    while let Some(arg) = parser.next_arg()? {
        let opt = match arg {
            Arg::Positional(path) => {
                if let Some(first) = dir.take() {
                    return Err(CliError::ExtraPositional {
                        first,
                        second: path,
                    });
                }
                dir = Some(path);
                continue;
            }
            Arg::Option(opt) => opt,
        };

        match opt.as_str() {
            "-v" | "-V" | "--version" => return Ok(CliAction::Version),
            "-h" | "-?" | "--help" => return Ok(CliAction::Help),
            "-o" => export = Some(parser.value()?),
            "-f" => import = Some(parser.value()?),
            "--ignore-config" => {}
            _ => apply_option(&mut parser, &opt, &mut config)?,
        }
    }

    if config.exclude_kernfs && !cfg!(target_os = "linux") {
        return Err(CliError::KernfsUnsupported);
    }

    Ok(CliAction::Run(Invocation {
        config,
        export,
        import,
        dir,
    }))
}

/// Apply a configuration option. Fails on anything unrecognized.
fn apply_option(parser: &mut ArgParser, opt: &str, config: &mut Config) -> Result<(), CliError> {
    match opt {
        "-q" | "--slow-ui-updates" => config.update_delay = SLOW_UPDATE_DELAY_MS,
        "--fast-ui-updates" => config.update_delay = FAST_UPDATE_DELAY_MS,
        "-x" | "--one-file-system" => config.one_file_system = true,
        "--cross-file-system" => config.one_file_system = false,
        "-e" | "--extended" => config.extended = true,
        "--no-extended" => config.extended = false,
        "-r" => config.read_only = config.read_only.saturating_add(1),
        "-0" => config.ui = Some(UiLevel::None),
        "-1" => config.ui = Some(UiLevel::Line),
        "-2" => config.ui = Some(UiLevel::Full),
        "--si" => config.si = true,
        "--no-si" => config.si = false,
        "-L" | "--follow-symlinks" => config.follow_symlinks = true,
        "--no-follow-symlinks" => config.follow_symlinks = false,
        "--exclude" => {
            let pattern = parser.value()?;
            config.excludes.add_pattern(&pattern)?;
        }
        "-X" | "--exclude-from" => {
            let file = parser.value()?;
            config.excludes.add_from_file(Path::new(&file))?;
        }
        "--exclude-caches" => config.exclude_caches = true,
        "--include-caches" => config.exclude_caches = false,
        "--exclude-kernfs" => config.exclude_kernfs = true,
        "--include-kernfs" => config.exclude_kernfs = false,
        "--follow-firmlinks" => config.follow_firmlinks = true,
        "--exclude-firmlinks" => config.follow_firmlinks = false,
        "--confirm-quit" => config.confirm_quit = true,
        "--no-confirm-quit" => config.confirm_quit = false,
        "--color" => {
            let name = parser.value()?;
            config.theme = Theme::parse(&name).ok_or(CliError::UnknownColor(name))?;
        }
        _ => return Err(CliError::UnknownOption(opt.to_string())),
    }
    Ok(())
}

/// Text printed by `--help`.
pub const USAGE: &str = "\
dustpan <options> <directory>

  -h,--help                  This help message
  -q,--slow-ui-updates       Quiet mode, refresh interval 2 seconds
  --fast-ui-updates          Refresh interval 100 milliseconds (default)
  -v,-V,--version            Print version
  -x,--one-file-system       Same filesystem
  --cross-file-system        Cross filesystem boundaries (default)
  -e,--extended              Enable extended information
  --no-extended              Disable extended information (default)
  -r                         Read only (twice: also disable the shell)
  -o FILE                    Export scanned directory to FILE
  -f FILE                    Import scanned directory from FILE
  -0,-1,-2                   UI to use when scanning (0=none,2=full dashboard)
  --si / --no-si             Use base 10 (SI) prefixes instead of base 2
  --exclude PATTERN          Exclude files that match PATTERN
  -X,--exclude-from FILE     Exclude files that match any pattern in FILE
  -L,--follow-symlinks       Follow symbolic links (excluding directories)
  --no-follow-symlinks       Do not follow symbolic links (default)
  --exclude-caches           Exclude directories containing CACHEDIR.TAG
  --include-caches           Include directories containing CACHEDIR.TAG (default)
  --exclude-kernfs           Exclude Linux pseudo filesystems (procfs,sysfs,cgroup,...)
  --include-kernfs           Include Linux pseudo filesystems (default)
  --follow-firmlinks         Follow firmlinks on macOS (default)
  --exclude-firmlinks        Exclude firmlinks on macOS
  --confirm-quit             Confirm quitting
  --no-confirm-quit          Quit without confirmation (default)
  --color SCHEME             Set color scheme (off/dark/dark-bg)
  --ignore-config            Do not load the config file (must come first)
";
