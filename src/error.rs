use std::path::PathBuf;
use thiserror::Error;

/// Core library errors
#[derive(Error, Debug)]
pub enum DustpanError {
    #[error(transparent)]
    Cli(#[from] CliError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Can't open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Terminal error: {0}")]
    Terminal(#[source] std::io::Error),

    #[error("Standard input is not a TTY. Did you mean to import a file using '-f -'?")]
    NotATty,

    #[error("Scan aborted: {0}")]
    ScanAborted(String),

    #[error("Failed to write export: {0}")]
    Export(#[source] std::io::Error),

    #[error("Failed to read import: {0}")]
    Import(String),
}

/// Errors produced while interpreting the command line.
///
/// Messages name the offending option exactly as it was typed.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Unknown option '{0}'.")]
    UnknownOption(String),

    #[error("Option '{0}' requires an argument.")]
    MissingArgument(String),

    #[error("Option '{0}' does not expect an argument.")]
    UnexpectedArgument(String),

    #[error("Invalid option '-'.")]
    InvalidOption,

    #[error("Unknown --color option: {0}")]
    UnknownColor(String),

    #[error("Only one directory can be given, got '{first}' and '{second}'.")]
    ExtraPositional { first: String, second: String },

    #[error("Can't open {path}: {source}")]
    ExcludeFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid exclude pattern '{pattern}': {message}")]
    ExcludePattern { pattern: String, message: String },

    #[error("The --exclude-kernfs flag is currently only supported on Linux.")]
    KernfsUnsupported,
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DustpanError>;

impl From<std::io::Error> for DustpanError {
    fn from(err: std::io::Error) -> Self {
        DustpanError::Terminal(err)
    }
}
