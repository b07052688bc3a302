mod builder;
mod entry;
mod exclude;
mod export;
mod import;
mod options;
mod size;
mod walker;

pub use builder::TreeBuilder;
pub use entry::{DirEntry, Exclusion};
pub use exclude::ExcludeRules;
pub use export::{entry_to_value, write_export};
pub use import::ImportScan;
pub use options::{ScanOptions, CACHEDIR_TAG_SIGNATURE};
pub use size::format_size;
pub use walker::{scan_directory, scan_to_end, LiveScan, ScanSource, Step};
