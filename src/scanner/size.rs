use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;

use humansize::{BINARY, DECIMAL};

/// Get apparent file size (content length)
pub fn apparent_size(metadata: &Metadata) -> u64 {
    metadata.len()
}

/// Get actual disk usage (blocks * block_size)
/// On most Linux systems, st_blocks is in 512-byte units
pub fn disk_usage(metadata: &Metadata) -> u64 {
    metadata.blocks() * 512
}

/// Format size in human-readable form, base 10 when `si` is set.
pub fn format_size(bytes: u64, si: bool) -> String {
    if si {
        humansize::format_size(bytes, DECIMAL)
    } else {
        humansize::format_size(bytes, BINARY)
    }
}
