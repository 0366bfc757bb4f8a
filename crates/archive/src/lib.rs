//! Streaming tar codec for container copies.
//!
//! Encodes a local file tree into a tar stream while the remote side is
//! extracting it, and decodes a tar stream produced remotely back into a
//! local tree. Both directions are plain blocking `Read`/`Write`
//! transforms; the caller decides which thread they run on.
//!
//! [`paths`] holds the naming rules for remote paths shared by both
//! directions; [`strip_base_label`] maps entry names onto the local root.

mod decode;
mod encode;
mod entry;
pub mod paths;
mod tail;

pub use decode::decode_tree;
pub use encode::encode_tree;
pub use entry::{ArchiveEntry, ArchiveStats, EntryKind, list_entries};
pub use tail::{link_stays_inside, strip_base_label};

/// Errors produced by the archive crate.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed archive entry: {0}")]
    InvalidEntry(String),

    #[error("cancelled")]
    Cancelled,
}
