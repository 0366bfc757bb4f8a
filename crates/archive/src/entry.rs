use std::borrow::Cow;
use std::fs::Metadata;
use std::io::Read;
use std::path::PathBuf;

use serde::Serialize;
use tar::EntryType;

use crate::ArchiveError;

/// Kind of filesystem object an archive entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    RegularFile,
    Directory,
    Symlink,
    /// Second and later names of a hard-linked file. The link target names
    /// an earlier entry of the same archive. Never produced by the encoder.
    HardLink,
    /// Devices and FIFOs. Never produced by the encoder.
    Other,
}

impl EntryKind {
    fn from_tar(entry_type: EntryType) -> Self {
        if entry_type.is_file() || entry_type.is_contiguous() || entry_type.is_gnu_sparse() {
            EntryKind::RegularFile
        } else if entry_type.is_dir() {
            EntryKind::Directory
        } else if entry_type.is_symlink() {
            EntryKind::Symlink
        } else if entry_type.is_hard_link() {
            EntryKind::HardLink
        } else {
            EntryKind::Other
        }
    }

    pub(crate) fn to_tar(self) -> EntryType {
        match self {
            EntryKind::RegularFile | EntryKind::Other => EntryType::Regular,
            EntryKind::Directory => EntryType::Directory,
            EntryKind::Symlink => EntryType::Symlink,
            EntryKind::HardLink => EntryType::Link,
        }
    }
}

/// Header-level description of one archive record.
///
/// `name` is the path stored in the archive, label included. Names and
/// link targets are raw paths, so they need not be valid UTF-8; the
/// payload of regular files is streamed separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub name: PathBuf,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_target: Option<PathBuf>,
    pub size: u64,
    pub mode: u32,
}

impl ArchiveEntry {
    /// Describes a local filesystem object about to be archived as `name`.
    pub(crate) fn from_metadata(
        name: PathBuf,
        meta: &Metadata,
        link_target: Option<PathBuf>,
    ) -> Self {
        let file_type = meta.file_type();
        let (kind, size) = if file_type.is_dir() {
            (EntryKind::Directory, 0)
        } else if file_type.is_symlink() {
            (EntryKind::Symlink, 0)
        } else if file_type.is_file() {
            (EntryKind::RegularFile, meta.len())
        } else {
            // FIFOs and devices travel as empty regular files.
            (EntryKind::RegularFile, 0)
        };

        Self {
            name,
            kind,
            link_target,
            size,
            mode: permission_bits(meta),
        }
    }

    /// Reads the header of an entry coming out of a tar stream.
    pub(crate) fn from_tar<R: Read>(entry: &tar::Entry<'_, R>) -> Result<Self, ArchiveError> {
        let name = entry.path()?.into_owned();
        let link_target = entry.link_name()?.map(Cow::into_owned);
        let header = entry.header();

        let mode = header.mode().map_err(|e| {
            ArchiveError::InvalidEntry(format!("bad mode field for {}: {e}", name.display()))
        })?;

        Ok(Self {
            kind: EntryKind::from_tar(header.entry_type()),
            size: entry.size(),
            name,
            link_target,
            mode,
        })
    }
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata) -> u32 {
    if meta.is_dir() {
        0o755
    } else if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Totals for one encoded or decoded archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveStats {
    /// Entries written (encode) or materialized on disk (decode).
    pub entries: u64,
    /// Regular-file payload bytes.
    pub bytes: u64,
}

/// Reads a whole archive stream and returns its entry headers in order.
pub fn list_entries<R: Read>(reader: R) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    let mut out = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        out.push(ArchiveEntry::from_tar(&entry)?);
    }
    Ok(out)
}
