//! Tar stream reader that materializes entries under a local root.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::ArchiveError;
use crate::entry::{ArchiveEntry, ArchiveStats, EntryKind};
use crate::tail::strip_base_label;

/// Reads a tar stream rooted at `label` and recreates it under `dest_root`.
///
/// The leading `label` segment is stripped from every entry, so the
/// contents of the archived directory land directly in `dest_root`.
/// Existing files are replaced, not merged. Hard links are recreated
/// against the file an earlier entry already wrote; a link to anything
/// else fails the decode. The stream is read to exhaustion, including any
/// padding after the end-of-archive marker.
///
/// Entries written before an error stay on disk; nothing is rolled back.
pub fn decode_tree<R: Read>(
    reader: R,
    label: &str,
    dest_root: &Path,
    cancel: &CancellationToken,
) -> Result<ArchiveStats, ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    let mut stats = ArchiveStats::default();
    // Tails of the regular files written so far; hard links may only
    // point at one of these.
    let mut written: HashSet<PathBuf> = HashSet::new();

    for entry in archive.entries()? {
        if cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }

        let mut entry = entry?;
        let record = ArchiveEntry::from_tar(&entry)?;

        let (target, tail) = match strip_base_label(&record.name, label)? {
            Some(tail) => (dest_root.join(&tail), tail),
            None => match record.kind {
                EntryKind::Directory => {
                    fs::create_dir_all(dest_root)?;
                    continue;
                }
                EntryKind::RegularFile => (root_file_target(dest_root, label), PathBuf::new()),
                _ => {
                    warn!(name = %record.name.display(), kind = ?record.kind, "skipping root entry");
                    continue;
                }
            },
        };

        match record.kind {
            EntryKind::Directory => fs::create_dir_all(&target)?,
            EntryKind::RegularFile => {
                stats.bytes += write_file(&mut entry, &target)?;
                written.insert(tail);
            }
            EntryKind::HardLink => {
                let source = hard_link_source(&record, label, dest_root, &written)?;
                write_hard_link(&source, &target)?;
                written.insert(tail);
            }
            EntryKind::Symlink => {
                if !write_symlink(&record, &tail, &target)? {
                    continue;
                }
            }
            EntryKind::Other => {
                warn!(name = %record.name.display(), "skipping device or fifo entry");
                continue;
            }
        }

        stats.entries += 1;
        trace!(path = %target.display(), kind = ?record.kind, "extracted");
    }

    // The producer may pad past the end-of-archive blocks; leave nothing
    // unread so it never sees a closed pipe.
    let drained = io::copy(&mut archive.into_inner(), &mut io::sink())?;

    debug!(
        dest = %dest_root.display(),
        label,
        entries = stats.entries,
        bytes = stats.bytes,
        drained,
        "archive decoded"
    );
    Ok(stats)
}

/// Target for an archive whose root is a single regular file.
fn root_file_target(dest_root: &Path, label: &str) -> PathBuf {
    if dest_root.is_dir() {
        dest_root.join(label)
    } else {
        dest_root.to_path_buf()
    }
}

fn write_file<R: Read>(payload: &mut R, target: &Path) -> Result<u64, ArchiveError> {
    prepare_target(target)?;
    let mut file = File::create(target)?;
    Ok(io::copy(payload, &mut file)?)
}

/// Creates the parent of `target` and clears whatever sits at `target`.
///
/// Files, symlinks and empty directories are removed. A non-empty
/// directory is left in place, so writing a file over it fails with an
/// I/O error instead of deleting its contents.
fn prepare_target(target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => fs::remove_dir(target),
        Ok(_) => fs::remove_file(target),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Local path of the file a hard-link entry refers to.
///
/// The link target is an archive name like any other, so it goes through
/// the same label stripping; it must name a regular file this decode
/// already wrote.
fn hard_link_source(
    record: &ArchiveEntry,
    label: &str,
    dest_root: &Path,
    written: &HashSet<PathBuf>,
) -> Result<PathBuf, ArchiveError> {
    let link = record.link_target.as_deref().ok_or_else(|| {
        ArchiveError::InvalidEntry(format!("hard link without target: {}", record.name.display()))
    })?;

    match strip_base_label(link, label)? {
        Some(tail) if written.contains(&tail) => Ok(dest_root.join(tail)),
        _ => Err(ArchiveError::InvalidEntry(format!(
            "hard link {} points outside the archive: {}",
            record.name.display(),
            link.display()
        ))),
    }
}

fn write_hard_link(source: &Path, target: &Path) -> Result<(), ArchiveError> {
    if source == target {
        return Ok(());
    }
    prepare_target(target)?;
    if let Err(e) = fs::hard_link(source, target) {
        debug!(path = %target.display(), error = %e, "hard link failed, copying instead");
        fs::copy(source, target)?;
    }
    Ok(())
}

/// Recreates a symlink entry. Returns `false` when the entry was skipped.
#[cfg(unix)]
fn write_symlink(record: &ArchiveEntry, tail: &Path, target: &Path) -> Result<bool, ArchiveError> {
    let Some(link) = record.link_target.as_deref() else {
        return Err(ArchiveError::InvalidEntry(format!(
            "symlink without target: {}",
            record.name.display()
        )));
    };

    if !crate::tail::link_stays_inside(tail, link) {
        warn!(
            name = %record.name.display(),
            link = %link.display(),
            "skipping symlink pointing outside the destination"
        );
        return Ok(false);
    }

    prepare_target(target)?;
    std::os::unix::fs::symlink(link, target)?;
    Ok(true)
}

#[cfg(not(unix))]
fn write_symlink(record: &ArchiveEntry, _tail: &Path, _target: &Path) -> Result<bool, ArchiveError> {
    warn!(name = %record.name.display(), "symlinks are not supported on this platform, skipping");
    Ok(false)
}
