//! Local tree walk that writes a tar stream.

use std::cell::Cell;
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tar::{Builder, Header};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::ArchiveError;
use crate::entry::{ArchiveEntry, ArchiveStats, EntryKind};

/// Walks `src` and writes it to `writer` as a tar stream rooted at `label`.
///
/// Non-empty directories get no header of their own; the extracting side
/// recreates them from their children's names. Empty directories get an
/// explicit entry so they survive the trip. Symlinks are archived as links
/// and never followed.
///
/// On error the stream is left truncated: no end-of-archive marker is
/// written, so the reading side cannot mistake it for a complete archive.
pub fn encode_tree<W: Write>(
    src: &Path,
    label: &str,
    writer: W,
    cancel: &CancellationToken,
) -> Result<ArchiveStats, ArchiveError> {
    let sealed = Rc::new(Cell::new(false));
    let mut encoder = TreeEncoder {
        builder: Builder::new(SealOnError {
            inner: writer,
            sealed: Rc::clone(&sealed),
        }),
        stats: ArchiveStats::default(),
        cancel,
    };

    if let Err(e) = encoder.visit(src, Path::new(label)) {
        // Dropping the builder would otherwise append the end-of-archive blocks.
        sealed.set(true);
        return Err(e);
    }

    let stats = encoder.stats;
    let mut out = encoder.builder.into_inner()?;
    out.flush()?;

    debug!(
        src = %src.display(),
        label,
        entries = stats.entries,
        bytes = stats.bytes,
        "archive encoded"
    );
    Ok(stats)
}

struct TreeEncoder<'a, W: Write> {
    builder: Builder<SealOnError<W>>,
    stats: ArchiveStats,
    cancel: &'a CancellationToken,
}

impl<W: Write> TreeEncoder<'_, W> {
    fn visit(&mut self, path: &Path, name: &Path) -> Result<(), ArchiveError> {
        if self.cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }

        let meta = fs::symlink_metadata(path)?;
        let file_type = meta.file_type();

        if file_type.is_dir() {
            let mut children = fs::read_dir(path)?
                .map(|entry| entry.map(|e| e.file_name()))
                .collect::<Result<Vec<_>, _>>()?;

            if children.is_empty() {
                let entry = ArchiveEntry::from_metadata(name.to_path_buf(), &meta, None);
                return self.append(&entry, &meta, io::empty());
            }

            children.sort();
            for child in children {
                self.visit(&path.join(&child), &name.join(&child))?;
            }
            Ok(())
        } else if file_type.is_symlink() {
            let target: PathBuf = fs::read_link(path)?;
            let entry = ArchiveEntry::from_metadata(name.to_path_buf(), &meta, Some(target));
            self.append(&entry, &meta, io::empty())
        } else {
            let entry = ArchiveEntry::from_metadata(name.to_path_buf(), &meta, None);
            if file_type.is_file() {
                let file = File::open(path)?;
                self.append(&entry, &meta, file)
            } else {
                // Opening a FIFO would block until a writer shows up.
                self.append(&entry, &meta, io::empty())
            }
        }
    }

    fn append<R: Read>(
        &mut self,
        entry: &ArchiveEntry,
        meta: &Metadata,
        payload: R,
    ) -> Result<(), ArchiveError> {
        let mut header = Header::new_gnu();
        header.set_metadata(meta);
        header.set_entry_type(entry.kind.to_tar());
        header.set_size(entry.size);
        header.set_mode(entry.mode);

        match (entry.kind, entry.link_target.as_deref()) {
            (EntryKind::Symlink, Some(target)) => {
                self.builder.append_link(&mut header, &entry.name, target)?;
            }
            _ => {
                let mut payload = SizedPayload {
                    inner: payload,
                    remaining: entry.size,
                };
                self.builder
                    .append_data(&mut header, &entry.name, &mut payload)?;
                self.stats.bytes += entry.size;
            }
        }

        self.stats.entries += 1;
        trace!(name = %entry.name.display(), kind = ?entry.kind, size = entry.size, "archived");
        Ok(())
    }
}

/// Reads exactly `remaining` bytes from `inner`, failing if it runs dry.
///
/// The header already promised that many bytes; a file that shrinks while
/// being read must not silently desynchronize the stream.
struct SizedPayload<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> Read for SizedPayload<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let max = self.remaining.min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shrank while being archived",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Writer that refuses all output once sealed.
struct SealOnError<W> {
    inner: W,
    sealed: Rc<Cell<bool>>,
}

impl<W: Write> Write for SealOnError<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.sealed.get() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "archive sealed"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
