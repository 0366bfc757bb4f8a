//! Naming rules for where a transferred tree lands.
//!
//! Remote paths are POSIX strings regardless of the local platform, so
//! they are handled as `&str` here rather than as [`std::path::Path`].
//!
//! Copying `/a/b` into an existing remote directory `/x` must produce
//! `/x/b/...`, never `/x/a/b/...` and never `b`'s children flattened into
//! `/x`. The archive is labelled with the base name of the effective
//! destination and extracted from that destination's parent.

use std::io;
use std::path::Path;

/// Trims trailing `/` from a remote path, leaving the root `/` untouched.
pub fn trim_trailing_separator(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Lexically cleans a remote path: collapses repeated separators, drops
/// `.` segments and resolves `..` against earlier segments.
pub fn clean_remote(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }

    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Last segment of a cleaned remote path (`/` for the root itself).
pub fn remote_base_name(path: &str) -> String {
    let cleaned = clean_remote(path);
    match cleaned.rsplit_once('/') {
        Some((_, "")) => "/".to_string(),
        Some((_, base)) => base.to_string(),
        None => cleaned,
    }
}

/// Parent of a cleaned remote path: `.` for a bare relative name, `/` for
/// a top-level path and for the root itself.
pub fn remote_parent(path: &str) -> String {
    let cleaned = clean_remote(path);
    match cleaned.rfind('/') {
        None => ".".to_string(),
        Some(0) => "/".to_string(),
        Some(i) => cleaned[..i].to_string(),
    }
}

/// Joins a child name onto a remote directory.
pub fn join_remote(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Base name of a local path, resolving `.` and `..` to the real
/// directory name.
pub fn local_base_name(path: &Path) -> io::Result<String> {
    let name = match path.file_name() {
        Some(name) => name.to_owned(),
        None => std::fs::canonicalize(path)?
            .file_name()
            .map(|n| n.to_owned())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} has no base name", path.display()),
                )
            })?,
    };

    name.into_string().map_err(|n| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("file name is not valid UTF-8: {}", n.to_string_lossy()),
        )
    })
}

/// Effective remote destination of an outbound tree.
///
/// When the destination already exists as a directory the source's base
/// name is appended; otherwise the destination is used as given, which
/// places (and possibly renames) the source as one unit.
pub fn effective_destination(
    destination: &str,
    source_base: &str,
    destination_is_dir: bool,
) -> String {
    let trimmed = trim_trailing_separator(destination);
    if destination_is_dir {
        join_remote(trimmed, source_base)
    } else {
        trimmed.to_string()
    }
}

/// Where an archive is rooted on the remote side.
///
/// `label` is the archive's internal root name and `parent` the directory
/// the remote `tar` runs in, so `parent/label` is `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub path: String,
    pub parent: String,
    pub label: String,
}

impl Placement {
    /// Placement of an outbound tree; see [`effective_destination`].
    pub fn outbound(destination: &str, source_base: &str, destination_is_dir: bool) -> Self {
        Self::at(effective_destination(
            destination,
            source_base,
            destination_is_dir,
        ))
    }

    /// Placement of an inbound tree rooted at `source`.
    pub fn inbound(source: &str) -> Self {
        Self::at(trim_trailing_separator(source).to_string())
    }

    fn at(path: String) -> Self {
        let base = remote_base_name(&path);
        let label = if base == "/" { ".".to_string() } else { base };
        Self {
            parent: remote_parent(&path),
            label,
            path,
        }
    }
}
