//! Resolution of archive entry names against the extraction root.
//!
//! Entry names are kept as paths end to end, so names that are not valid
//! UTF-8 travel byte for byte. Every name that reaches the filesystem goes
//! through [`strip_base_label`] first, which is also where entries that
//! would land outside the extraction root are turned away.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::ArchiveError;

/// Strips the leading archive `label` from an entry name and returns the
/// part that lands under the extraction root.
///
/// Leading `/` and `./` are ignored, as `tar` itself does. Returns
/// `Ok(None)` for the archive root itself. Names that do not start with
/// `label` are kept whole. A `..` step anywhere in the remainder, or a
/// drive prefix, fails the entry.
pub fn strip_base_label(name: &Path, label: &str) -> Result<Option<PathBuf>, ArchiveError> {
    if name.as_os_str().is_empty() {
        return Err(ArchiveError::InvalidEntry("entry with an empty name".into()));
    }

    let mut components = name
        .components()
        .skip_while(|c| matches!(c, Component::RootDir | Component::CurDir))
        .peekable();

    if components
        .peek()
        .is_some_and(|c| c.as_os_str() == OsStr::new(label))
    {
        components.next();
    }

    let mut tail = PathBuf::new();
    for component in components {
        match component {
            Component::Normal(part) => tail.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::InvalidEntry(format!(
                    "{} would land outside the destination",
                    name.display()
                )));
            }
        }
    }

    Ok((!tail.as_os_str().is_empty()).then_some(tail))
}

/// Whether a symlink stored at `tail` whose target is `link` resolves
/// somewhere under the extraction root.
///
/// Absolute targets never qualify. Each `..` in `link` climbs one level
/// from the directory holding the link; the walk may not go above the
/// root at any point.
pub fn link_stays_inside(tail: &Path, link: &Path) -> bool {
    if link.as_os_str().is_empty() {
        return false;
    }

    let start = tail.parent().map_or(0, |dir| {
        dir.components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count()
    });

    link.components()
        .try_fold(start, |depth, component| match component {
            Component::Normal(_) => Some(depth + 1),
            Component::CurDir => Some(depth),
            Component::ParentDir => depth.checked_sub(1),
            Component::RootDir | Component::Prefix(_) => None,
        })
        .is_some()
}
