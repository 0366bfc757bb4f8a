//! Fixed remote commands used by container copies.
//!
//! The remote side only needs a POSIX `test` and a `tar` that reads and
//! writes ustar/GNU archives on stdio.

/// Succeeds when `path` exists and is a directory.
pub fn is_directory(path: &str) -> Vec<String> {
    vec!["test".into(), "-d".into(), path.into()]
}

/// Extracts an archive read from stdin into `dir`.
pub fn extract_into(dir: &str) -> Vec<String> {
    vec![
        "tar".into(),
        "-xf".into(),
        "-".into(),
        "-C".into(),
        dir.into(),
    ]
}

/// Writes an archive of `parent/label` to stdout, rooted at `label`.
pub fn archive_from(parent: &str, label: &str) -> Vec<String> {
    // A member name starting with `-` would be read as an option.
    let member = if label.starts_with('-') {
        format!("./{label}")
    } else {
        label.to_string()
    };
    vec![
        "tar".into(),
        "cf".into(),
        "-".into(),
        "-C".into(),
        parent.into(),
        member,
    ]
}
