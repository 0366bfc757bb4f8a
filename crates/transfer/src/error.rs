use std::io;

use podcopy_archive::ArchiveError;
use podcopy_exec::ExecError;

/// Errors produced by a transfer session.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("remote error: {0}")]
    Exec(#[from] ExecError),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("codec task failed: {0}")]
    Task(String),

    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    /// True when the error only reports that the other end of the pipe
    /// went away, which makes it a symptom rather than a cause.
    pub fn is_broken_pipe(&self) -> bool {
        let io = match self {
            TransferError::Io(e) => e,
            TransferError::Archive(ArchiveError::Io(e)) => e,
            TransferError::Exec(ExecError::Io(e)) => e,
            _ => return false,
        };
        io.kind() == io::ErrorKind::BrokenPipe
    }
}
