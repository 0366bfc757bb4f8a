//! Copy files between a local filesystem and a running container.
//!
//! A [`TransferSession`] runs the tar codec on a blocking thread and a
//! remote `tar` through an [`ExecChannel`](podcopy_exec::ExecChannel),
//! coupled by an in-process duplex pipe, and reconciles both halves into a
//! single [`TransferOutcome`].

mod error;
mod session;
mod types;

#[cfg(test)]
mod fake_container;

pub use error::TransferError;
pub use session::{TransferSession, transfer_from_remote, transfer_to_remote};
pub use types::{Direction, OutcomeSummary, SessionState, TransferOutcome, TransferRequest};

/// Capacity of the pipe between the codec and the exec channel (64 KiB).
///
/// Writers block once this much is buffered, so a session holds at most
/// this plus the codec's per-entry buffers in memory.
pub const PIPE_CAPACITY: usize = 64 * 1024;
