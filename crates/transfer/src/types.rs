//! Requests, states and outcomes of a transfer session.

use std::fmt;
use std::path::PathBuf;

use podcopy_archive::ArchiveStats;
use serde::Serialize;
use uuid::Uuid;

use crate::error::TransferError;

/// Which way the bytes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local tree to container.
    Outbound,
    /// Container tree to local filesystem.
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
        })
    }
}

/// One transfer to run.
///
/// Paths are not checked up front; a missing path surfaces as an I/O error
/// from whichever side opens it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub direction: Direction,
    /// Tree to send (outbound) or destination root (inbound).
    pub local_path: PathBuf,
    /// Destination (outbound) or tree to fetch (inbound), inside the container.
    pub remote_path: String,
}

impl TransferRequest {
    pub fn outbound(local_source: impl Into<PathBuf>, remote_destination: impl Into<String>) -> Self {
        Self {
            direction: Direction::Outbound,
            local_path: local_source.into(),
            remote_path: remote_destination.into(),
        }
    }

    pub fn inbound(remote_source: impl Into<String>, local_destination: impl Into<PathBuf>) -> Self {
        Self {
            direction: Direction::Inbound,
            local_path: local_destination.into(),
            remote_path: remote_source.into(),
        }
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    /// Resolving the effective destination, possibly probing the remote.
    Negotiating,
    /// Codec and remote command running concurrently.
    Streaming,
    Completed,
    Failed,
}

impl SessionState {
    /// Whether a session in this state may move to `next`.
    ///
    /// Sessions only move forward; `Completed` and `Failed` are terminal.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Negotiating)
                | (Negotiating, Streaming)
                | (Streaming, Completed)
                | (Idle | Negotiating | Streaming, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

/// Terminal result of a session, produced exactly once.
#[derive(Debug)]
pub struct TransferOutcome {
    pub session_id: Uuid,
    pub direction: Direction,
    pub state: SessionState,
    pub success: bool,
    pub error: Option<TransferError>,
    /// Entries and payload bytes written by the local codec.
    pub stats: Option<ArchiveStats>,
}

impl TransferOutcome {
    pub(crate) fn completed(session_id: Uuid, direction: Direction, stats: ArchiveStats) -> Self {
        Self {
            session_id,
            direction,
            state: SessionState::Completed,
            success: true,
            error: None,
            stats: Some(stats),
        }
    }

    pub(crate) fn failed(session_id: Uuid, direction: Direction, error: TransferError) -> Self {
        Self {
            session_id,
            direction,
            state: SessionState::Failed,
            success: false,
            error: Some(error),
            stats: None,
        }
    }

    /// Converts into a plain `Result` for `?`-style callers.
    pub fn into_result(self) -> Result<ArchiveStats, TransferError> {
        match (self.error, self.stats) {
            (Some(e), _) => Err(e),
            (None, Some(stats)) => Ok(stats),
            (None, None) => Ok(ArchiveStats::default()),
        }
    }

    /// Serializable view of the outcome.
    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary {
            session_id: self.session_id.to_string(),
            direction: self.direction,
            success: self.success,
            error: self.error.as_ref().map(|e| e.to_string()),
            entries: self.stats.map(|s| s.entries),
            bytes: self.stats.map(|s| s.bytes),
        }
    }
}

/// What gets printed for `--json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSummary {
    pub session_id: String,
    pub direction: Direction,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}
