//! Transfer session orchestration.
//!
//! A session owns one duplex pipe and the two halves that share it: the
//! tar codec on a blocking thread and the remote `tar` behind the exec
//! channel. Both halves are always awaited before the outcome is decided,
//! so nothing the session started outlives it.

use std::io;
use std::path::Path;

use podcopy_archive::paths::{Placement, local_base_name, trim_trailing_separator};
use podcopy_archive::{ArchiveError, ArchiveStats, decode_tree, encode_tree};
use podcopy_exec::{ContainerTarget, ExecChannel, ExecError, ExecFuture, ExecStdio, commands};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::PIPE_CAPACITY;
use crate::error::TransferError;
use crate::types::{Direction, SessionState, TransferOutcome, TransferRequest};

/// Copies a local tree into a container.
pub async fn transfer_to_remote(
    channel: &dyn ExecChannel,
    target: &ContainerTarget,
    local_source: &Path,
    remote_destination: &str,
    cancel: CancellationToken,
) -> TransferOutcome {
    TransferSession::new(channel, target, cancel)
        .run(TransferRequest::outbound(local_source, remote_destination))
        .await
}

/// Copies a container tree onto the local filesystem.
pub async fn transfer_from_remote(
    channel: &dyn ExecChannel,
    target: &ContainerTarget,
    remote_source: &str,
    local_destination: &Path,
    cancel: CancellationToken,
) -> TransferOutcome {
    TransferSession::new(channel, target, cancel)
        .run(TransferRequest::inbound(remote_source, local_destination))
        .await
}

/// One transfer attempt against one container.
///
/// Sessions are single-use: [`run`](Self::run) consumes the session, and a
/// failed transfer is retried by building a new one.
pub struct TransferSession<'a> {
    id: Uuid,
    channel: &'a dyn ExecChannel,
    target: &'a ContainerTarget,
    cancel: CancellationToken,
    state: SessionState,
}

impl<'a> TransferSession<'a> {
    pub fn new(
        channel: &'a dyn ExecChannel,
        target: &'a ContainerTarget,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel,
            target,
            cancel,
            state: SessionState::Idle,
        }
    }

    /// Identifier carried by every log line of this session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Runs the transfer to completion or first failure.
    pub async fn run(mut self, request: TransferRequest) -> TransferOutcome {
        let span = info_span!("transfer", session = %self.id, direction = %request.direction);
        self.execute(request).instrument(span).await
    }

    async fn execute(&mut self, request: TransferRequest) -> TransferOutcome {
        info!(
            container = %self.target,
            local = %request.local_path.display(),
            remote = %request.remote_path,
            "transfer started"
        );

        let result = if self.cancel.is_cancelled() {
            Err(TransferError::Cancelled)
        } else {
            match request.direction {
                Direction::Outbound => self.push(&request.local_path, &request.remote_path).await,
                Direction::Inbound => self.pull(&request.remote_path, &request.local_path).await,
            }
        };

        // Whatever broke after the caller cancelled is fallout of the cancel.
        let result = match result {
            Err(e) if self.cancel.is_cancelled() && !matches!(e, TransferError::Cancelled) => {
                debug!(error = %e, "error after cancellation");
                Err(TransferError::Cancelled)
            }
            other => other,
        };

        match result {
            Ok(stats) => {
                self.advance(SessionState::Completed);
                info!(entries = stats.entries, bytes = stats.bytes, "transfer completed");
                TransferOutcome::completed(self.id, request.direction, stats)
            }
            Err(e) => {
                self.advance(SessionState::Failed);
                error!(error = %e, "transfer failed");
                TransferOutcome::failed(self.id, request.direction, e)
            }
        }
    }

    async fn push(&mut self, local: &Path, remote: &str) -> Result<ArchiveStats, TransferError> {
        self.advance(SessionState::Negotiating);
        let source_base = source_base_name(local)?;
        let probe = commands::is_directory(trim_trailing_separator(remote));
        let destination_is_dir = self.probe(&probe).await?;
        let placement = Placement::outbound(remote, &source_base, destination_is_dir);
        info!(
            destination = %placement.path,
            destination_is_dir,
            "destination resolved"
        );

        self.advance(SessionState::Streaming);
        let streams = self.cancel.child_token();
        let (pipe_reader, pipe_writer) = tokio::io::duplex(PIPE_CAPACITY);

        let writer = SyncIoBridge::new(pipe_writer);
        let src = local.to_path_buf();
        let label = placement.label.clone();
        let codec_cancel = streams.clone();
        let span = Span::current();
        let codec = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            encode_tree(&src, &label, writer, &codec_cancel)
        });

        let command = commands::extract_into(&placement.parent);
        let remote = self.channel.stream(
            self.target,
            &command,
            ExecStdio::default().with_stdin(pipe_reader),
            streams.clone(),
        );
        settle(codec, remote, &streams).await
    }

    async fn pull(&mut self, remote: &str, local: &Path) -> Result<ArchiveStats, TransferError> {
        self.advance(SessionState::Negotiating);
        let placement = Placement::inbound(remote);
        debug!(parent = %placement.parent, label = %placement.label, "source resolved");

        self.advance(SessionState::Streaming);
        let streams = self.cancel.child_token();
        let (pipe_reader, pipe_writer) = tokio::io::duplex(PIPE_CAPACITY);

        let reader = SyncIoBridge::new(pipe_reader);
        let dest = local.to_path_buf();
        let label = placement.label.clone();
        let codec_cancel = streams.clone();
        let span = Span::current();
        let codec = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            decode_tree(reader, &label, &dest, &codec_cancel)
        });

        let command = commands::archive_from(&placement.parent, &placement.label);
        let remote = self.channel.stream(
            self.target,
            &command,
            ExecStdio::default().with_stdout(pipe_writer),
            streams.clone(),
        );
        settle(codec, remote, &streams).await
    }

    async fn probe(&self, command: &[String]) -> Result<bool, TransferError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransferError::Cancelled),
            result = self.channel.probe(self.target, command) => Ok(result?),
        }
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal session transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}

enum FirstDone {
    Codec(Result<ArchiveStats, TransferError>),
    Remote(Result<(), TransferError>),
}

/// Waits for both halves of a session and decides its result.
///
/// The half that fails first is the cause, unless its error only says the
/// pipe broke. A codec failure also stops the remote command, and a remote
/// failure stops the codec at its next entry.
async fn settle(
    mut codec: JoinHandle<Result<ArchiveStats, ArchiveError>>,
    mut remote: ExecFuture<'_, ()>,
    streams: &CancellationToken,
) -> Result<ArchiveStats, TransferError> {
    let first = tokio::select! {
        joined = &mut codec => FirstDone::Codec(flatten(joined)),
        finished = &mut remote => FirstDone::Remote(finished.map_err(TransferError::from)),
    };

    let (codec_result, remote_result, codec_first) = match first {
        FirstDone::Codec(codec_result) => {
            if let Err(e) = &codec_result {
                if !e.is_broken_pipe() {
                    debug!(error = %e, "codec failed, stopping remote command");
                    streams.cancel();
                }
            }
            let remote_result = remote.await.map_err(TransferError::from);
            (codec_result, remote_result, true)
        }
        FirstDone::Remote(remote_result) => {
            if remote_result.is_err() {
                streams.cancel();
            }
            (flatten(codec.await), remote_result, false)
        }
    };

    match (codec_result, remote_result) {
        (Ok(stats), Ok(())) => Ok(stats),
        (Err(e), Ok(())) | (Ok(_), Err(e)) => Err(e),
        (Err(codec_err), Err(remote_err)) => {
            let remote_was_stopped =
                matches!(remote_err, TransferError::Exec(ExecError::Cancelled));
            let codec_is_cause =
                !codec_err.is_broken_pipe() && (codec_first || remote_was_stopped);
            let (cause, other) = if codec_is_cause {
                (codec_err, remote_err)
            } else {
                (remote_err, codec_err)
            };
            warn!(error = %other, "other half of the session also failed");
            Err(cause)
        }
    }
}

fn flatten(
    joined: Result<Result<ArchiveStats, ArchiveError>, JoinError>,
) -> Result<ArchiveStats, TransferError> {
    match joined {
        Ok(result) => result.map_err(TransferError::from),
        Err(e) => Err(TransferError::Task(e.to_string())),
    }
}

fn source_base_name(local: &Path) -> Result<String, TransferError> {
    local_base_name(local).map_err(|e| match e.kind() {
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
            TransferError::InvalidPath(e.to_string())
        }
        _ => TransferError::Io(e),
    })
}
