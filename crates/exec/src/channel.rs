//! The exec channel abstraction.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::error::ExecError;
use crate::target::ContainerTarget;

/// Boxed future returned by [`ExecChannel`] methods.
pub type ExecFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ExecError>> + Send + 'a>>;

/// Byte source fed to the remote process's stdin.
pub type StdinSource = Box<dyn AsyncRead + Send + Unpin>;

/// Byte sink receiving one of the remote process's output streams.
pub type OutputSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Local ends of a remote command's stdio.
///
/// Absent streams are not attached: no stdin means the remote sees EOF
/// immediately, no stdout means the output is discarded. Sinks are shut
/// down once the remote stream ends, which is how the local reader
/// learns the stream is complete.
#[derive(Default)]
pub struct ExecStdio {
    pub stdin: Option<StdinSource>,
    pub stdout: Option<OutputSink>,
    pub stderr: Option<OutputSink>,
}

impl ExecStdio {
    /// Feeds `reader` to the remote stdin.
    pub fn with_stdin(mut self, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.stdin = Some(Box::new(reader));
        self
    }

    /// Relays the remote stdout into `writer`.
    pub fn with_stdout(mut self, writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stdout = Some(Box::new(writer));
        self
    }

    /// Forwards remote stderr into `writer` in addition to logging it.
    pub fn with_stderr(mut self, writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        self.stderr = Some(Box::new(writer));
        self
    }
}

/// Runs commands inside a container.
///
/// Implementations must be safe to share between concurrent sessions; each
/// call starts an independent remote process.
pub trait ExecChannel: Send + Sync {
    /// Runs `command` without attached stdio and reports whether it exited
    /// successfully.
    ///
    /// A non-zero exit is `Ok(false)`; only a failure to run the command at
    /// all (or a timeout) is an error.
    fn probe<'a>(
        &'a self,
        target: &'a ContainerTarget,
        command: &'a [String],
    ) -> ExecFuture<'a, bool>;

    /// Runs `command` with `stdio` attached and returns once the remote
    /// process has exited and all of its output has been relayed.
    ///
    /// Cancelling `cancel` terminates the remote process and yields
    /// [`ExecError::Cancelled`].
    fn stream<'a>(
        &'a self,
        target: &'a ContainerTarget,
        command: &'a [String],
        stdio: ExecStdio,
        cancel: CancellationToken,
    ) -> ExecFuture<'a, ()>;
}
