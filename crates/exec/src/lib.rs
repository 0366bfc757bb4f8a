//! Remote exec channel for container copies.
//!
//! Runs a command inside a named container and relays raw bytes between
//! local streams and the remote process's stdio, the same primitive an
//! interactive `kubectl exec` session uses. Callers program against the
//! [`ExecChannel`] trait; [`KubectlExec`] is the stock implementation.

pub mod channel;
pub mod commands;
pub mod error;
pub mod kubectl;
pub mod target;

pub use channel::{ExecChannel, ExecFuture, ExecStdio, OutputSink, StdinSource};
pub use error::ExecError;
pub use kubectl::{KubectlConfig, KubectlExec};
pub use target::ContainerTarget;

use std::time::Duration;

/// Default upper bound for a probe command.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// How much of the remote stderr is kept for error reports.
pub const STDERR_TAIL_BYTES: usize = 4 * 1024;
