//! [`ExecChannel`] backed by the `kubectl exec` command.
//!
//! Each call spawns one `kubectl` child process whose stdio is relayed to
//! the caller's streams. Cluster access (kubeconfig, context, credentials)
//! is entirely kubectl's business.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{ExecChannel, ExecFuture, ExecStdio, OutputSink};
use crate::error::ExecError;
use crate::target::ContainerTarget;
use crate::{PROBE_TIMEOUT, STDERR_TAIL_BYTES};

/// How to invoke kubectl.
#[derive(Debug, Clone)]
pub struct KubectlConfig {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments placed before everything else, e.g. `["kubectl"]` when
    /// `program` is a distribution wrapper such as `k3s` or `microk8s`.
    pub program_args: Vec<String>,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    /// Passed as `--request-timeout`; bounds API calls, not the stream.
    pub request_timeout: Option<Duration>,
    pub probe_timeout: Duration,
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("kubectl"),
            program_args: Vec::new(),
            kubeconfig: None,
            context: None,
            request_timeout: None,
            probe_timeout: PROBE_TIMEOUT,
        }
    }
}

/// Runs remote commands through `kubectl exec`.
#[derive(Debug, Clone, Default)]
pub struct KubectlExec {
    config: KubectlConfig,
}

impl KubectlExec {
    pub fn new(config: KubectlConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KubectlConfig {
        &self.config
    }

    /// Full argument list for one exec of `command` in `target`.
    pub fn build_args(
        &self,
        target: &ContainerTarget,
        command: &[String],
        interactive: bool,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.config.program_args.iter().map(OsString::from).collect();

        if let Some(kubeconfig) = &self.config.kubeconfig {
            args.push("--kubeconfig".into());
            args.push(kubeconfig.into());
        }
        if let Some(context) = &self.config.context {
            args.push("--context".into());
            args.push(context.into());
        }
        if let Some(timeout) = self.config.request_timeout {
            args.push(request_timeout_arg(timeout).into());
        }

        args.push("exec".into());
        if interactive {
            args.push("-i".into());
        }
        args.push("-n".into());
        args.push((&target.namespace).into());
        args.push((&target.pod_name).into());
        if !target.container_name.is_empty() {
            args.push("-c".into());
            args.push((&target.container_name).into());
        }
        args.push("--".into());
        args.extend(command.iter().map(OsString::from));
        args
    }

    fn spawn(&self, mut cmd: Command) -> Result<Child, ExecError> {
        cmd.kill_on_drop(true).spawn().map_err(|source| ExecError::Spawn {
            program: self.config.program.display().to_string(),
            source,
        })
    }

    fn command(&self, target: &ContainerTarget, command: &[String], interactive: bool) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.build_args(target, command, interactive));
        cmd
    }

    async fn run_probe(
        &self,
        target: &ContainerTarget,
        command: &[String],
    ) -> Result<bool, ExecError> {
        let mut cmd = self.command(target, command, false);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let child = self.spawn(cmd)?;

        // Dropping the child on timeout kills it.
        let output = tokio::time::timeout(self.config.probe_timeout, child.wait_with_output())
            .await
            .map_err(|_| ExecError::Timeout)??;

        if output.status.success() {
            return Ok(true);
        }

        debug!(
            container = %target,
            command = ?command,
            code = ?output.status.code(),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "probe returned non-zero"
        );
        Ok(false)
    }

    async fn run_stream(
        &self,
        target: &ContainerTarget,
        command: &[String],
        stdio: ExecStdio,
        cancel: CancellationToken,
    ) -> Result<(), ExecError> {
        let interactive = stdio.stdin.is_some();
        let mut cmd = self.command(target, command, interactive);
        cmd.stdin(if interactive {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(if stdio.stdout.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stderr(Stdio::piped());

        let mut child = self.spawn(cmd)?;
        info!(container = %target, command = ?command, "remote command started");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = relay(&mut child, stdio) => Some(result),
        };

        match outcome {
            Some(result) => result,
            None => {
                warn!(container = %target, command = ?command, "remote command cancelled, terminating");
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "kill after cancel failed");
                }
                Err(ExecError::Cancelled)
            }
        }
    }
}

/// kubectl takes whole seconds and reads `0s` as "no timeout", so a
/// fractional timeout is rounded up rather than truncated.
fn request_timeout_arg(timeout: Duration) -> String {
    let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    format!("--request-timeout={secs}s")
}

impl ExecChannel for KubectlExec {
    fn probe<'a>(
        &'a self,
        target: &'a ContainerTarget,
        command: &'a [String],
    ) -> ExecFuture<'a, bool> {
        Box::pin(self.run_probe(target, command))
    }

    fn stream<'a>(
        &'a self,
        target: &'a ContainerTarget,
        command: &'a [String],
        stdio: ExecStdio,
        cancel: CancellationToken,
    ) -> ExecFuture<'a, ()> {
        Box::pin(self.run_stream(target, command, stdio, cancel))
    }
}

/// Pumps stdio until the child has exited and every stream is drained.
async fn relay(child: &mut Child, stdio: ExecStdio) -> Result<(), ExecError> {
    let ExecStdio {
        stdin,
        stdout,
        stderr,
    } = stdio;
    let child_stdin = child.stdin.take();
    let child_stdout = child.stdout.take();
    let child_stderr = child.stderr.take();

    let feed = async move {
        match (stdin, child_stdin) {
            (Some(mut src), Some(mut dst)) => {
                let n = tokio::io::copy(&mut src, &mut dst).await?;
                dst.shutdown().await?;
                Ok::<u64, io::Error>(n)
            }
            _ => Ok(0),
        }
    };

    let drain = async move {
        match (stdout, child_stdout) {
            (Some(mut dst), Some(mut src)) => {
                let n = tokio::io::copy(&mut src, &mut dst).await?;
                dst.shutdown().await?;
                Ok::<u64, io::Error>(n)
            }
            _ => Ok(0),
        }
    };

    let (fed, drained, stderr_tail) = tokio::join!(feed, drain, collect_stderr(child_stderr, stderr));
    let status = child.wait().await?;

    info!(
        code = ?status.code(),
        bytes_in = ?fed.as_ref().ok(),
        bytes_out = ?drained.as_ref().ok(),
        "remote command finished"
    );

    if !status.success() {
        return Err(ExecError::RemoteExit {
            code: status.code(),
            stderr: stderr_tail,
        });
    }

    match fed {
        // The remote exited cleanly without reading everything we had.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("remote closed stdin early");
        }
        Err(e) => return Err(e.into()),
        Ok(_) => {}
    }
    drained?;
    Ok(())
}

/// Logs remote stderr line by line, forwards it to `sink` and returns the
/// last [`STDERR_TAIL_BYTES`] of it.
async fn collect_stderr(stderr: Option<ChildStderr>, mut sink: Option<OutputSink>) -> String {
    let Some(stderr) = stderr else {
        return String::new();
    };

    let mut reader = BufReader::new(stderr);
    let mut tail: Vec<u8> = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                warn!(line = %String::from_utf8_lossy(&line).trim_end(), "remote stderr");

                let failed = match sink.as_mut() {
                    Some(s) => s.write_all(&line).await.is_err(),
                    None => false,
                };
                if failed {
                    debug!("stderr sink closed, no longer forwarding");
                    sink = None;
                }

                tail.extend_from_slice(&line);
                if tail.len() > STDERR_TAIL_BYTES {
                    let excess = tail.len() - STDERR_TAIL_BYTES;
                    tail.drain(..excess);
                }
            }
            Err(e) => {
                debug!(error = %e, "reading remote stderr failed");
                break;
            }
        }
    }

    if let Some(mut s) = sink {
        let _ = s.shutdown().await;
    }
    String::from_utf8_lossy(&tail).trim().to_string()
}
