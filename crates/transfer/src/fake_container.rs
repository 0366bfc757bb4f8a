//! A container stand-in whose filesystem is a temp directory.
//!
//! Understands the three commands sessions send (`test -d`, `tar -x` and
//! `tar c`) and can be told to fail every stream or to hang until
//! cancelled.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use podcopy_exec::{ContainerTarget, ExecChannel, ExecError, ExecFuture, ExecStdio};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

enum Behavior {
    Normal,
    Fail { code: i32, stderr: String },
    Hang,
}

pub(crate) struct FakeContainer {
    root: tempfile::TempDir,
    behavior: Behavior,
    streams: AtomicUsize,
}

impl FakeContainer {
    pub(crate) fn new() -> Self {
        Self::with(Behavior::Normal)
    }

    /// Every stream exits immediately with `code`.
    pub(crate) fn failing(code: i32, stderr: &str) -> Self {
        Self::with(Behavior::Fail {
            code,
            stderr: stderr.to_string(),
        })
    }

    /// Streams never touch their stdio and only return once cancelled.
    pub(crate) fn hanging() -> Self {
        Self::with(Behavior::Hang)
    }

    fn with(behavior: Behavior) -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            behavior,
            streams: AtomicUsize::new(0),
        }
    }

    /// Host path of a path inside the container.
    pub(crate) fn path(&self, remote: &str) -> PathBuf {
        self.root.path().join(remote.trim_start_matches('/'))
    }

    pub(crate) fn mkdir(&self, remote: &str) {
        fs::create_dir_all(self.path(remote)).unwrap();
    }

    pub(crate) fn write(&self, remote: &str, content: &[u8]) {
        let path = self.path(remote);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub(crate) fn stream_calls(&self) -> usize {
        self.streams.load(Ordering::SeqCst)
    }

    async fn extract(&self, dir: &str, stdio: ExecStdio) -> Result<(), ExecError> {
        let Some(mut stdin) = stdio.stdin else {
            return Err(tar_failed(io::Error::other("no archive on stdin")));
        };
        let mut archive = Vec::new();
        stdin.read_to_end(&mut archive).await?;
        tar::Archive::new(archive.as_slice())
            .unpack(self.path(dir))
            .map_err(tar_failed)
    }

    async fn create(&self, parent: &str, member: &str, stdio: ExecStdio) -> Result<(), ExecError> {
        let source = self.path(parent).join(member);
        let archive = {
            let mut builder = tar::Builder::new(Vec::new());
            if source.is_dir() {
                builder.append_dir_all(member, &source).map_err(tar_failed)?;
            } else {
                builder
                    .append_path_with_name(&source, member)
                    .map_err(tar_failed)?;
            }
            builder.into_inner()?
        };

        if let Some(mut stdout) = stdio.stdout {
            stdout.write_all(&archive).await?;
            stdout.shutdown().await?;
        }
        Ok(())
    }
}

fn tar_failed(e: io::Error) -> ExecError {
    ExecError::RemoteExit {
        code: Some(2),
        stderr: format!("tar: {e}"),
    }
}

impl ExecChannel for FakeContainer {
    fn probe<'a>(
        &'a self,
        _target: &'a ContainerTarget,
        command: &'a [String],
    ) -> ExecFuture<'a, bool> {
        Box::pin(async move {
            match command {
                [test, flag, path] if test == "test" && flag == "-d" => Ok(self.path(path).is_dir()),
                _ => Ok(false),
            }
        })
    }

    fn stream<'a>(
        &'a self,
        _target: &'a ContainerTarget,
        command: &'a [String],
        stdio: ExecStdio,
        cancel: CancellationToken,
    ) -> ExecFuture<'a, ()> {
        Box::pin(async move {
            self.streams.fetch_add(1, Ordering::SeqCst);

            match &self.behavior {
                Behavior::Normal => {}
                Behavior::Fail { code, stderr } => {
                    return Err(ExecError::RemoteExit {
                        code: Some(*code),
                        stderr: stderr.clone(),
                    });
                }
                Behavior::Hang => {
                    let _held = stdio;
                    cancel.cancelled().await;
                    return Err(ExecError::Cancelled);
                }
            }

            let args: Vec<&str> = command.iter().map(String::as_str).collect();
            match args.as_slice() {
                ["tar", "-xf", "-", "-C", dir] => self.extract(dir, stdio).await,
                ["tar", "cf", "-", "-C", parent, member] => self.create(parent, member, stdio).await,
                _ => Err(ExecError::RemoteExit {
                    code: Some(127),
                    stderr: format!("{}: not found", args.first().unwrap_or(&"")),
                }),
            }
        })
    }
}
