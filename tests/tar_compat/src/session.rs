//! Whole sessions through `KubectlExec`, with a shell script standing in
//! for kubectl and the system `tar` playing the container side.

use std::fs;
use std::path::{Path, PathBuf};

use podcopy_exec::{ContainerTarget, ExecError, KubectlConfig, KubectlExec};
use podcopy_transfer::{TransferError, transfer_from_remote, transfer_to_remote};
use tokio_util::sync::CancellationToken;

use crate::tests::system_tar;

/// Drops every argument up to `--` and runs the rest locally.
const SHIM: &str = r#"while [ "$#" -gt 0 ]; do
  if [ "$1" = "--" ]; then shift; break; fi
  shift
done
exec "$@"
"#;

/// Local directory acting as the container filesystem, plus a channel
/// whose remote commands run against it.
struct Container {
    dir: tempfile::TempDir,
    exec: KubectlExec,
}

impl Container {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("kubectl-shim.sh");
        fs::write(&script, SHIM).unwrap();
        // Run through `sh` so the script is never exec'd while still open.
        let exec = KubectlExec::new(KubectlConfig {
            program: PathBuf::from("sh"),
            program_args: vec![script.to_str().unwrap().to_string()],
            ..KubectlConfig::default()
        });
        fs::create_dir(dir.path().join("fs")).unwrap();
        Self { dir, exec }
    }

    fn root(&self) -> PathBuf {
        self.dir.path().join("fs")
    }

    fn remote(&self, rel: &str) -> String {
        self.root().join(rel).to_str().unwrap().to_string()
    }
}

fn target() -> ContainerTarget {
    ContainerTarget::new("default", "web-0", "")
}

/// Several payloads bigger than the session pipe, so both sides block on
/// each other along the way.
fn bulky_tree(root: &Path) -> PathBuf {
    let src = root.join("bulk");
    fs::create_dir_all(src.join("nested/empty")).unwrap();
    fs::write(src.join("a.txt"), b"hi").unwrap();
    for i in 0..3u8 {
        fs::write(
            src.join("nested").join(format!("blob{i}.bin")),
            vec![i; 300 * 1024],
        )
        .unwrap();
    }
    src
}

fn assert_bulky_tree(dest: &Path) {
    assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"hi");
    for i in 0..3u8 {
        assert_eq!(
            fs::read(dest.join("nested").join(format!("blob{i}.bin"))).unwrap(),
            vec![i; 300 * 1024]
        );
    }
    assert!(dest.join("nested/empty").is_dir());
}

#[tokio::test]
async fn push_into_existing_directory_with_system_tar() {
    if !system_tar() {
        return;
    }
    let container = Container::new();
    fs::create_dir(container.root().join("srv")).unwrap();
    let local = tempfile::tempdir().unwrap();
    let src = bulky_tree(local.path());

    let outcome = transfer_to_remote(
        &container.exec,
        &target(),
        &src,
        &container.remote("srv/"),
        CancellationToken::new(),
    )
    .await;

    assert!(outcome.success, "push failed: {:?}", outcome.error);
    assert_bulky_tree(&container.root().join("srv/bulk"));
    assert!(!container.root().join("srv/a.txt").exists());
}

#[tokio::test]
async fn pull_with_system_tar_strips_the_label() {
    if !system_tar() {
        return;
    }
    let container = Container::new();
    bulky_tree(&container.root());
    let local = tempfile::tempdir().unwrap();
    let dest = local.path().join("copy");

    let outcome = transfer_from_remote(
        &container.exec,
        &target(),
        &container.remote("bulk"),
        &dest,
        CancellationToken::new(),
    )
    .await;

    assert!(outcome.success, "pull failed: {:?}", outcome.error);
    assert_bulky_tree(&dest);
    assert!(!dest.join("bulk").exists());
    assert_eq!(outcome.stats.unwrap().bytes, 2 + 3 * 300 * 1024);
}

#[cfg(unix)]
#[tokio::test]
async fn pull_keeps_every_hard_linked_name() {
    if !system_tar() {
        return;
    }
    let container = Container::new();
    let data = container.root().join("data");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("one.txt"), b"shared").unwrap();
    fs::hard_link(data.join("one.txt"), data.join("two.txt")).unwrap();
    let local = tempfile::tempdir().unwrap();
    let dest = local.path().join("fetched");

    let outcome = transfer_from_remote(
        &container.exec,
        &target(),
        &container.remote("data"),
        &dest,
        CancellationToken::new(),
    )
    .await;

    assert!(outcome.success, "pull failed: {:?}", outcome.error);
    assert_eq!(fs::read(dest.join("one.txt")).unwrap(), b"shared");
    assert_eq!(fs::read(dest.join("two.txt")).unwrap(), b"shared");
    assert_eq!(outcome.stats.unwrap().entries, 2);
}

#[tokio::test]
async fn push_reports_remote_tar_failure() {
    if !system_tar() {
        return;
    }
    let container = Container::new();
    let local = tempfile::tempdir().unwrap();
    let src = bulky_tree(local.path());

    // The parent of the effective destination does not exist, so the
    // remote `tar -C` fails before reading much of the stream.
    let outcome = transfer_to_remote(
        &container.exec,
        &target(),
        &src,
        &container.remote("missing/parent/bulk"),
        CancellationToken::new(),
    )
    .await;

    assert!(!outcome.success);
    assert!(
        matches!(
            outcome.error,
            Some(TransferError::Exec(ExecError::RemoteExit { .. }))
        ),
        "unexpected error: {:?}",
        outcome.error
    );
}

#[tokio::test]
async fn pull_of_missing_source_fails() {
    if !system_tar() {
        return;
    }
    let container = Container::new();
    let local = tempfile::tempdir().unwrap();

    let outcome = transfer_from_remote(
        &container.exec,
        &target(),
        &container.remote("nothing-here"),
        &local.path().join("copy"),
        CancellationToken::new(),
    )
    .await;

    assert!(!outcome.success);
    assert!(
        matches!(
            outcome.error,
            Some(TransferError::Exec(ExecError::RemoteExit { .. }))
        ),
        "unexpected error: {:?}",
        outcome.error
    );
}
