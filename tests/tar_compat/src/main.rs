fn main() {
    println!("Run `cargo test -p tar-compat` to execute tar compatibility tests.");
}

#[cfg(all(test, unix))]
mod session;

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::process::Command;

    use podcopy_archive::{EntryKind, decode_tree, encode_tree, list_entries};
    use tokio_util::sync::CancellationToken;

    /// Returns `false` (and says so) when no `tar` program is available.
    pub(crate) fn system_tar() -> bool {
        if Command::new("tar").arg("--help").output().is_ok() {
            true
        } else {
            eprintln!("SKIP: no tar on PATH");
            false
        }
    }

    fn long_dir_name() -> String {
        "d".repeat(120)
    }

    /// A tree exercising files, nesting, an empty directory and a name
    /// longer than the 100-byte ustar field.
    fn sample_tree(root: &Path) -> PathBuf {
        let src = root.join("payload");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::create_dir_all(src.join("empty")).unwrap();
        fs::create_dir_all(src.join(long_dir_name())).unwrap();
        fs::write(src.join("a.txt"), b"hi").unwrap();
        fs::write(src.join("sub").join("b.bin"), vec![0xA5u8; 70_000]).unwrap();
        fs::write(src.join(long_dir_name()).join("leaf.txt"), b"deep").unwrap();
        src
    }

    fn assert_sample_tree(dest: &Path) {
        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"hi");
        assert_eq!(
            fs::read(dest.join("sub").join("b.bin")).unwrap(),
            vec![0xA5u8; 70_000]
        );
        assert_eq!(
            fs::read(dest.join(long_dir_name()).join("leaf.txt")).unwrap(),
            b"deep"
        );
        assert!(dest.join("empty").is_dir());
        assert_eq!(fs::read_dir(dest.join("empty")).unwrap().count(), 0);
    }

    fn run_tar(args: &[&str]) -> Vec<u8> {
        let output = Command::new("tar").args(args).output().unwrap();
        assert!(
            output.status.success(),
            "tar {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        output.stdout
    }

    #[test]
    fn codec_archive_extracts_with_system_tar() {
        if !system_tar() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let src = sample_tree(tmp.path());
        let archive_path = tmp.path().join("out.tar");
        let file = fs::File::create(&archive_path).unwrap();
        encode_tree(&src, "landed", file, &CancellationToken::new()).unwrap();

        let extract_dir = tmp.path().join("extract");
        fs::create_dir(&extract_dir).unwrap();
        run_tar(&[
            "-xf",
            archive_path.to_str().unwrap(),
            "-C",
            extract_dir.to_str().unwrap(),
        ]);

        assert_sample_tree(&extract_dir.join("landed"));
    }

    #[test]
    fn system_tar_lists_codec_entry_names() {
        if !system_tar() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("empty")).unwrap();
        fs::write(src.join("a.txt"), b"hi").unwrap();

        let mut archive = Vec::new();
        encode_tree(&src, "destination", &mut archive, &CancellationToken::new()).unwrap();
        let archive_path = tmp.path().join("list.tar");
        fs::write(&archive_path, &archive).unwrap();

        let listing = run_tar(&["-tf", archive_path.to_str().unwrap()]);
        let names: Vec<String> = String::from_utf8(listing)
            .unwrap()
            .lines()
            .map(|l| l.trim_end_matches('/').to_string())
            .collect();
        assert_eq!(names, vec!["destination/a.txt", "destination/empty"]);
    }

    #[test]
    fn system_tar_archive_decodes() {
        if !system_tar() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let src = sample_tree(tmp.path());
        let parent = src.parent().unwrap().to_str().unwrap().to_string();

        let archive = run_tar(&["cf", "-", "-C", &parent, "payload"]);
        let entries = list_entries(archive.as_slice()).unwrap();
        assert!(entries.iter().any(|e| e.kind == EntryKind::Directory));

        let dest = tmp.path().join("fetched");
        let stats =
            decode_tree(archive.as_slice(), "payload", &dest, &CancellationToken::new()).unwrap();

        assert_sample_tree(&dest);
        assert!(!dest.join("payload").exists());
        assert_eq!(stats.bytes, 2 + 70_000 + 4);
    }

    #[test]
    fn system_tar_dot_archive_decodes_with_dot_label() {
        if !system_tar() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let src = sample_tree(tmp.path());

        let archive = run_tar(&["cf", "-", "-C", src.to_str().unwrap(), "."]);
        let dest = tmp.path().join("root-copy");
        decode_tree(archive.as_slice(), ".", &dest, &CancellationToken::new()).unwrap();

        assert_sample_tree(&dest);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_survive_both_directions() {
        if !system_tar() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("linked");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.txt"), b"hi").unwrap();
        std::os::unix::fs::symlink("a.txt", src.join("alias")).unwrap();

        let mut archive = Vec::new();
        encode_tree(&src, "linked", &mut archive, &CancellationToken::new()).unwrap();
        let archive_path = tmp.path().join("links.tar");
        fs::write(&archive_path, &archive).unwrap();
        let extract_dir = tmp.path().join("extract");
        fs::create_dir(&extract_dir).unwrap();
        run_tar(&[
            "-xf",
            archive_path.to_str().unwrap(),
            "-C",
            extract_dir.to_str().unwrap(),
        ]);
        let extracted = extract_dir.join("linked").join("alias");
        assert_eq!(fs::read_link(&extracted).unwrap(), PathBuf::from("a.txt"));

        let parent = tmp.path().to_str().unwrap().to_string();
        let from_tar = run_tar(&["cf", "-", "-C", &parent, "linked"]);
        let dest = tmp.path().join("decoded");
        decode_tree(from_tar.as_slice(), "linked", &dest, &CancellationToken::new()).unwrap();
        assert_eq!(fs::read_link(dest.join("alias")).unwrap(), PathBuf::from("a.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn hard_linked_files_from_system_tar_both_decode() {
        if !system_tar() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("pair");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("one.txt"), b"shared").unwrap();
        fs::hard_link(src.join("one.txt"), src.join("two.txt")).unwrap();

        let parent = tmp.path().to_str().unwrap().to_string();
        let archive = run_tar(&["cf", "-", "-C", &parent, "pair"]);
        let entries = list_entries(archive.as_slice()).unwrap();
        assert!(entries.iter().any(|e| e.kind == EntryKind::HardLink));

        let dest = tmp.path().join("decoded");
        let stats =
            decode_tree(archive.as_slice(), "pair", &dest, &CancellationToken::new()).unwrap();

        assert_eq!(fs::read(dest.join("one.txt")).unwrap(), b"shared");
        assert_eq!(fs::read(dest.join("two.txt")).unwrap(), b"shared");
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.bytes, 6);
    }
}
