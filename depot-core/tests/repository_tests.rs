/*!
Integration tests for the disk repository, exercised through the
`Repository` trait object returned by `for_url`.
*/

use depot_core::{for_url, Checksum, ErrorKind, ListEntry, Repository, RepositoryError};
use rand::{Rng, RngCore};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

fn open_repository() -> (TempDir, Box<dyn Repository>) {
    let temp_dir = TempDir::new().unwrap();
    let url = format!("file://{}", temp_dir.path().join("repo").display());
    let repository = for_url(&url).unwrap();
    (temp_dir, repository)
}

fn random_payload(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

/// Relative path -> content for every file under `dir`
fn snapshot_tree(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(dir)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| !entry.file_type().is_dir())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(dir)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            (relative, fs::read(entry.path()).unwrap())
        })
        .collect()
}

fn sample_tree(root: &Path) {
    let mut rng = rand::thread_rng();
    for rel in [
        "params.json",
        "weights/layer-0.bin",
        "weights/layer-1.bin",
        "logs/2024/01/train.log",
    ] {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let len = rng.gen_range(0..32 * 1024);
        fs::write(path, random_payload(len)).unwrap();
    }
}

#[test]
fn test_put_then_get_returns_exact_bytes() {
    let (_temp_dir, repository) = open_repository();

    for (i, len) in [0usize, 1, 4096, 300_000].into_iter().enumerate() {
        let payload = random_payload(len);
        let path = format!("blobs/{i}/data.bin");
        repository.put(&path, &payload).unwrap();
        assert_eq!(repository.get(&path).unwrap(), payload);
    }
}

#[test]
fn test_put_directory_then_get_directory_round_trip() {
    let (temp_dir, repository) = open_repository();
    let source = temp_dir.path().join("source");
    let restored = temp_dir.path().join("restored");
    sample_tree(&source);

    repository.put_directory(&source, "experiments/abc").unwrap();
    repository.get_directory("experiments/abc", &restored).unwrap();

    assert_eq!(snapshot_tree(&source), snapshot_tree(&restored));
}

#[test]
fn test_put_directory_lists_files_under_destination() {
    let (temp_dir, repository) = open_repository();
    let source = temp_dir.path().join("source");
    sample_tree(&source);

    repository.put_directory(&source, "exp").unwrap();

    assert_eq!(repository.list("exp").unwrap(), vec!["exp/params.json"]);
    assert_eq!(
        repository.list("exp/weights").unwrap(),
        vec!["exp/weights/layer-0.bin", "exp/weights/layer-1.bin"]
    );
}

#[test]
fn test_put_directory_missing_source_is_write_error() {
    let (temp_dir, repository) = open_repository();
    let err = repository
        .put_directory(&temp_dir.path().join("absent"), "exp")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Write);
}

#[test]
fn test_put_directory_keeps_files_written_before_a_failure() {
    let (temp_dir, repository) = open_repository();
    let source = temp_dir.path().join("source");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("a.txt"), "a").unwrap();
    fs::write(source.join("b.txt"), "b").unwrap();
    // A directory where b.txt should go blocks that write
    repository.put("exp/b.txt/blocker", b"").unwrap();

    let err = repository.put_directory(&source, "exp").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Write);
    assert_eq!(repository.get("exp/a.txt").unwrap(), b"a");
}

#[test]
fn test_archive_round_trip_hides_folder_name() {
    let (temp_dir, repository) = open_repository();
    let source = temp_dir.path().join("source");
    let restored = temp_dir.path().join("restored");
    sample_tree(&source);

    repository.put_archive(&source, "a.tar.gz", None).unwrap();
    repository.get_archive("a.tar.gz", &restored).unwrap();

    assert_eq!(snapshot_tree(&source), snapshot_tree(&restored));
    assert!(!restored.join("a").exists());
}

#[test]
fn test_archive_in_nested_path_with_include_path() {
    let (temp_dir, repository) = open_repository();
    let source = temp_dir.path().join("source");
    let restored = temp_dir.path().join("restored");
    sample_tree(&source);

    repository
        .put_archive(&source, "runs/7/checkpoint.tar.gz", Some("weights"))
        .unwrap();

    assert_eq!(
        repository
            .list_archive_entries("runs/7/checkpoint.tar.gz")
            .unwrap(),
        vec!["weights/layer-0.bin", "weights/layer-1.bin"]
    );

    repository
        .get_archive("runs/7/checkpoint.tar.gz", &restored)
        .unwrap();
    assert_eq!(
        fs::read(restored.join("weights/layer-1.bin")).unwrap(),
        fs::read(source.join("weights/layer-1.bin")).unwrap()
    );
    assert!(!restored.join("params.json").exists());
}

#[test]
fn test_get_archive_entry_restores_one_file() {
    let (temp_dir, repository) = open_repository();
    let source = temp_dir.path().join("source");
    let restored = temp_dir.path().join("restored");
    sample_tree(&source);
    repository.put_archive(&source, "bundle.tar.gz", None).unwrap();

    repository
        .get_archive_entry("bundle.tar.gz", "logs/2024/01/train.log", &restored)
        .unwrap();

    assert_eq!(
        fs::read(restored.join("train.log")).unwrap(),
        fs::read(source.join("logs/2024/01/train.log")).unwrap()
    );
    assert_eq!(snapshot_tree(&restored).len(), 1);
}

#[test]
fn test_get_archive_entry_absent_entry_is_not_not_found() {
    let (temp_dir, repository) = open_repository();
    let source = temp_dir.path().join("source");
    sample_tree(&source);
    repository.put_archive(&source, "bundle.tar.gz", None).unwrap();

    let err = repository
        .get_archive_entry("bundle.tar.gz", "nope.txt", &temp_dir.path().join("out"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Read);
}

#[test]
fn test_get_archive_missing_is_not_found() {
    let (temp_dir, repository) = open_repository();
    let err = repository
        .get_archive("missing.tar.gz", &temp_dir.path().join("x"))
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
}

#[test]
fn test_put_archive_bad_suffix_creates_nothing() {
    let (temp_dir, repository) = open_repository();
    let source = temp_dir.path().join("source");
    sample_tree(&source);

    let err = repository.put_archive(&source, "bad.zip", None).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Write);
    assert!(!repository.exists("bad.zip").unwrap());
    assert!(repository.list("").unwrap().is_empty());
}

#[test]
fn test_list_recursive_missing_folder_is_empty() {
    let (_temp_dir, repository) = open_repository();
    assert_eq!(repository.list_recursive("does/not/exist").count(), 0);
    assert_eq!(
        repository
            .match_filenames_recursive("does/not/exist", "x.json")
            .count(),
        0
    );
}

#[test]
fn test_list_recursive_checksums_match_content() {
    let (temp_dir, repository) = open_repository();
    let source = temp_dir.path().join("source");
    sample_tree(&source);
    repository.put_directory(&source, "exp").unwrap();

    let entries: Vec<ListEntry> = repository
        .list_recursive("exp")
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(entries.len(), 4);
    for entry in &entries {
        let content = repository.get(&entry.path).unwrap();
        assert_eq!(entry.checksum, Some(Checksum::of_bytes(&content)));
    }
    let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "exp/logs/2024/01/train.log",
            "exp/params.json",
            "exp/weights/layer-0.bin",
            "exp/weights/layer-1.bin",
        ]
    );
}

#[test]
fn test_match_filenames_recursive() {
    let (_temp_dir, repository) = open_repository();
    repository.put("exp/1/meta.json", b"{}").unwrap();
    repository.put("exp/1/sub/meta.json", b"{}").unwrap();
    repository.put("exp/2/other.json", b"{}").unwrap();
    repository.put("elsewhere/meta.json", b"{}").unwrap();

    let found: Vec<String> = repository
        .match_filenames_recursive("exp", "meta.json")
        .map(|r| r.unwrap().path)
        .collect();

    assert_eq!(found, vec!["exp/1/meta.json", "exp/1/sub/meta.json"]);
}

#[test]
fn test_list_recursive_stream_can_move_to_another_thread() {
    let (_temp_dir, repository) = open_repository();
    repository.put("a/1.txt", b"1").unwrap();
    repository.put("a/2.txt", b"2").unwrap();

    let stream = repository.list_recursive("a");
    let count = std::thread::spawn(move || stream.count()).join().unwrap();

    assert_eq!(count, 2);
}

#[test]
fn test_list_never_includes_directories() {
    let (_temp_dir, repository) = open_repository();
    repository.put("dir/file.txt", b"x").unwrap();
    repository.put("dir/child/inner.txt", b"y").unwrap();

    let listed = repository.list("dir").unwrap();

    assert_eq!(listed, vec!["dir/file.txt"]);
    for path in listed {
        repository.get(&path).unwrap();
    }
}

#[test]
fn test_delete_is_idempotent() {
    let (_temp_dir, repository) = open_repository();
    repository.put("tmp/x.bin", b"x").unwrap();

    repository.delete("tmp/x.bin").unwrap();
    repository.delete("tmp/x.bin").unwrap();

    assert!(repository.get("tmp/x.bin").unwrap_err().is_not_found());
}
