use std::fs;
use std::sync::{Arc, Mutex};

use taskpilot_exec::{ExecCallback, ExecConfig, ExecEvent, FileMaterializer};
use taskpilot_plan::FileSpec;
use tempfile::TempDir;

fn config(dir: &TempDir) -> ExecConfig {
    ExecConfig::new(dir.path().to_path_buf())
}

#[tokio::test]
async fn test_writes_files_and_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let files = vec![
        FileSpec::new("hello.txt", "hi"),
        FileSpec::new("nested/deeper/notes.md", "# Notes\nline two\n"),
    ];

    FileMaterializer::new(&config)
        .materialize(&files)
        .await
        .unwrap();

    assert_eq!(fs::read_to_string(dir.path().join("hello.txt")).unwrap(), "hi");
    assert_eq!(
        fs::read_to_string(dir.path().join("nested/deeper/notes.md")).unwrap(),
        "# Notes\nline two\n"
    );
}

#[tokio::test]
async fn test_overwrites_existing_file() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    fs::write(dir.path().join("hello.txt"), "old content that is longer").unwrap();

    FileMaterializer::new(&config)
        .materialize(&[FileSpec::new("hello.txt", "new")])
        .await
        .unwrap();

    assert_eq!(fs::read_to_string(dir.path().join("hello.txt")).unwrap(), "new");
}

#[tokio::test]
async fn test_stops_at_first_failing_entry() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    // A regular file where a directory is needed makes entry 1 fail
    fs::write(dir.path().join("blocker"), "not a directory").unwrap();

    let files = vec![
        FileSpec::new("first.txt", "1"),
        FileSpec::new("blocker/second.txt", "2"),
        FileSpec::new("third.txt", "3"),
    ];

    let error = FileMaterializer::new(&config)
        .materialize(&files)
        .await
        .unwrap_err();

    assert_eq!(error.index, 1);
    assert_eq!(error.path, dir.path().join("blocker/second.txt"));
    assert!(error.to_string().contains("blocker"));
    assert_eq!(fs::read_to_string(dir.path().join("first.txt")).unwrap(), "1");
    assert!(!dir.path().join("third.txt").exists());
}

#[tokio::test]
async fn test_empty_file_list_is_success() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);

    FileMaterializer::new(&config).materialize(&[]).await.unwrap();

    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_reports_each_written_file() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let written = Arc::new(Mutex::new(Vec::new()));
    let sink = written.clone();
    let callback: ExecCallback = Arc::new(move |event| {
        if let ExecEvent::FileWritten { index, path, bytes } = event {
            sink.lock().unwrap().push((index, path.to_path_buf(), bytes));
        }
    });

    FileMaterializer::new(&config)
        .materialize_with_callback(
            &[FileSpec::new("a.txt", "abc"), FileSpec::new("b/c.txt", "")],
            Some(callback),
        )
        .await
        .unwrap();

    let written = written.lock().unwrap();
    assert_eq!(
        *written,
        vec![
            (0, dir.path().join("a.txt"), 3),
            (1, dir.path().join("b/c.txt"), 0),
        ]
    );
}
