//! Import, export and canonical comparison through files on disk.

mod common;

use backupkit_core::backup::{export_to_path, import_from_path, ExportOptions, ImportOptions};
use backupkit_core::model::Frame;
use backupkit_core::store::MemoryStore;
use backupkit_core::{BackupError, BackupReader, BackupWriter, ComparableBackup, StreamMode};

fn partial(path: &std::path::Path) -> std::path::PathBuf {
    let mut name = path.file_name().expect("file name").to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

#[test]
fn test_export_to_path_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("export.backup");
    let mode = common::encrypted_mode();

    let bytes = common::write_stream(&common::header(Some(3)), &common::scenario_frames(), &mode);
    let mut source = MemoryStore::new();
    backupkit_core::backup::Importer::new(&mut source, ImportOptions::default())
        .import(BackupReader::new(bytes.as_slice(), &mode).expect("reader"))
        .expect("import");

    let (written, stats) =
        export_to_path(&source, &path, &mode, ExportOptions::at(common::BACKUP_TIME_MS))
            .expect("export");
    assert_eq!(written, path);
    assert_eq!(stats.frames_written, 3);
    assert!(!partial(&path).exists());

    let mut target = MemoryStore::new();
    let summary =
        import_from_path(&mut target, &path, &mode, ImportOptions::default()).expect("import");
    assert_eq!(summary.stats.frames_read, 3);
    assert_eq!(target.len(), source.len());

    let original = ComparableBackup::from_bytes(&bytes, &mode).expect("original");
    let exported = ComparableBackup::from_path(&path, &mode).expect("exported");
    assert!(original.is_equivalent(&exported));
}

#[test]
fn test_abandoned_writer_leaves_no_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("abandoned.backup");

    {
        let mut frames = BackupWriter::create(&path, &common::encrypted_mode())
            .expect("create")
            .write_header(&common::header(None))
            .expect("header");
        frames.write_frame(&Frame::default()).expect("frame");
        assert!(partial(&path).exists());
    }

    assert!(!partial(&path).exists());
    assert!(!path.exists());
}

#[test]
fn test_failed_export_leaves_no_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("dangling.backup");

    let mut store = MemoryStore::new();
    store.seed(backupkit_core::model::Chat {
        id: 1,
        recipient_id: 9,
        ..Default::default()
    });

    let err = export_to_path(
        &store,
        &path,
        &StreamMode::Plaintext,
        ExportOptions::at(common::BACKUP_TIME_MS),
    )
    .expect_err("dangling");
    assert!(matches!(err, BackupError::DanglingReference { id: 9, .. }), "{err}");
    assert!(!path.exists());
    assert!(!partial(&path).exists());
}

#[test]
fn test_finalize_replaces_existing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("replace.backup");
    std::fs::write(&path, b"old contents").expect("seed file");

    let frames = BackupWriter::create(&path, &StreamMode::Plaintext)
        .expect("create")
        .write_header(&common::header(Some(0)))
        .expect("header");
    // The old file stays readable until the new one is complete.
    assert_eq!(std::fs::read(&path).expect("read"), b"old contents");
    frames.finalize_file().expect("finalize");

    let backup = ComparableBackup::from_path(&path, &StreamMode::Plaintext).expect("read");
    assert!(backup.frames().is_empty());
}

#[test]
fn test_missing_file_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("missing.backup");

    let err = BackupReader::open(&path, &StreamMode::Plaintext)
        .err()
        .expect("missing");
    assert!(matches!(err, BackupError::FileNotFound { .. }), "{err}");
    assert!(err.is_retryable());
}
