use std::path::Path;

use backupkit_core::backup::{ExportOptions, Exporter, ImportOptions, Importer};
use backupkit_core::store::MemoryStore;
use backupkit_core::{
    BackupReader, BackupWriter, ComparableBackup, DiffOptions, StreamMode,
};
use eyre::WrapErr;

/// Imports `file` into a fresh [`MemoryStore`], exports it again and checks
/// that nothing changed. Returns whether the round trip was lossless.
pub fn run(file: &Path, output: Option<&Path>, mode: &StreamMode) -> eyre::Result<bool> {
    let original = super::load(file, mode)?;

    let mut store = MemoryStore::new();
    let reader = BackupReader::open(file, mode)?;
    let summary = Importer::new(&mut store, ImportOptions::default())
        .import(reader)
        .wrap_err("import failed")?;
    tracing::info!(
        frames = summary.stats.frames_read,
        expired = summary.stats.expired_items_skipped,
        "imported"
    );

    let exporter = Exporter::new(&store, ExportOptions::from_info(&summary.info));
    let (bytes, stats) = exporter
        .export(BackupWriter::new(Vec::new(), mode)?)
        .wrap_err("export failed")?;
    tracing::info!(frames = stats.frames_written, "exported");

    if let Some(output) = output {
        let mut frames = BackupWriter::create(output, mode)?.write_header(&exporter.header()?)?;
        exporter.write_frames(&mut frames)?;
        let path = frames.finalize_file()?;
        eprintln!("wrote {}", path.display());
    }

    let exported = ComparableBackup::from_bytes(&bytes, mode)?;
    let options = DiffOptions {
        left_label: file.display().to_string(),
        right_label: "re-export".to_string(),
        ..DiffOptions::default()
    };
    match original.diff(&exported, &options) {
        None => {
            println!("round trip preserved {} frames", stats.frames_written);
            Ok(true)
        }
        Some(diff) => {
            print!("{diff}");
            Ok(false)
        }
    }
}
