use std::collections::BTreeMap;
use std::path::Path;

use backupkit_core::model::BackupInfo;
use backupkit_core::store::EntityKind;
use backupkit_core::{Integrity, StreamMode};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Report<'a> {
    file: String,
    encrypted: bool,
    integrity: Integrity,
    header: &'a BackupInfo,
    frames: usize,
    per_kind: BTreeMap<EntityKind, u64>,
    unknown_fields: Vec<String>,
}

/// Prints a JSON summary of the backup at `file`.
pub fn run(file: &Path, mode: &StreamMode) -> eyre::Result<()> {
    let backup = super::load(file, mode)?;

    let mut per_kind = BTreeMap::new();
    for frame in backup.frames() {
        *per_kind.entry(EntityKind::from(frame.kind())).or_insert(0) += 1;
    }

    let report = Report {
        file: file.display().to_string(),
        encrypted: mode.is_encrypted(),
        integrity: backup.integrity(),
        header: backup.info(),
        frames: backup.frames().len(),
        per_kind,
        unknown_fields: backup.unknown_field_paths(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
