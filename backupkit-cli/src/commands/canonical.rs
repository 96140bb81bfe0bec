use std::path::Path;

use backupkit_core::StreamMode;

/// Prints the canonical JSON form of the backup at `file`.
pub fn run(file: &Path, mode: &StreamMode) -> eyre::Result<()> {
    let backup = super::load(file, mode)?;
    println!("{}", backup.canonical_json());
    Ok(())
}
