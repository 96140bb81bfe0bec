//! Command implementations.

pub mod canonical;
pub mod diff;
pub mod inspect;
pub mod roundtrip;

use std::path::Path;

use backupkit_core::{ComparableBackup, StreamMode};
use eyre::WrapErr;

/// Reads and canonicalizes the backup at `path`.
pub fn load(path: &Path, mode: &StreamMode) -> eyre::Result<ComparableBackup> {
    ComparableBackup::from_path(path, mode)
        .wrap_err_with(|| format!("failed to read backup {}", path.display()))
}
