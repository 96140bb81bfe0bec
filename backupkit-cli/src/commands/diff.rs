use std::path::Path;

use backupkit_core::{DiffOptions, StreamMode};

/// Diff options from the command line, keeping the default divider unless
/// one was given.
pub fn options(
    left_label: String,
    right_label: String,
    divider: Option<String>,
    context: usize,
) -> DiffOptions {
    let defaults = DiffOptions::default();
    DiffOptions {
        left_label,
        right_label,
        divider: divider.unwrap_or(defaults.divider),
        context,
    }
}

/// Prints the diff between two backups. Returns whether they are equivalent.
pub fn run(
    left: &Path,
    right: &Path,
    mode: &StreamMode,
    options: DiffOptions,
) -> eyre::Result<bool> {
    let left = super::load(left, mode)?;
    let right = super::load(right, mode)?;

    match left.diff(&right, &options) {
        None => {
            tracing::info!("backups are equivalent");
            Ok(true)
        }
        Some(diff) => {
            print!("{diff}");
            Ok(false)
        }
    }
}
