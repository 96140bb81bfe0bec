//! backupkit command line interface.
//!
//! Reads backup files with the same codec an application would use and
//! prints what it finds. Encrypted files need `--backup-key` and
//! `--backup-id`.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use backupkit_core::{DerivedKeyProvider, StreamMode};
use clap::{Parser, Subcommand};
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;

/// Inspect, compare and round-trip backup files.
#[derive(Parser, Debug)]
#[command(name = "backupkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// 32-byte backup key (hex). Together with `--backup-id` selects encrypted mode.
    #[arg(long, env = "BACKUPKIT_BACKUP_KEY", global = true, hide_env_values = true)]
    pub backup_key: Option<String>,

    /// Backup id (hex) used to derive the per-backup keys.
    #[arg(long, env = "BACKUPKIT_BACKUP_ID", global = true)]
    pub backup_id: Option<String>,

    /// More output; repeat for trace level. `RUST_LOG` overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the header, frame counts per kind and integrity status
    Inspect {
        /// Backup file
        file: PathBuf,
    },

    /// Print the canonical JSON form
    Canonical {
        /// Backup file
        file: PathBuf,
    },

    /// Compare two backups; exits with status 1 when they differ
    Diff {
        /// Expected backup
        left: PathBuf,

        /// Actual backup
        right: PathBuf,

        /// Label for the left side
        #[arg(long, default_value = "expected")]
        left_label: String,

        /// Label for the right side
        #[arg(long, default_value = "actual")]
        right_label: String,

        /// Line printed between change blocks
        #[arg(long)]
        divider: Option<String>,

        /// Unchanged lines shown around each change
        #[arg(long, default_value_t = 3)]
        context: usize,
    },

    /// Import into memory, export again and compare with the input
    Roundtrip {
        /// Backup file
        file: PathBuf,

        /// Where to write the re-exported backup
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    fn stream_mode(&self) -> eyre::Result<StreamMode> {
        match (&self.backup_key, &self.backup_id) {
            (Some(key), Some(id)) => {
                let provider = DerivedKeyProvider::from_hex(key, id)
                    .wrap_err("invalid --backup-key or --backup-id")?;
                Ok(StreamMode::encrypted_from(&provider)?)
            }
            (None, None) => Ok(StreamMode::Plaintext),
            _ => eyre::bail!("--backup-key and --backup-id must be given together"),
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info,backupkit_core=debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> eyre::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mode = cli.stream_mode()?;
    tracing::debug!(encrypted = mode.is_encrypted(), "starting");

    let equivalent = match cli.command {
        Commands::Inspect { file } => commands::inspect::run(&file, &mode).map(|()| true),
        Commands::Canonical { file } => commands::canonical::run(&file, &mode).map(|()| true),
        Commands::Diff {
            left,
            right,
            left_label,
            right_label,
            divider,
            context,
        } => commands::diff::run(
            &left,
            &right,
            &mode,
            commands::diff::options(left_label, right_label, divider, context),
        ),
        Commands::Roundtrip { file, output } => {
            commands::roundtrip::run(&file, output.as_deref(), &mode)
        }
    }?;

    Ok(if equivalent {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_without_keys() {
        let cli = Cli::try_parse_from(["backupkit", "canonical", "a.backup"]).expect("parse");
        assert!(!cli.stream_mode().expect("mode").is_encrypted());
    }

    #[test]
    fn test_keys_select_encrypted_mode() {
        let key = "11".repeat(32);
        let cli = Cli::try_parse_from([
            "backupkit",
            "inspect",
            "a.backup",
            "--backup-key",
            key.as_str(),
            "--backup-id",
            "abcd",
        ])
        .expect("parse");
        assert!(cli.stream_mode().expect("mode").is_encrypted());
    }

    #[test]
    fn test_key_without_id_is_rejected() {
        let cli = Cli::try_parse_from([
            "backupkit",
            "inspect",
            "a.backup",
            "--backup-key",
            "00",
        ])
        .expect("parse");
        assert!(cli.stream_mode().is_err());
    }

    #[test]
    fn test_diff_defaults() {
        let cli = Cli::try_parse_from(["backupkit", "diff", "a", "b"]).expect("parse");
        let Commands::Diff {
            left_label,
            divider,
            context,
            ..
        } = cli.command
        else {
            panic!("expected diff");
        };
        assert_eq!(left_label, "expected");
        assert_eq!(divider, None);
        assert_eq!(context, 3);
    }
}
