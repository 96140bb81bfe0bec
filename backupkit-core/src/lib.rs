//! Streaming codec for messaging-app backups.
//!
//! A backup is a header block followed by frame blocks, each a length-prefixed
//! protobuf record. The byte stream is either plaintext or wrapped in an
//! encrypted container with a trailing HMAC-SHA256 tag.
//!
//! - [`proto`] and [`model`]: the record codec. Fields this version does not
//!   know about survive a decode/encode cycle.
//! - [`stream`]: [`BackupReader`]/[`FrameReader`] and
//!   [`BackupWriter`]/[`FrameWriter`] over the integrity layer.
//! - [`backup`]: import into and export from a [`store::BackupStore`].
//! - [`compare`]: canonical form of a backup and a line diff between two.
//!
//! ```rust
//! use backupkit_core::backup::{Exporter, ExportOptions, Importer, ImportOptions};
//! use backupkit_core::model::{Chat, Recipient};
//! use backupkit_core::store::MemoryStore;
//! use backupkit_core::stream::{BackupReader, BackupWriter, StreamMode};
//!
//! # fn main() -> backupkit_core::BackupResult<()> {
//! let mut source = MemoryStore::new();
//! let friend = source.seed(Recipient { id: 1, ..Recipient::default() });
//! source.seed(Chat { id: 1, recipient_id: friend.0, ..Chat::default() });
//!
//! let writer = BackupWriter::new(Vec::new(), &StreamMode::Plaintext)?;
//! let (bytes, _) = Exporter::new(&source, ExportOptions::at(1_700_000_000_000)).export(writer)?;
//!
//! let mut target = MemoryStore::new();
//! let reader = BackupReader::new(bytes.as_slice(), &StreamMode::Plaintext)?;
//! Importer::new(&mut target, ImportOptions::default()).import(reader)?;
//! assert_eq!(target.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod compare;
pub mod error;
pub mod keys;
pub mod logger;
pub mod model;
pub mod proto;
pub mod store;
pub mod stream;

pub use compare::{ComparableBackup, DiffOptions};
pub use error::{BackupError, BackupResult, ErrorCategory, HeaderError};
pub use keys::{derive_backup_keys, BackupKeys, DerivedKeyProvider, KeyMaterialProvider};
pub use stream::{BackupReader, BackupWriter, FrameReader, FrameWriter, Integrity, StreamMode};
