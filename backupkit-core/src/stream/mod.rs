//! Backup streams: a header block followed by frame blocks, over the
//! integrity layer.

mod delimited;
pub mod format;
mod integrity;
mod reader;
mod writer;

pub use delimited::{write_block, Block, BlockReader};
pub use integrity::{
    verify_container, DecryptingReader, EncryptingWriter, Integrity, IntegrityReader,
    IntegrityWriter,
};
pub use reader::{BackupReader, FrameReader};
pub use writer::{BackupWriter, FrameWriter, PartialFile};

use crate::error::BackupResult;
use crate::keys::{BackupKeys, KeyMaterialProvider};

/// How the bytes of a stream are protected.
#[derive(Debug, Clone)]
pub enum StreamMode {
    /// No encryption and no tag.
    Plaintext,
    /// XChaCha20 encryption with a trailing HMAC-SHA256 tag.
    Encrypted(BackupKeys),
}

impl StreamMode {
    /// Encrypted mode with keys from `provider`.
    ///
    /// # Errors
    ///
    /// Returns whatever the provider returns.
    pub fn encrypted_from(provider: &dyn KeyMaterialProvider) -> BackupResult<Self> {
        Ok(Self::Encrypted(provider.backup_keys()?))
    }

    /// Whether the stream carries a tag.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(_))
    }
}
