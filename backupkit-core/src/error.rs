//! Error types for the backup codec.
//!
//! Errors fall into four runtime categories (see [`ErrorCategory`]): resource
//! failures, structural decode failures, integrity failures and semantic
//! import failures. Comparison mismatches are not errors; they are reported
//! by [`crate::compare`] as diffs.

use std::path::PathBuf;

use thiserror::Error;

use crate::proto::DecodeError;
use crate::store::EntityKind;

/// Result type alias for backup operations.
pub type BackupResult<T> = Result<T, BackupError>;

/// Coarse classification of a [`BackupError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The source or destination could not be reached or opened.
    Resource,
    /// The bytes do not form a valid container, block or frame.
    Structural,
    /// The authentication tag did not verify.
    Integrity,
    /// The frames are well-formed but do not describe a consistent backup.
    Semantic,
}

/// Errors raised while reading the leading header block.
#[derive(Debug, Error)]
pub enum HeaderError {
    /// The header block's length prefix is missing or malformed.
    #[error("invalid byte length delimiter for backup header: {reason}")]
    InvalidByteLengthDelimiter {
        /// What was wrong with the delimiter.
        reason: String,
    },

    /// The header block could not be decoded as a `BackupInfo`.
    #[error("failed to deserialize backup header: {0}")]
    ProtoDeserializationError(#[source] DecodeError),
}

/// Errors that can occur while reading, writing, importing or exporting a backup.
#[derive(Debug, Error)]
pub enum BackupError {
    /// The backup file does not exist.
    #[error("backup file not found: {}", path.display())]
    FileNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The underlying resource exists but could not be opened.
    #[error("unable to open stream {context}: {source}")]
    UnableToOpenStream {
        /// Description of the resource.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation failed after the stream was opened.
    #[error("I/O error during {context}: {source}")]
    Io {
        /// Context describing the operation.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The header block could not be read.
    #[error(transparent)]
    Header(#[from] HeaderError),

    /// A frame block's length prefix is missing or malformed.
    #[error("invalid byte length delimiter at block {block} (offset {offset}): {reason}")]
    InvalidByteLengthDelimiter {
        /// Zero-based block index (the header is block 0).
        block: u64,
        /// Plaintext byte offset of the delimiter.
        offset: u64,
        /// What was wrong with the delimiter.
        reason: String,
    },

    /// The stream ended inside a block payload.
    #[error(
        "truncated block {block} at offset {offset}: expected {expected} bytes, found {available}"
    )]
    TruncatedBlock {
        /// Zero-based block index.
        block: u64,
        /// Plaintext byte offset of the payload.
        offset: u64,
        /// Declared payload length.
        expected: u64,
        /// Bytes actually available.
        available: u64,
    },

    /// A frame block's payload is not a valid frame.
    #[error("malformed frame at block {block} (offset {offset}): {source}")]
    MalformedFrame {
        /// Zero-based block index.
        block: u64,
        /// Plaintext byte offset of the payload.
        offset: u64,
        /// The wire-level decode failure.
        #[source]
        source: DecodeError,
    },

    /// The encrypted container does not start with the expected magic bytes.
    #[error("invalid container magic: found {}", hex::encode(found))]
    InvalidMagic {
        /// Bytes found where the magic was expected.
        found: Vec<u8>,
    },

    /// The encrypted container is too short to hold magic, nonce and tag.
    #[error("encrypted container truncated: {len} bytes is shorter than the minimum {minimum}")]
    TruncatedContainer {
        /// Observed container length.
        len: u64,
        /// Minimum container length.
        minimum: u64,
    },

    /// The header declares a format version this codec cannot read.
    #[error("unsupported backup format version {found} (supported up to {supported})")]
    UnsupportedVersion {
        /// Version found in the header.
        found: u64,
        /// Newest supported version.
        supported: u64,
    },

    /// The trailing authentication tag did not match the ciphertext.
    #[error("HMAC validation failed: backup is corrupted or was tampered with")]
    HmacValidationFailed,

    /// Key material was unusable.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The header lacks a field the importer needs.
    #[error("backup header is missing required field `{field}`")]
    MissingHeaderField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A frame references an id that has not been imported.
    #[error("{referrer} references unknown {kind} id {id}")]
    UnknownReference {
        /// Kind of the referring entity.
        referrer: EntityKind,
        /// Kind of the referenced entity.
        kind: EntityKind,
        /// Referenced id.
        id: u64,
    },

    /// An entity references an id that has not been exported before it.
    #[error("{referrer} references {kind} id {id} which was not exported before it")]
    DanglingReference {
        /// Kind of the referring entity.
        referrer: EntityKind,
        /// Kind of the referenced entity.
        kind: EntityKind,
        /// Referenced id.
        id: u64,
    },

    /// Two frames of the same kind carry the same id.
    #[error("duplicate {kind} id {id}")]
    DuplicateId {
        /// Entity kind.
        kind: EntityKind,
        /// Repeated id.
        id: u64,
    },

    /// A frame appeared where the stream rules do not allow it.
    #[error("unexpected {kind} frame: {reason}")]
    UnexpectedFrame {
        /// Entity kind of the offending frame.
        kind: EntityKind,
        /// Why it is not allowed.
        reason: String,
    },

    /// A frame reader was used again after it returned an error.
    #[error("frame stream already failed: {reason}")]
    StreamPoisoned {
        /// Display text of the original failure.
        reason: String,
    },

    /// The header's frame count disagrees with the stream.
    #[error("header declared {declared} frames but the stream contained {actual}")]
    FrameCountMismatch {
        /// Count declared in the header.
        declared: u64,
        /// Frames actually read.
        actual: u64,
    },

    /// The data store rejected an operation.
    #[error("data store error: {0}")]
    Store(String),
}

impl BackupError {
    /// Creates an I/O error with context.
    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a data store error.
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store(message.into())
    }

    /// Creates a crypto error.
    pub fn crypto<S: Into<String>>(message: S) -> Self {
        Self::Crypto(message.into())
    }

    /// Returns the category this error belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::FileNotFound { .. }
            | Self::UnableToOpenStream { .. }
            | Self::Io { .. }
            | Self::Store(_) => ErrorCategory::Resource,
            Self::Header(_)
            | Self::InvalidByteLengthDelimiter { .. }
            | Self::TruncatedBlock { .. }
            | Self::MalformedFrame { .. }
            | Self::InvalidMagic { .. }
            | Self::TruncatedContainer { .. }
            | Self::UnsupportedVersion { .. }
            | Self::StreamPoisoned { .. } => ErrorCategory::Structural,
            Self::HmacValidationFailed | Self::Crypto(_) => ErrorCategory::Integrity,
            Self::MissingHeaderField { .. }
            | Self::UnknownReference { .. }
            | Self::DanglingReference { .. }
            | Self::DuplicateId { .. }
            | Self::UnexpectedFrame { .. }
            | Self::FrameCountMismatch { .. } => ErrorCategory::Semantic,
        }
    }

    /// Whether repeating the operation with the same inputs could succeed.
    ///
    /// Only resource failures are transient. Decoding and verification are
    /// deterministic, so a tag mismatch needs fresh key material, not a retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BackupError::InvalidMagic {
            found: vec![0xde, 0xad],
        };
        assert!(format!("{err}").contains("dead"));

        let err = BackupError::UnknownReference {
            referrer: EntityKind::Chat,
            kind: EntityKind::Recipient,
            id: 7,
        };
        assert_eq!(format!("{err}"), "chat references unknown recipient id 7");
    }

    #[test]
    fn test_hmac_failure_is_not_retryable() {
        let err = BackupError::HmacValidationFailed;
        assert_eq!(err.category(), ErrorCategory::Integrity);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_header_error_is_structural() {
        let err: BackupError = HeaderError::InvalidByteLengthDelimiter {
            reason: "empty stream".to_string(),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Structural);

        let err = BackupError::io("read", std::io::Error::other("boom"));
        assert!(err.is_retryable());
    }
}
