//! Format constants for backup streams.
//!
//! ```text
//! plaintext:  varint(len) BackupInfo  ( varint(len) Frame )*
//! encrypted:  MAGIC(8) || nonce(24) || XChaCha20(plaintext stream) || HMAC-SHA256 tag(32)
//! ```
//!
//! The tag covers magic, nonce and the whole ciphertext.

// Layout comments describe binary structure, not Rust identifiers
#![allow(clippy::doc_markdown)]

/// Newest header `version` this codec reads and the one it writes.
pub const FORMAT_VERSION: u64 = 1;

/// Magic bytes at the start of every encrypted container.
pub const CONTAINER_MAGIC: &[u8; 8] = b"BKUPENC1";

/// XChaCha20 nonce size.
pub const NONCE_SIZE: usize = 24;

/// HMAC-SHA256 tag size.
pub const TAG_SIZE: usize = 32;

/// Size of each derived key.
pub const KEY_SIZE: usize = 32;

/// Bytes before the ciphertext: magic + nonce.
pub const CONTAINER_PREFIX_LEN: usize = CONTAINER_MAGIC.len() + NONCE_SIZE;

/// Shortest valid encrypted container: prefix + tag, empty ciphertext.
pub const MIN_CONTAINER_LEN: usize = CONTAINER_PREFIX_LEN + TAG_SIZE;

/// Largest block payload accepted by the reader (64 MiB).
pub const MAX_BLOCK_LEN: u64 = 64 * 1024 * 1024;

/// HKDF info prefix for deriving the MAC and cipher keys.
pub const LABEL_BACKUP_KEYS: &[u8] = b"backupkit:message-backup-keys:v1";

/// Extension appended to a destination path while it is being written.
pub const PARTIAL_EXTENSION: &str = "partial";
