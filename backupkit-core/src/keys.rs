//! Key material for encrypted backups.
//!
//! The codec never stores keys. Callers hand in a [`KeyMaterialProvider`] per
//! operation; the provider yields a [`BackupKeys`] pair that is zeroized when
//! dropped.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{BackupError, BackupResult};
use crate::stream::format::{KEY_SIZE, LABEL_BACKUP_KEYS};

/// MAC and cipher keys for one backup.
///
/// # Security
///
/// - Both keys are zeroized on drop.
/// - `Debug` never prints key bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BackupKeys {
    mac_key: [u8; KEY_SIZE],
    cipher_key: [u8; KEY_SIZE],
}

impl BackupKeys {
    /// Creates a key pair from raw bytes.
    #[must_use]
    pub const fn from_bytes(mac_key: [u8; KEY_SIZE], cipher_key: [u8; KEY_SIZE]) -> Self {
        Self {
            mac_key,
            cipher_key,
        }
    }

    /// Splits 64 bytes into MAC key (first half) and cipher key (second half).
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Crypto`] if `bytes` is not 64 bytes long.
    pub fn from_slice(bytes: &[u8]) -> BackupResult<Self> {
        if bytes.len() != 2 * KEY_SIZE {
            return Err(BackupError::crypto(format!(
                "expected {} bytes of key material, got {}",
                2 * KEY_SIZE,
                bytes.len()
            )));
        }
        let mut keys = Self::from_bytes([0u8; KEY_SIZE], [0u8; KEY_SIZE]);
        keys.mac_key.copy_from_slice(&bytes[..KEY_SIZE]);
        keys.cipher_key.copy_from_slice(&bytes[KEY_SIZE..]);
        Ok(keys)
    }

    /// Generates a random key pair.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Crypto`] if the system RNG fails.
    pub fn generate() -> BackupResult<Self> {
        let mut bytes = [0u8; 2 * KEY_SIZE];
        getrandom::fill(&mut bytes)
            .map_err(|err| BackupError::crypto(format!("getrandom failed: {err}")))?;
        let keys = Self::from_slice(&bytes);
        bytes.zeroize();
        keys
    }

    /// Key for the HMAC-SHA256 tag.
    #[must_use]
    pub const fn mac_key(&self) -> &[u8; KEY_SIZE] {
        &self.mac_key
    }

    /// Key for the XChaCha20 keystream.
    #[must_use]
    pub const fn cipher_key(&self) -> &[u8; KEY_SIZE] {
        &self.cipher_key
    }
}

impl std::fmt::Debug for BackupKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupKeys")
            .field("mac_key", &"[REDACTED]")
            .field("cipher_key", &"[REDACTED]")
            .finish()
    }
}

/// Derives the MAC and cipher keys for a backup.
///
/// ```text
/// okm = HKDF-SHA256(
///     ikm  = backup_key,
///     salt = none,
///     info = "backupkit:message-backup-keys:v1" || backup_id,
///     len  = 64
/// )
/// mac_key = okm[..32], cipher_key = okm[32..]
/// ```
///
/// # Errors
///
/// Returns [`BackupError::Crypto`] if HKDF rejects the output length.
pub fn derive_backup_keys(backup_key: &[u8; KEY_SIZE], backup_id: &[u8]) -> BackupResult<BackupKeys> {
    let mut info = Vec::with_capacity(LABEL_BACKUP_KEYS.len() + backup_id.len());
    info.extend_from_slice(LABEL_BACKUP_KEYS);
    info.extend_from_slice(backup_id);

    let hk = Hkdf::<Sha256>::new(None, backup_key);
    let mut okm = [0u8; 2 * KEY_SIZE];
    hk.expand(&info, &mut okm)
        .map_err(|_| BackupError::crypto("HKDF output length is invalid"))?;
    let keys = BackupKeys::from_slice(&okm);
    okm.zeroize();
    keys
}

/// Supplies key material for one encrypted read or write.
pub trait KeyMaterialProvider {
    /// Returns the keys for the current backup.
    ///
    /// # Errors
    ///
    /// Implementations return [`BackupError::Crypto`] when no usable key
    /// material is available.
    fn backup_keys(&self) -> BackupResult<BackupKeys>;
}

impl KeyMaterialProvider for BackupKeys {
    fn backup_keys(&self) -> BackupResult<BackupKeys> {
        Ok(self.clone())
    }
}

/// Derives keys from an account backup key and a backup id on demand.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeyProvider {
    backup_key: [u8; KEY_SIZE],
    backup_id: Vec<u8>,
}

impl DerivedKeyProvider {
    /// Creates a provider for `backup_id` under `backup_key`.
    #[must_use]
    pub fn new(backup_key: [u8; KEY_SIZE], backup_id: impl Into<Vec<u8>>) -> Self {
        Self {
            backup_key,
            backup_id: backup_id.into(),
        }
    }

    /// Creates a provider from hex strings, as used on the command line.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Crypto`] for invalid hex or a backup key that is
    /// not 32 bytes.
    pub fn from_hex(backup_key: &str, backup_id: &str) -> BackupResult<Self> {
        let mut key_bytes = hex::decode(backup_key.trim())
            .map_err(|err| BackupError::crypto(format!("invalid backup key hex: {err}")))?;
        let backup_id = hex::decode(backup_id.trim())
            .map_err(|err| BackupError::crypto(format!("invalid backup id hex: {err}")))?;
        let Ok(key) = <[u8; KEY_SIZE]>::try_from(key_bytes.as_slice()) else {
            let len = key_bytes.len();
            key_bytes.zeroize();
            return Err(BackupError::crypto(format!(
                "backup key must be {KEY_SIZE} bytes, got {len}"
            )));
        };
        key_bytes.zeroize();
        Ok(Self::new(key, backup_id))
    }
}

impl KeyMaterialProvider for DerivedKeyProvider {
    fn backup_keys(&self) -> BackupResult<BackupKeys> {
        derive_backup_keys(&self.backup_key, &self.backup_id)
    }
}

impl std::fmt::Debug for DerivedKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeyProvider")
            .field("backup_key", &"[REDACTED]")
            .field("backup_id", &hex::encode(&self.backup_id))
            .finish()
    }
}
