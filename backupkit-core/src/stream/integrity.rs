//! Integrity layer: plaintext passthrough or encrypt-then-MAC.
//!
//! The encrypted container is
//!
//! ```text
//! MAGIC(8) || nonce(24) || XChaCha20(key, nonce, plaintext) || HMAC-SHA256(mac_key, MAGIC || nonce || ciphertext)
//! ```
//!
//! The tag is checked once over the whole ciphertext, never per block. The
//! decrypting reader releases plaintext as it goes and reports the outcome of
//! the check through [`Integrity`]; callers that must not act on unverified
//! data either run [`verify_container`] first or wait for
//! [`Integrity::Verified`] before committing anything.

// Layout comments describe binary structure, not Rust identifiers
#![allow(clippy::doc_markdown)]

use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::{Key, XChaCha20, XNonce};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::format::{CONTAINER_MAGIC, CONTAINER_PREFIX_LEN, MIN_CONTAINER_LEN, NONCE_SIZE, TAG_SIZE};
use super::StreamMode;
use crate::error::{BackupError, BackupResult};
use crate::keys::BackupKeys;

type HmacSha256 = Hmac<Sha256>;

/// Ciphertext is pulled from the source in chunks of this size.
const READ_CHUNK: usize = 8 * 1024;

/// What is known about the authenticity of the bytes read so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Integrity {
    /// Plaintext stream; there is nothing to verify.
    Unauthenticated,
    /// Encrypted stream whose tag has not been checked (yet).
    Pending,
    /// Encrypted stream whose tag matched.
    Verified,
}

/// Converts a read error back into the [`BackupError`] it carries, if any.
///
/// The integrity reader reports tag failures through `std::io::Read`, so they
/// travel wrapped in an [`io::Error`].
pub(crate) fn read_error(context: &str, err: io::Error) -> BackupError {
    if err.get_ref().is_some_and(|inner| inner.is::<BackupError>()) {
        if let Some(inner) = err.into_inner() {
            if let Ok(backup) = inner.downcast::<BackupError>() {
                return *backup;
            }
        }
        return BackupError::HmacValidationFailed;
    }
    BackupError::io(context, err)
}

fn new_mac(keys: &BackupKeys) -> BackupResult<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(keys.mac_key())
        .map_err(|_| BackupError::crypto("invalid MAC key length"))
}

fn new_cipher(keys: &BackupKeys, nonce: &[u8; NONCE_SIZE]) -> XChaCha20 {
    XChaCha20::new(Key::from_slice(keys.cipher_key()), XNonce::from_slice(nonce))
}

fn tags_match(computed: &[u8], expected: &[u8]) -> bool {
    computed.ct_eq(expected).into()
}

// =============================================================================
// Writing
// =============================================================================

/// Encrypts everything written to it and appends the tag on [`finish`].
///
/// [`finish`]: EncryptingWriter::finish
pub struct EncryptingWriter<W: Write> {
    inner: W,
    cipher: XChaCha20,
    mac: HmacSha256,
    scratch: Vec<u8>,
}

impl<W: Write> EncryptingWriter<W> {
    /// Writes the container prefix with a fresh random nonce.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Crypto`] if the RNG fails, or an I/O error.
    pub fn new(inner: W, keys: &BackupKeys) -> BackupResult<Self> {
        let mut nonce = [0u8; NONCE_SIZE];
        getrandom::fill(&mut nonce)
            .map_err(|err| BackupError::crypto(format!("getrandom failed: {err}")))?;
        Self::with_nonce(inner, keys, nonce)
    }

    fn with_nonce(mut inner: W, keys: &BackupKeys, nonce: [u8; NONCE_SIZE]) -> BackupResult<Self> {
        let mut mac = new_mac(keys)?;
        mac.update(CONTAINER_MAGIC);
        mac.update(&nonce);
        inner
            .write_all(CONTAINER_MAGIC)
            .and_then(|()| inner.write_all(&nonce))
            .map_err(|err| BackupError::io("writing container prefix", err))?;
        Ok(Self {
            inner,
            cipher: new_cipher(keys, &nonce),
            mac,
            scratch: Vec::new(),
        })
    }

    /// Appends the tag, flushes and returns the sink.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the tag cannot be written.
    pub fn finish(mut self) -> BackupResult<W> {
        let tag = self.mac.finalize().into_bytes();
        self.inner
            .write_all(&tag)
            .and_then(|()| self.inner.flush())
            .map_err(|err| BackupError::io("writing authentication tag", err))?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for EncryptingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.cipher.apply_keystream(&mut self.scratch);
        self.inner.write_all(&self.scratch)?;
        self.mac.update(&self.scratch);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Sink side of the integrity layer.
pub enum IntegrityWriter<W: Write> {
    /// Bytes pass through unchanged.
    Plaintext(W),
    /// Bytes are encrypted and authenticated.
    Encrypted(EncryptingWriter<W>),
}

impl<W: Write> IntegrityWriter<W> {
    /// Wraps `inner` according to `mode`. Encrypted mode writes the container
    /// prefix immediately.
    ///
    /// # Errors
    ///
    /// See [`EncryptingWriter::new`].
    pub fn new(inner: W, mode: &StreamMode) -> BackupResult<Self> {
        match mode {
            StreamMode::Plaintext => Ok(Self::Plaintext(inner)),
            StreamMode::Encrypted(keys) => Ok(Self::Encrypted(EncryptingWriter::new(inner, keys)?)),
        }
    }

    /// Flushes, appending the tag in encrypted mode, and returns the sink.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from the final write or flush.
    pub fn finish(self) -> BackupResult<W> {
        match self {
            Self::Plaintext(mut inner) => {
                inner
                    .flush()
                    .map_err(|err| BackupError::io("flushing backup stream", err))?;
                Ok(inner)
            }
            Self::Encrypted(writer) => writer.finish(),
        }
    }
}

impl<W: Write> Write for IntegrityWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plaintext(inner) => inner.write(buf),
            Self::Encrypted(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plaintext(inner) => inner.flush(),
            Self::Encrypted(writer) => writer.flush(),
        }
    }
}

// =============================================================================
// Reading
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerifyState {
    /// Ciphertext is flowing; the last `TAG_SIZE` bytes seen are held back.
    Collecting,
    /// The source hit EOF and the tag is being compared.
    Verifying,
    Verified,
    Failed,
}

/// Decrypts a container while accumulating its MAC.
///
/// The trailing [`TAG_SIZE`] bytes are never released as plaintext. When the
/// source reaches EOF the held-back bytes are compared to the computed tag in
/// constant time. A reader that failed keeps failing.
pub struct DecryptingReader<R: Read> {
    source: R,
    cipher: XChaCha20,
    mac: Option<HmacSha256>,
    pending: Vec<u8>,
    consumed: u64,
    state: VerifyState,
}

impl<R: Read> DecryptingReader<R> {
    /// Reads and checks the container prefix.
    ///
    /// # Errors
    ///
    /// - [`BackupError::TruncatedContainer`] if the source ends inside the prefix.
    /// - [`BackupError::InvalidMagic`] if the magic bytes do not match.
    pub fn new(mut source: R, keys: &BackupKeys) -> BackupResult<Self> {
        let mut prefix = [0u8; CONTAINER_PREFIX_LEN];
        let got = read_full(&mut source, &mut prefix)
            .map_err(|err| BackupError::io("reading container prefix", err))?;
        if got >= CONTAINER_MAGIC.len() && &prefix[..CONTAINER_MAGIC.len()] != CONTAINER_MAGIC {
            return Err(BackupError::InvalidMagic {
                found: prefix[..CONTAINER_MAGIC.len()].to_vec(),
            });
        }
        if got < CONTAINER_PREFIX_LEN {
            return Err(BackupError::TruncatedContainer {
                len: got as u64,
                minimum: MIN_CONTAINER_LEN as u64,
            });
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&prefix[CONTAINER_MAGIC.len()..]);
        let mut mac = new_mac(keys)?;
        mac.update(&prefix);

        Ok(Self {
            source,
            cipher: new_cipher(keys, &nonce),
            mac: Some(mac),
            pending: Vec::with_capacity(READ_CHUNK + TAG_SIZE),
            consumed: CONTAINER_PREFIX_LEN as u64,
            state: VerifyState::Collecting,
        })
    }

    /// Current verification status.
    #[must_use]
    pub fn integrity(&self) -> Integrity {
        if self.state == VerifyState::Verified {
            Integrity::Verified
        } else {
            Integrity::Pending
        }
    }

    fn verify(&mut self) -> BackupResult<()> {
        self.state = VerifyState::Verifying;
        if self.pending.len() < TAG_SIZE {
            self.state = VerifyState::Failed;
            return Err(BackupError::TruncatedContainer {
                len: self.consumed,
                minimum: MIN_CONTAINER_LEN as u64,
            });
        }
        let Some(mac) = self.mac.take() else {
            self.state = VerifyState::Failed;
            return Err(BackupError::HmacValidationFailed);
        };
        let computed = mac.finalize().into_bytes();
        if tags_match(&computed, &self.pending) {
            log::debug!("backup container tag verified");
            self.state = VerifyState::Verified;
            Ok(())
        } else {
            log::warn!("backup container tag mismatch");
            self.state = VerifyState::Failed;
            Err(BackupError::HmacValidationFailed)
        }
    }

    /// Consumes the rest of the ciphertext without decrypting it and checks
    /// the tag.
    ///
    /// Bytes already released were authenticated as they went out, so this
    /// can be called at any point. Returns at once if the tag was already
    /// checked.
    pub(crate) fn authenticate_rest(&mut self) -> BackupResult<()> {
        loop {
            match self.state {
                VerifyState::Verified => return Ok(()),
                VerifyState::Failed | VerifyState::Verifying => {
                    return Err(BackupError::HmacValidationFailed);
                }
                VerifyState::Collecting => {}
            }
            let releasable = self.pending.len().saturating_sub(TAG_SIZE);
            if let Some(mac) = self.mac.as_mut() {
                mac.update(&self.pending[..releasable]);
            }
            self.pending.drain(..releasable);
            if !self
                .fill()
                .map_err(|err| read_error("authenticating container", err))?
            {
                return self.verify();
            }
        }
    }

    /// Pulls more ciphertext. Returns `false` at EOF.
    fn fill(&mut self) -> io::Result<bool> {
        let start = self.pending.len();
        self.pending.resize(start + READ_CHUNK, 0);
        let read = loop {
            match self.source.read(&mut self.pending[start..]) {
                Ok(read) => break read,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    self.pending.truncate(start);
                    return Err(err);
                }
            }
        };
        self.pending.truncate(start + read);
        self.consumed += read as u64;
        Ok(read > 0)
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            match self.state {
                VerifyState::Verified => return Ok(0),
                VerifyState::Failed | VerifyState::Verifying => {
                    return Err(io::Error::other(BackupError::HmacValidationFailed));
                }
                VerifyState::Collecting => {}
            }

            let releasable = self.pending.len().saturating_sub(TAG_SIZE);
            if releasable > 0 {
                let n = releasable.min(out.len());
                let chunk = &mut out[..n];
                chunk.copy_from_slice(&self.pending[..n]);
                self.pending.drain(..n);
                if let Some(mac) = self.mac.as_mut() {
                    mac.update(chunk);
                }
                self.cipher.apply_keystream(chunk);
                return Ok(n);
            }

            if !self.fill()? {
                self.verify().map_err(io::Error::other)?;
            }
        }
    }
}

/// Source side of the integrity layer.
pub enum IntegrityReader<R: Read> {
    /// Bytes pass through unchanged.
    Plaintext(R),
    /// Bytes are decrypted and authenticated.
    Encrypted(DecryptingReader<R>),
}

impl<R: Read> IntegrityReader<R> {
    /// Wraps `source` according to `mode`.
    ///
    /// # Errors
    ///
    /// See [`DecryptingReader::new`].
    pub fn new(source: R, mode: &StreamMode) -> BackupResult<Self> {
        match mode {
            StreamMode::Plaintext => Ok(Self::Plaintext(source)),
            StreamMode::Encrypted(keys) => {
                Ok(Self::Encrypted(DecryptingReader::new(source, keys)?))
            }
        }
    }

    /// Current verification status.
    #[must_use]
    pub fn integrity(&self) -> Integrity {
        match self {
            Self::Plaintext(_) => Integrity::Unauthenticated,
            Self::Encrypted(reader) => reader.integrity(),
        }
    }

    /// Checks the tag over whatever is left of an encrypted source. Plaintext
    /// sources have nothing to check.
    pub(crate) fn authenticate_rest(&mut self) -> BackupResult<()> {
        match self {
            Self::Plaintext(_) => Ok(()),
            Self::Encrypted(reader) => reader.authenticate_rest(),
        }
    }
}

impl<R: Read> Read for IntegrityReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plaintext(source) => source.read(buf),
            Self::Encrypted(reader) => reader.read(buf),
        }
    }
}

/// Checks the tag of a seekable container without decrypting it, then
/// rewinds the source.
///
/// # Errors
///
/// - [`BackupError::InvalidMagic`] or [`BackupError::TruncatedContainer`]
///   for a malformed container.
/// - [`BackupError::HmacValidationFailed`] if the tag does not match.
/// - I/O errors from the source.
pub fn verify_container<R: Read + Seek>(source: &mut R, keys: &BackupKeys) -> BackupResult<()> {
    let len = source
        .seek(SeekFrom::End(0))
        .map_err(|err| BackupError::io("measuring container", err))?;
    source
        .seek(SeekFrom::Start(0))
        .map_err(|err| BackupError::io("rewinding container", err))?;

    if len >= CONTAINER_MAGIC.len() as u64 {
        let mut magic = [0u8; 8];
        source
            .read_exact(&mut magic)
            .map_err(|err| BackupError::io("reading container magic", err))?;
        if &magic != CONTAINER_MAGIC {
            return Err(BackupError::InvalidMagic {
                found: magic.to_vec(),
            });
        }
    }
    if len < MIN_CONTAINER_LEN as u64 {
        return Err(BackupError::TruncatedContainer {
            len,
            minimum: MIN_CONTAINER_LEN as u64,
        });
    }

    let mut mac = new_mac(keys)?;
    mac.update(CONTAINER_MAGIC);
    let mut remaining = len - CONTAINER_MAGIC.len() as u64 - TAG_SIZE as u64;
    let mut chunk = vec![0u8; READ_CHUNK];
    while remaining > 0 {
        let want = usize::try_from(remaining).map_or(READ_CHUNK, |r| r.min(READ_CHUNK));
        source
            .read_exact(&mut chunk[..want])
            .map_err(|err| BackupError::io("reading container body", err))?;
        mac.update(&chunk[..want]);
        remaining -= want as u64;
    }

    let mut tag = [0u8; TAG_SIZE];
    source
        .read_exact(&mut tag)
        .map_err(|err| BackupError::io("reading authentication tag", err))?;
    source
        .seek(SeekFrom::Start(0))
        .map_err(|err| BackupError::io("rewinding container", err))?;

    let computed = mac.finalize().into_bytes();
    if tags_match(&computed, &tag) {
        Ok(())
    } else {
        log::warn!("backup container tag mismatch during pre-verification");
        Err(BackupError::HmacValidationFailed)
    }
}

/// Reads until `buf` is full or the source ends; returns the bytes read.
fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
