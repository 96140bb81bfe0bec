use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use super::delimited::BlockReader;
use super::format::FORMAT_VERSION;
use super::integrity::{verify_container, Integrity, IntegrityReader};
use super::StreamMode;
use crate::error::{BackupError, BackupResult, ErrorCategory, HeaderError};
use crate::model::{BackupInfo, Frame};
use crate::proto::{DecodeError, Message};

type Blocks<R> = BlockReader<BufReader<IntegrityReader<R>>>;

/// Picks the error to report when reading stops early because of `err`.
///
/// A tampered ciphertext decrypts to garbage, which usually fails to parse
/// long before the tag is reached. For an encrypted stream the rest of the
/// container is authenticated first, and a tag failure wins over `err`.
fn authenticated_error<R: Read>(
    blocks: &mut Blocks<R>,
    encrypted: bool,
    err: BackupError,
) -> BackupError {
    if !encrypted
        || matches!(
            err.category(),
            ErrorCategory::Integrity | ErrorCategory::Resource
        )
    {
        return err;
    }
    match blocks.get_mut().get_mut().authenticate_rest() {
        Err(tag_err) if tag_err.category() == ErrorCategory::Integrity => {
            log::warn!("tag check failed after read error: {err}");
            tag_err
        }
        _ => err,
    }
}

/// A backup stream positioned before its header.
///
/// The only thing a `BackupReader` can do is read the header, which hands
/// back a [`FrameReader`] for the frames that follow.
pub struct BackupReader<R: Read> {
    blocks: Blocks<R>,
    encrypted: bool,
}

impl BackupReader<File> {
    /// Opens a backup file.
    ///
    /// In encrypted mode the whole container is authenticated before this
    /// returns, so a tampered file never yields a frame.
    ///
    /// # Errors
    ///
    /// - [`BackupError::FileNotFound`] if `path` does not exist.
    /// - [`BackupError::UnableToOpenStream`] for other open failures.
    /// - Container and tag errors in encrypted mode.
    pub fn open(path: impl AsRef<Path>, mode: &StreamMode) -> BackupResult<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => BackupError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => BackupError::UnableToOpenStream {
                context: path.display().to_string(),
                source: err,
            },
        })?;
        if let StreamMode::Encrypted(keys) = mode {
            verify_container(&mut file, keys)?;
            log::debug!("verified container {}", path.display());
        }
        Self::new(file, mode)
    }
}

impl<R: Read> BackupReader<R> {
    /// Wraps any byte source.
    ///
    /// Unlike [`BackupReader::open`], the tag of an encrypted source is only
    /// checked when the last block has been read; see [`FrameReader::finish`].
    ///
    /// # Errors
    ///
    /// Container prefix errors in encrypted mode.
    pub fn new(source: R, mode: &StreamMode) -> BackupResult<Self> {
        let encrypted = mode.is_encrypted();
        let integrity = IntegrityReader::new(source, mode)?;
        Ok(Self {
            blocks: BlockReader::new(BufReader::new(integrity)),
            encrypted,
        })
    }

    /// Reads the header block.
    ///
    /// # Errors
    ///
    /// - [`HeaderError::InvalidByteLengthDelimiter`] for an empty stream or a
    ///   malformed length prefix.
    /// - [`HeaderError::ProtoDeserializationError`] if the block is truncated
    ///   or does not decode.
    /// - [`BackupError::UnsupportedVersion`] for a newer format version.
    /// - [`BackupError::HmacValidationFailed`] instead of any of the above if
    ///   the stream is encrypted and its tag does not match.
    pub fn read_header(mut self) -> BackupResult<(BackupInfo, FrameReader<R>)> {
        let info = match self.decode_header() {
            Ok(info) => info,
            Err(err) => return Err(authenticated_error(&mut self.blocks, self.encrypted, err)),
        };
        log::debug!(
            "read backup header: version {} backup_time_ms {}",
            info.version,
            info.backup_time_ms
        );

        let frames = FrameReader {
            blocks: self.blocks,
            encrypted: self.encrypted,
            declared_frames: info.frame_count,
            frames_read: 0,
            state: ReadState::Reading,
        };
        Ok((info, frames))
    }

    fn decode_header(&mut self) -> BackupResult<BackupInfo> {
        let block = match self.blocks.next_block() {
            Ok(Some(block)) => block,
            Ok(None) => {
                return Err(HeaderError::InvalidByteLengthDelimiter {
                    reason: "stream is empty".to_string(),
                }
                .into());
            }
            Err(BackupError::InvalidByteLengthDelimiter { reason, .. }) => {
                return Err(HeaderError::InvalidByteLengthDelimiter { reason }.into());
            }
            Err(BackupError::TruncatedBlock {
                offset,
                expected,
                available,
                ..
            }) => {
                return Err(HeaderError::ProtoDeserializationError(DecodeError::Truncated {
                    context: "header block",
                    offset: usize::try_from(offset).unwrap_or(usize::MAX),
                    needed: usize::try_from(expected - available).unwrap_or(usize::MAX),
                })
                .into());
            }
            Err(err) => return Err(err),
        };

        let info =
            BackupInfo::decode(&block.payload).map_err(HeaderError::ProtoDeserializationError)?;
        if info.version > FORMAT_VERSION {
            return Err(BackupError::UnsupportedVersion {
                found: info.version,
                supported: FORMAT_VERSION,
            });
        }
        Ok(info)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadState {
    Reading,
    Done,
    Failed(String),
}

/// Forward-only reader over the frames of a stream.
///
/// Holds at most one frame in memory. Reaching the end of the frames does not
/// by itself mean the stream was authentic; check [`FrameReader::integrity`]
/// or call [`FrameReader::finish`].
pub struct FrameReader<R: Read> {
    blocks: Blocks<R>,
    encrypted: bool,
    declared_frames: Option<u64>,
    frames_read: u64,
    state: ReadState,
}

impl<R: Read> FrameReader<R> {
    /// Reads the next frame, or `None` after the last one.
    ///
    /// After an error every further call returns
    /// [`BackupError::StreamPoisoned`].
    ///
    /// # Errors
    ///
    /// Block, frame decode and integrity errors. In an encrypted stream a
    /// block or decode error is only reported once the tag over the rest of
    /// the container checks out; otherwise the error is
    /// [`BackupError::HmacValidationFailed`].
    pub fn next_frame(&mut self) -> BackupResult<Option<Frame>> {
        match &self.state {
            ReadState::Reading => {}
            ReadState::Done => return Ok(None),
            ReadState::Failed(reason) => {
                return Err(BackupError::StreamPoisoned {
                    reason: reason.clone(),
                });
            }
        }
        match self.read_one() {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => {
                self.state = ReadState::Done;
                Ok(None)
            }
            Err(err) => Err(self.reject(err)),
        }
    }

    /// Abandons the stream because of `err` and returns the error to report.
    ///
    /// Callers that stop on a problem of their own (an import finding a
    /// dangling reference, say) pass it through here so that tampering is
    /// reported as such: in an encrypted stream the rest of the container is
    /// authenticated, and a tag mismatch replaces `err`. The reader is
    /// poisoned afterwards.
    pub fn reject(&mut self, err: BackupError) -> BackupError {
        let err = authenticated_error(&mut self.blocks, self.encrypted, err);
        self.state = ReadState::Failed(err.to_string());
        err
    }

    fn read_one(&mut self) -> BackupResult<Option<Frame>> {
        let Some(block) = self.blocks.next_block()? else {
            return Ok(None);
        };
        let frame = Frame::decode(&block.payload).map_err(|source| BackupError::MalformedFrame {
            block: block.index,
            offset: block.offset,
            source,
        })?;
        self.frames_read += 1;
        Ok(Some(frame))
    }

    /// Authentication status of what has been read so far.
    #[must_use]
    pub fn integrity(&self) -> Integrity {
        self.blocks.get_ref().get_ref().integrity()
    }

    /// Skips the header frame count comparison in [`FrameReader::finish`].
    pub fn skip_frame_count_check(&mut self) {
        self.declared_frames = None;
    }

    /// Frame count the header declared, if any.
    #[must_use]
    pub const fn declared_frames(&self) -> Option<u64> {
        self.declared_frames
    }

    /// Number of frames returned so far.
    #[must_use]
    pub const fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Drains any remaining frames and checks the stream as a whole.
    ///
    /// # Errors
    ///
    /// - Any error from the remaining frames (including a tag mismatch).
    /// - [`BackupError::HmacValidationFailed`] if an encrypted stream did not
    ///   end verified.
    /// - [`BackupError::FrameCountMismatch`] if the header declared a
    ///   different number of frames.
    pub fn finish(mut self) -> BackupResult<Integrity> {
        while self.next_frame()?.is_some() {}

        let integrity = self.integrity();
        if self.encrypted && integrity != Integrity::Verified {
            return Err(BackupError::HmacValidationFailed);
        }
        if let Some(declared) = self.declared_frames {
            if declared != self.frames_read {
                return Err(BackupError::FrameCountMismatch {
                    declared,
                    actual: self.frames_read,
                });
            }
        }
        Ok(integrity)
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = BackupResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, ReadState::Failed(_)) {
            return None;
        }
        self.next_frame().transpose()
    }
}

impl<R: Read> std::iter::FusedIterator for FrameReader<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::BackupKeys;
    use crate::model::{Chat, Recipient};
    use crate::store::EntityKind;
    use crate::stream::format::CONTAINER_PREFIX_LEN;
    use crate::stream::{write_block, BackupWriter};

    fn write_sample(mode: &StreamMode, frame_count: Option<u64>) -> Vec<u8> {
        let info = BackupInfo {
            version: 1,
            backup_time_ms: 1_700_000_000_000,
            frame_count,
            ..BackupInfo::default()
        };
        let mut frames = BackupWriter::new(Vec::new(), mode)
            .expect("writer")
            .write_header(&info)
            .expect("header");
        frames
            .write_frame(&Frame::from(Recipient {
                id: 1,
                ..Recipient::default()
            }))
            .expect("frame");
        frames
            .write_frame(&Frame::from(Chat {
                id: 1,
                recipient_id: 1,
                ..Chat::default()
            }))
            .expect("frame");
        frames.finalize().expect("finalize")
    }

    #[test]
    fn test_reads_plaintext_stream() {
        let bytes = write_sample(&StreamMode::Plaintext, Some(2));
        let (info, mut frames) = BackupReader::new(bytes.as_slice(), &StreamMode::Plaintext)
            .expect("reader")
            .read_header()
            .expect("header");
        assert_eq!(info.backup_time_ms, 1_700_000_000_000);
        assert_eq!(frames.integrity(), Integrity::Unauthenticated);

        let first = frames.next_frame().expect("frame").expect("some");
        assert_eq!(first.kind(), crate::model::FrameKind::Recipient);
        assert_eq!(frames.frames_read(), 1);
        assert_eq!(frames.finish().expect("finish"), Integrity::Unauthenticated);
    }

    #[test]
    fn test_encrypted_stream_verifies_at_end() {
        let mode = StreamMode::Encrypted(BackupKeys::from_bytes([3u8; 32], [4u8; 32]));
        let bytes = write_sample(&mode, None);
        let (_, mut frames) = BackupReader::new(bytes.as_slice(), &mode)
            .expect("reader")
            .read_header()
            .expect("header");
        assert_eq!(frames.integrity(), Integrity::Pending);
        let collected: Vec<_> = frames.by_ref().collect::<BackupResult<_>>().expect("frames");
        assert_eq!(collected.len(), 2);
        assert_eq!(frames.integrity(), Integrity::Verified);
        assert_eq!(frames.finish().expect("finish"), Integrity::Verified);
    }

    #[test]
    fn test_empty_stream_is_header_delimiter_error() {
        let result = BackupReader::new(&[][..], &StreamMode::Plaintext)
            .expect("reader")
            .read_header();
        assert!(matches!(
            result,
            Err(BackupError::Header(HeaderError::InvalidByteLengthDelimiter { .. }))
        ));
    }

    #[test]
    fn test_garbage_header_is_deserialization_error() {
        let mut bytes = Vec::new();
        write_block(&[0x0f, 0x01], &mut bytes).expect("block");
        let result = BackupReader::new(bytes.as_slice(), &StreamMode::Plaintext)
            .expect("reader")
            .read_header();
        assert!(matches!(
            result,
            Err(BackupError::Header(HeaderError::ProtoDeserializationError(_)))
        ));
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let info = BackupInfo {
            version: FORMAT_VERSION + 1,
            backup_time_ms: 1,
            ..BackupInfo::default()
        };
        let mut bytes = Vec::new();
        write_block(&info.encode_to_vec(), &mut bytes).expect("block");
        let result = BackupReader::new(bytes.as_slice(), &StreamMode::Plaintext)
            .expect("reader")
            .read_header();
        assert!(matches!(result, Err(BackupError::UnsupportedVersion { .. })));
    }

    #[test]
    fn test_malformed_frame_reports_position_and_poisons() {
        let mut bytes = write_sample(&StreamMode::Plaintext, None);
        write_block(&[0x08], &mut bytes).expect("block");
        let (_, mut frames) = BackupReader::new(bytes.as_slice(), &StreamMode::Plaintext)
            .expect("reader")
            .read_header()
            .expect("header");
        assert!(frames.next_frame().expect("first").is_some());
        assert!(frames.next_frame().expect("second").is_some());
        let err = frames.next_frame().expect_err("malformed");
        assert!(matches!(err, BackupError::MalformedFrame { block: 3, .. }));
        assert!(matches!(
            frames.next_frame(),
            Err(BackupError::StreamPoisoned { .. })
        ));
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_frame_count_mismatch() {
        let bytes = write_sample(&StreamMode::Plaintext, Some(5));
        let (_, frames) = BackupReader::new(bytes.as_slice(), &StreamMode::Plaintext)
            .expect("reader")
            .read_header()
            .expect("header");
        assert!(matches!(
            frames.finish(),
            Err(BackupError::FrameCountMismatch {
                declared: 5,
                actual: 2
            })
        ));
    }

    fn encrypted_mode() -> StreamMode {
        StreamMode::Encrypted(BackupKeys::from_bytes([5u8; 32], [6u8; 32]))
    }

    fn read_all(bytes: &[u8], mode: &StreamMode) -> BackupResult<Integrity> {
        let (_, mut frames) = BackupReader::new(bytes, mode)?.read_header()?;
        while frames.next_frame()?.is_some() {}
        frames.finish()
    }

    #[test]
    fn test_tampered_header_reports_tag_mismatch() {
        let mode = encrypted_mode();
        let mut bytes = write_sample(&mode, Some(2));
        // First plaintext byte is the header's length delimiter.
        bytes[CONTAINER_PREFIX_LEN] ^= 0x40;
        let err = read_all(&bytes, &mode).expect_err("tampered");
        assert!(matches!(err, BackupError::HmacValidationFailed), "{err}");
    }

    #[test]
    fn test_tampered_frame_reports_tag_mismatch_and_poisons() {
        let mode = encrypted_mode();
        let clean = write_sample(&mode, None);
        let (_, clean_frames) = BackupReader::new(clean.as_slice(), &mode)
            .expect("reader")
            .read_header()
            .expect("header");
        let header_len = clean_frames.blocks.offset();

        // Change the wire type of the first frame's key so it no longer decodes.
        let mut bytes = clean.clone();
        let index = CONTAINER_PREFIX_LEN + usize::try_from(header_len).expect("offset") + 1;
        bytes[index] ^= 0x07;
        let (_, mut frames) = BackupReader::new(bytes.as_slice(), &mode)
            .expect("reader")
            .read_header()
            .expect("header");
        let err = frames.next_frame().expect_err("tampered");
        assert!(matches!(err, BackupError::HmacValidationFailed), "{err}");
        assert!(matches!(
            frames.next_frame(),
            Err(BackupError::StreamPoisoned { .. })
        ));
        assert_eq!(frames.integrity(), Integrity::Pending);
    }

    #[test]
    fn test_reject_keeps_caller_error_when_tag_matches() {
        let mode = encrypted_mode();
        let bytes = write_sample(&mode, None);
        let (_, mut frames) = BackupReader::new(bytes.as_slice(), &mode)
            .expect("reader")
            .read_header()
            .expect("header");
        let err = frames.reject(BackupError::UnknownReference {
            referrer: EntityKind::Chat,
            kind: EntityKind::Recipient,
            id: 9,
        });
        assert!(matches!(err, BackupError::UnknownReference { id: 9, .. }), "{err}");
        assert_eq!(frames.integrity(), Integrity::Verified);
        assert!(matches!(
            frames.next_frame(),
            Err(BackupError::StreamPoisoned { .. })
        ));
    }

    #[test]
    fn test_reject_reports_tag_mismatch() {
        let mode = encrypted_mode();
        let mut bytes = write_sample(&mode, None);
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let (_, mut frames) = BackupReader::new(bytes.as_slice(), &mode)
            .expect("reader")
            .read_header()
            .expect("header");
        let err = frames.reject(BackupError::UnknownReference {
            referrer: EntityKind::Chat,
            kind: EntityKind::Recipient,
            id: 9,
        });
        assert!(matches!(err, BackupError::HmacValidationFailed), "{err}");
    }

    #[test]
    fn test_plaintext_errors_pass_through() {
        let mut bytes = write_sample(&StreamMode::Plaintext, None);
        bytes.truncate(bytes.len() - 1);
        let err = read_all(&bytes, &StreamMode::Plaintext).expect_err("truncated");
        assert!(matches!(err, BackupError::TruncatedBlock { .. }), "{err}");
    }
}
