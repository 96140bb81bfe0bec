//! Length-delimited blocks: `varint(len) || payload`.

use std::io::{ErrorKind, Read, Write};

use prost::encoding::encode_varint;

use super::format::MAX_BLOCK_LEN;
use super::integrity::read_error;
use crate::error::{BackupError, BackupResult};
use crate::proto::MAX_VARINT_LEN;

/// Writes one block.
///
/// # Errors
///
/// Returns any error from the sink.
pub fn write_block<W: Write + ?Sized>(payload: &[u8], sink: &mut W) -> std::io::Result<()> {
    let mut prefix = Vec::with_capacity(MAX_VARINT_LEN);
    encode_varint(payload.len() as u64, &mut prefix);
    sink.write_all(&prefix)?;
    sink.write_all(payload)
}

/// One block read off the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Zero-based block index. The header is block 0.
    pub index: u64,
    /// Plaintext offset of the first payload byte.
    pub offset: u64,
    /// The payload.
    pub payload: Vec<u8>,
}

/// Reads blocks one at a time, tracking position for error reports.
#[derive(Debug)]
pub struct BlockReader<R> {
    source: R,
    next_index: u64,
    offset: u64,
}

impl<R: Read> BlockReader<R> {
    /// Wraps a plaintext byte source.
    #[must_use]
    pub const fn new(source: R) -> Self {
        Self {
            source,
            next_index: 0,
            offset: 0,
        }
    }

    /// Number of complete blocks returned so far.
    #[must_use]
    pub const fn blocks_read(&self) -> u64 {
        self.next_index
    }

    /// Plaintext bytes consumed so far.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Borrows the underlying source.
    #[must_use]
    pub const fn get_ref(&self) -> &R {
        &self.source
    }

    /// Mutably borrows the underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    /// Reads the next block.
    ///
    /// Returns `Ok(None)` only when the source ends exactly on a block
    /// boundary.
    ///
    /// # Errors
    ///
    /// - [`BackupError::InvalidByteLengthDelimiter`] if the source ends inside
    ///   the length prefix, the prefix is longer than ten bytes, or the length
    ///   exceeds [`MAX_BLOCK_LEN`].
    /// - [`BackupError::TruncatedBlock`] if the source ends inside the payload.
    /// - Errors from the source, including integrity failures.
    pub fn next_block(&mut self) -> BackupResult<Option<Block>> {
        let delimiter_offset = self.offset;
        let Some(len) = self.read_delimiter()? else {
            return Ok(None);
        };
        if len > MAX_BLOCK_LEN {
            return Err(self.delimiter_error(
                delimiter_offset,
                format!("block length {len} exceeds the maximum of {MAX_BLOCK_LEN}"),
            ));
        }

        let payload_offset = self.offset;
        let mut payload = Vec::new();
        let read = (&mut self.source)
            .take(len)
            .read_to_end(&mut payload)
            .map_err(|err| read_error("reading block payload", err))?;
        self.offset += read as u64;
        if (read as u64) < len {
            return Err(BackupError::TruncatedBlock {
                block: self.next_index,
                offset: payload_offset,
                expected: len,
                available: read as u64,
            });
        }

        let block = Block {
            index: self.next_index,
            offset: payload_offset,
            payload,
        };
        self.next_index += 1;
        Ok(Some(block))
    }

    fn read_delimiter(&mut self) -> BackupResult<Option<u64>> {
        let start = self.offset;
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let Some(byte) = self.read_byte()? else {
                if i == 0 {
                    return Ok(None);
                }
                return Err(self.delimiter_error(
                    start,
                    "stream ended inside the length delimiter".to_string(),
                ));
            };
            if i == MAX_VARINT_LEN - 1 && byte > 0x01 {
                break;
            }
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(Some(value));
            }
        }
        Err(self.delimiter_error(
            start,
            "length delimiter is not a valid varint".to_string(),
        ))
    }

    fn read_byte(&mut self) -> BackupResult<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.source.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.offset += 1;
                    return Ok(Some(byte[0]));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(read_error("reading block delimiter", err)),
            }
        }
    }

    fn delimiter_error(&self, offset: u64, reason: String) -> BackupError {
        BackupError::InvalidByteLengthDelimiter {
            block: self.next_index,
            offset,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(payloads: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for payload in payloads {
            write_block(payload, &mut out).expect("write");
        }
        out
    }

    #[test]
    fn test_reads_blocks_with_positions() {
        let bytes = blocks(&[b"abc", b"", b"defg"]);
        let mut reader = BlockReader::new(bytes.as_slice());

        let first = reader.next_block().expect("read").expect("block");
        assert_eq!((first.index, first.offset), (0, 1));
        assert_eq!(first.payload, b"abc");

        let empty = reader.next_block().expect("read").expect("block");
        assert_eq!((empty.index, empty.offset), (1, 5));
        assert!(empty.payload.is_empty());

        let last = reader.next_block().expect("read").expect("block");
        assert_eq!(last.payload, b"defg");

        assert!(reader.next_block().expect("eof").is_none());
        assert_eq!(reader.blocks_read(), 3);
        assert_eq!(reader.offset(), bytes.len() as u64);
    }

    #[test]
    fn test_truncated_payload() {
        let mut bytes = blocks(&[b"hello world"]);
        bytes.truncate(bytes.len() - 3);
        let err = BlockReader::new(bytes.as_slice())
            .next_block()
            .expect_err("truncated");
        assert!(matches!(
            err,
            BackupError::TruncatedBlock {
                block: 0,
                offset: 1,
                expected: 11,
                available: 8,
            }
        ));
    }

    #[test]
    fn test_truncated_delimiter() {
        let bytes = [0x80u8, 0x80];
        let err = BlockReader::new(&bytes[..])
            .next_block()
            .expect_err("truncated delimiter");
        assert!(matches!(
            err,
            BackupError::InvalidByteLengthDelimiter { block: 0, offset: 0, .. }
        ));
    }

    #[test]
    fn test_oversized_and_overlong_delimiters() {
        let mut oversized = Vec::new();
        encode_varint(MAX_BLOCK_LEN + 1, &mut oversized);
        assert!(matches!(
            BlockReader::new(oversized.as_slice()).next_block(),
            Err(BackupError::InvalidByteLengthDelimiter { .. })
        ));

        let overlong = [0xffu8; 11];
        assert!(matches!(
            BlockReader::new(&overlong[..]).next_block(),
            Err(BackupError::InvalidByteLengthDelimiter { .. })
        ));
    }
}
