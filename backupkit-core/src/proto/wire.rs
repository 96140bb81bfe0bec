//! Field keys, scalar helpers and the field iterator.
//!
//! Varint and key handling comes from `prost::encoding`. What lives here is
//! the part prost's generated code does not give us: a reader that hands out
//! every field together with its exact encoded bytes, so unrecognised fields
//! can be kept and written back unchanged.

// Wire format code narrows varints on purpose (protobuf `uint32` semantics)
#![allow(clippy::cast_possible_truncation)]

use prost::encoding::{self, DecodeContext};
pub use prost::encoding::WireType;

use super::{DecodeError, Message};

/// Longest encoding of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Lower-case name used when a wire type is rendered in canonical output.
#[must_use]
pub(crate) const fn wire_type_name(wire_type: WireType) -> &'static str {
    match wire_type {
        WireType::Varint => "varint",
        WireType::SixtyFourBit => "fixed64",
        WireType::LengthDelimited => "length_delimited",
        WireType::StartGroup => "start_group",
        WireType::EndGroup => "end_group",
        WireType::ThirtyTwoBit => "fixed32",
    }
}

// =============================================================================
// Encoding helpers
// =============================================================================

/// Writes a field key.
pub fn put_key(field: u32, wire_type: WireType, out: &mut Vec<u8>) {
    encoding::encode_key(field, wire_type, out);
}

/// Writes a `uint64` field unconditionally.
pub fn put_uint64(field: u32, value: u64, out: &mut Vec<u8>) {
    encoding::uint64::encode(field, &value, out);
}

/// Writes a `uint64` field unless it holds the default value.
pub fn put_uint64_if_set(field: u32, value: u64, out: &mut Vec<u8>) {
    if value != 0 {
        put_uint64(field, value, out);
    }
}

/// Writes a `uint32` field unconditionally.
pub fn put_uint32(field: u32, value: u32, out: &mut Vec<u8>) {
    encoding::uint32::encode(field, &value, out);
}

/// Writes a `uint32` field unless it holds the default value.
pub fn put_uint32_if_set(field: u32, value: u32, out: &mut Vec<u8>) {
    if value != 0 {
        put_uint32(field, value, out);
    }
}

/// Writes a `bool` field unconditionally.
pub fn put_bool(field: u32, value: bool, out: &mut Vec<u8>) {
    encoding::bool::encode(field, &value, out);
}

/// Writes a `bool` field if it is `true`.
pub fn put_bool_if_set(field: u32, value: bool, out: &mut Vec<u8>) {
    if value {
        put_bool(field, value, out);
    }
}

/// Writes a `bytes` field unconditionally.
pub fn put_bytes(field: u32, value: &[u8], out: &mut Vec<u8>) {
    encoding::encode_key(field, WireType::LengthDelimited, out);
    encoding::encode_varint(value.len() as u64, out);
    out.extend_from_slice(value);
}

/// Writes a `bytes` field unless it is empty.
pub fn put_bytes_if_set(field: u32, value: &[u8], out: &mut Vec<u8>) {
    if !value.is_empty() {
        put_bytes(field, value, out);
    }
}

/// Writes a `string` field unconditionally.
pub fn put_string(field: u32, value: &str, out: &mut Vec<u8>) {
    put_bytes(field, value.as_bytes(), out);
}

/// Writes a `string` field unless it is empty.
pub fn put_string_if_set(field: u32, value: &str, out: &mut Vec<u8>) {
    put_bytes_if_set(field, value.as_bytes(), out);
}

/// Writes an embedded message field, including its unknown fields.
pub fn put_message<M: Message>(field: u32, message: &M, out: &mut Vec<u8>) {
    let body = message.encode_to_vec();
    put_bytes(field, &body, out);
}

// =============================================================================
// Decoding
// =============================================================================

/// A decoded field value, borrowing from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// Varint payload.
    Varint(u64),
    /// Fixed 8-byte payload.
    Fixed64(u64),
    /// Length-delimited payload.
    Bytes(&'a [u8]),
    /// Group body (everything between the start and end keys).
    Group(&'a [u8]),
    /// Fixed 4-byte payload.
    Fixed32(u32),
}

/// One field read off the wire.
#[derive(Debug, Clone, Copy)]
pub struct Field<'a> {
    /// Field number from the key.
    pub number: u32,
    /// Wire type from the key.
    pub wire_type: WireType,
    /// Decoded value.
    pub value: FieldValue<'a>,
    /// Exact bytes of the field, key included.
    pub raw: &'a [u8],
}

impl<'a> Field<'a> {
    fn mismatch(&self, expected: WireType) -> DecodeError {
        DecodeError::WireTypeMismatch {
            field: self.number,
            expected,
            found: self.wire_type,
        }
    }

    /// Reads a `uint64` value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::WireTypeMismatch`] unless the field is a varint.
    pub fn as_u64(&self) -> Result<u64, DecodeError> {
        match self.value {
            FieldValue::Varint(value) => Ok(value),
            _ => Err(self.mismatch(WireType::Varint)),
        }
    }

    /// Reads a `uint32` value, truncating like protobuf does.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::WireTypeMismatch`] unless the field is a varint.
    pub fn as_u32(&self) -> Result<u32, DecodeError> {
        self.as_u64().map(|value| value as u32)
    }

    /// Reads a `bool` value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::WireTypeMismatch`] unless the field is a varint.
    pub fn as_bool(&self) -> Result<bool, DecodeError> {
        self.as_u64().map(|value| value != 0)
    }

    /// Reads a `bytes` value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::WireTypeMismatch`] unless the field is length-delimited.
    pub fn as_bytes(&self) -> Result<&'a [u8], DecodeError> {
        match self.value {
            FieldValue::Bytes(bytes) => Ok(bytes),
            _ => Err(self.mismatch(WireType::LengthDelimited)),
        }
    }

    /// Reads a `string` value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::WireTypeMismatch`] unless the field is
    /// length-delimited, or [`DecodeError::InvalidUtf8`].
    pub fn as_string(&self) -> Result<String, DecodeError> {
        let bytes = self.as_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 {
            field: self.number,
        })
    }

    /// Decodes an embedded message.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::WireTypeMismatch`] unless the field is
    /// length-delimited, or the nested decode failure.
    pub fn as_message<M: Message>(&self) -> Result<M, DecodeError> {
        let mut message = M::default();
        self.merge_into(&mut message)?;
        Ok(message)
    }

    /// Merges an embedded message into `target` (protobuf semantics for a
    /// repeated occurrence of a singular message field).
    ///
    /// # Errors
    ///
    /// Same as [`Field::as_message`].
    pub fn merge_into<M: Message>(&self, target: &mut M) -> Result<(), DecodeError> {
        let bytes = self.as_bytes()?;
        target.merge(bytes).map_err(|source| DecodeError::Nested {
            field: self.number,
            source: Box::new(source),
        })
    }
}

/// Iterates the fields of one encoded message.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    /// Creates a reader over an encoded message body.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset into the buffer.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Reads the next field, or `None` at the end of the buffer.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for malformed keys, varints, truncated
    /// payloads or unbalanced groups.
    pub fn next_field(&mut self) -> Result<Option<Field<'a>>, DecodeError> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }
        let start = self.pos;
        let (number, wire_type) = self
            .advance(encoding::decode_key)
            .map_err(|source| DecodeError::InvalidKey {
                offset: start,
                source,
            })?;
        let value = match wire_type {
            WireType::Varint => FieldValue::Varint(self.read_varint()?),
            WireType::SixtyFourBit => {
                let mut le = [0u8; 8];
                le.copy_from_slice(self.take(8, "fixed64")?);
                FieldValue::Fixed64(u64::from_le_bytes(le))
            }
            WireType::ThirtyTwoBit => {
                let mut le = [0u8; 4];
                le.copy_from_slice(self.take(4, "fixed32")?);
                FieldValue::Fixed32(u32::from_le_bytes(le))
            }
            WireType::LengthDelimited => {
                let offset = self.pos;
                let len = usize::try_from(self.read_varint()?)
                    .map_err(|_| DecodeError::InvalidVarint { offset })?;
                FieldValue::Bytes(self.take(len, "length-delimited payload")?)
            }
            WireType::StartGroup => {
                let body_start = self.pos;
                self.advance(|rest| {
                    encoding::skip_field(WireType::StartGroup, number, rest, DecodeContext::default())
                })
                .map_err(|source| DecodeError::MalformedGroup {
                    field: number,
                    offset: body_start,
                    source,
                })?;
                let end_key = (u64::from(number) << 3) | WireType::EndGroup as u64;
                let body_end = self.pos - encoding::encoded_len_varint(end_key);
                FieldValue::Group(&self.buf[body_start..body_end])
            }
            WireType::EndGroup => {
                return Err(DecodeError::UnbalancedGroup {
                    field: number,
                    offset: start,
                });
            }
        };
        Ok(Some(Field {
            number,
            wire_type,
            value,
            raw: &self.buf[start..self.pos],
        }))
    }

    /// Runs a prost decoder over the unread bytes and moves past what it
    /// consumed.
    fn advance<T>(
        &mut self,
        decode: impl FnOnce(&mut &'a [u8]) -> Result<T, prost::DecodeError>,
    ) -> Result<T, prost::DecodeError> {
        let mut rest = &self.buf[self.pos..];
        let before = rest.len();
        let value = decode(&mut rest)?;
        self.pos += before - rest.len();
        Ok(value)
    }

    fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let offset = self.pos;
        self.advance(encoding::decode_varint)
            .map_err(|_| DecodeError::InvalidVarint { offset })
    }

    fn take(&mut self, len: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        let available = self.buf.len() - self.pos;
        if len > available {
            return Err(DecodeError::Truncated {
                context,
                offset: self.pos,
                needed: len - available,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_reader_walks_all_wire_types() {
        let mut buf = Vec::new();
        put_uint64(1, 150, &mut buf);
        put_string(2, "hi", &mut buf);
        put_key(3, WireType::ThirtyTwoBit, &mut buf);
        buf.extend_from_slice(&7u32.to_le_bytes());
        put_key(4, WireType::SixtyFourBit, &mut buf);
        buf.extend_from_slice(&9u64.to_le_bytes());
        put_key(5, WireType::StartGroup, &mut buf);
        put_uint64(1, 1, &mut buf);
        put_key(5, WireType::EndGroup, &mut buf);

        let mut reader = FieldReader::new(&buf);
        let first = reader.next_field().expect("field").expect("present");
        assert_eq!(first.number, 1);
        assert_eq!(first.as_u64().expect("u64"), 150);
        assert_eq!(first.raw, &[0x08, 0x96, 0x01]);

        let second = reader.next_field().expect("field").expect("present");
        assert_eq!(second.as_string().expect("string"), "hi");

        let third = reader.next_field().expect("field").expect("present");
        assert_eq!(third.value, FieldValue::Fixed32(7));

        let fourth = reader.next_field().expect("field").expect("present");
        assert_eq!(fourth.value, FieldValue::Fixed64(9));

        let group = reader.next_field().expect("field").expect("present");
        assert_eq!(group.wire_type, WireType::StartGroup);
        assert_eq!(group.value, FieldValue::Group(&[0x08, 0x01]));
        assert_eq!(reader.position(), buf.len());

        assert!(reader.next_field().expect("end").is_none());
    }

    #[test]
    fn test_group_with_large_field_number_excludes_end_key() {
        let mut buf = Vec::new();
        put_key(300, WireType::StartGroup, &mut buf);
        put_string(1, "x", &mut buf);
        put_key(300, WireType::EndGroup, &mut buf);

        let field = FieldReader::new(&buf)
            .next_field()
            .expect("field")
            .expect("present");
        assert_eq!(field.value, FieldValue::Group(&[0x0a, 0x01, b'x']));
        assert_eq!(field.raw, buf.as_slice());
    }

    #[test]
    fn test_wire_type_mismatch_is_reported() {
        let mut buf = Vec::new();
        put_string(1, "not a number", &mut buf);
        let field = FieldReader::new(&buf)
            .next_field()
            .expect("field")
            .expect("present");
        assert_eq!(
            field.as_u64(),
            Err(DecodeError::WireTypeMismatch {
                field: 1,
                expected: WireType::Varint,
                found: WireType::LengthDelimited,
            })
        );
        assert!(field.as_u32().is_err());
        assert!(field.as_bool().is_err());
    }

    #[test]
    fn test_truncated_payload() {
        let mut buf = Vec::new();
        put_bytes(1, &[1, 2, 3, 4], &mut buf);
        buf.truncate(buf.len() - 2);
        let result = FieldReader::new(&buf).next_field();
        assert!(matches!(
            result,
            Err(DecodeError::Truncated { needed: 2, .. })
        ));
    }

    #[test]
    fn test_bad_varints() {
        // Eleven continuation bytes.
        let mut overlong = vec![0x08];
        overlong.extend_from_slice(&[0xff; 11]);
        assert_eq!(
            FieldReader::new(&overlong).next_field().map(|_| ()),
            Err(DecodeError::InvalidVarint { offset: 1 })
        );
        // Ends mid-varint.
        assert!(matches!(
            FieldReader::new(&[0x08, 0x80, 0x80]).next_field(),
            Err(DecodeError::InvalidVarint { offset: 1 })
        ));
    }

    #[test]
    fn test_invalid_keys() {
        // Wire type 7.
        assert!(matches!(
            FieldReader::new(&[0x0f, 0x00]).next_field(),
            Err(DecodeError::InvalidKey { offset: 0, .. })
        ));
        // Field number 0.
        assert!(matches!(
            FieldReader::new(&[0x00, 0x00]).next_field(),
            Err(DecodeError::InvalidKey { offset: 0, .. })
        ));
        // Stray end group.
        assert!(matches!(
            FieldReader::new(&[0x0c]).next_field(),
            Err(DecodeError::UnbalancedGroup { field: 1, .. })
        ));
    }

    #[test]
    fn test_malformed_groups() {
        // Never closed.
        let mut open = Vec::new();
        put_key(2, WireType::StartGroup, &mut open);
        put_uint64(1, 1, &mut open);
        assert!(matches!(
            FieldReader::new(&open).next_field(),
            Err(DecodeError::MalformedGroup { field: 2, .. })
        ));

        // Closed by the wrong field number.
        let mut crossed = Vec::new();
        put_key(2, WireType::StartGroup, &mut crossed);
        put_key(3, WireType::EndGroup, &mut crossed);
        assert!(matches!(
            FieldReader::new(&crossed).next_field(),
            Err(DecodeError::MalformedGroup { field: 2, .. })
        ));
    }

    #[test]
    fn test_wire_type_names() {
        assert_eq!(wire_type_name(WireType::Varint), "varint");
        assert_eq!(wire_type_name(WireType::ThirtyTwoBit), "fixed32");
    }
}
