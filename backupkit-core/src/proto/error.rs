use thiserror::Error;

use super::wire::WireType;

/// Structural failures while decoding a record.
///
/// Offsets are relative to the start of the buffer handed to the decoder.
/// Unknown field numbers are never an error; they are kept in the record's
/// unknown field set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A varint ran past ten bytes, overflowed 64 bits or was cut short.
    #[error("invalid varint at offset {offset}")]
    InvalidVarint {
        /// Offset of the first varint byte.
        offset: usize,
    },

    /// The buffer ended before a value was complete.
    #[error("truncated {context} at offset {offset}: needed {needed} more bytes")]
    Truncated {
        /// What was being read.
        context: &'static str,
        /// Offset where the read started.
        offset: usize,
        /// Bytes still required.
        needed: usize,
    },

    /// A field key was not a valid varint, or carried wire type 6 or 7,
    /// field number 0 or a number above the protobuf maximum.
    #[error("invalid field key at offset {offset}: {source}")]
    InvalidKey {
        /// Offset of the key.
        offset: usize,
        /// What `prost` rejected.
        #[source]
        source: prost::DecodeError,
    },

    /// A known field arrived with a wire type its schema does not allow.
    #[error("field {field} has wire type {found:?}, expected {expected:?}")]
    WireTypeMismatch {
        /// Field number.
        field: u32,
        /// Wire type required by the schema.
        expected: WireType,
        /// Wire type found on the wire.
        found: WireType,
    },

    /// A string field did not contain valid UTF-8.
    #[error("field {field} is not valid UTF-8")]
    InvalidUtf8 {
        /// Field number.
        field: u32,
    },

    /// An end-group key appeared outside a group or closed the wrong group.
    #[error("unbalanced end group for field {field} at offset {offset}")]
    UnbalancedGroup {
        /// Field number of the end-group key.
        field: u32,
        /// Offset of the key.
        offset: usize,
    },

    /// A group was never closed, closed by the wrong field, nested too
    /// deeply, or held a malformed field.
    #[error("malformed group in field {field} at offset {offset}: {source}")]
    MalformedGroup {
        /// Field number of the group.
        field: u32,
        /// Offset of the group body.
        offset: usize,
        /// What `prost` rejected while skipping the body.
        #[source]
        source: prost::DecodeError,
    },

    /// A nested message field failed to decode.
    #[error("in field {field}: {source}")]
    Nested {
        /// Field number of the nested message.
        field: u32,
        /// The inner failure.
        #[source]
        source: Box<DecodeError>,
    },
}
