//! Wire codec for backup records.
//!
//! Records use the protobuf wire format: every field is a varint key
//! (`field_number << 3 | wire_type`) followed by a value whose shape is given
//! by the wire type. The format is self-describing, which lets a decoder skip
//! fields it does not know about and keep their bytes.
//!
//! Varints and keys are handled by `prost::encoding`. Records implement
//! [`Message`] by hand instead of deriving `prost::Message` because every
//! record must carry the fields it did not recognise through a decode/encode
//! cycle unchanged. Those bytes live in an [`UnknownFieldSet`] attached to the
//! record and are appended verbatim after the known fields on encode.

mod error;
mod message;
mod unknown;
mod wire;

pub(crate) mod hex_serde;

pub use error::DecodeError;
pub use message::Message;
pub use unknown::{UnknownField, UnknownFieldSet};
pub use wire::{
    put_bool, put_bool_if_set, put_bytes, put_bytes_if_set, put_key, put_message, put_string,
    put_string_if_set, put_uint32, put_uint32_if_set, put_uint64, put_uint64_if_set, Field,
    FieldReader, FieldValue, WireType, MAX_VARINT_LEN,
};
