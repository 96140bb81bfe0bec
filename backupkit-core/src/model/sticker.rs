use serde::Serialize;

use crate::proto::{put_bytes_if_set, DecodeError, Field, Message, UnknownFieldSet};

/// An installed sticker pack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StickerPack {
    /// Pack id, 16 bytes.
    #[serde(serialize_with = "crate::proto::hex_serde::serialize")]
    pub pack_id: Vec<u8>,
    /// Pack decryption key, 32 bytes.
    #[serde(serialize_with = "crate::proto::hex_serde::serialize")]
    pub pack_key: Vec<u8>,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl Message for StickerPack {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        put_bytes_if_set(1, &self.pack_id, out);
        put_bytes_if_set(2, &self.pack_key, out);
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => self.pack_id = field.as_bytes()?.to_vec(),
            2 => self.pack_key = field.as_bytes()?.to_vec(),
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}
