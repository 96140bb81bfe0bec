use serde::{Serialize, Serializer};

use super::wire::{wire_type_name, Field, WireType};

/// A field the decoder did not recognise, kept byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownField {
    /// Field number from the key.
    pub number: u32,
    /// Wire type from the key.
    #[serde(serialize_with = "serialize_wire_type")]
    pub wire_type: WireType,
    /// The complete encoded field, key included.
    #[serde(serialize_with = "super::hex_serde::serialize")]
    pub raw: Vec<u8>,
}

impl UnknownField {
    /// Captures a field read off the wire.
    #[must_use]
    pub fn from_field(field: &Field<'_>) -> Self {
        Self {
            number: field.number,
            wire_type: field.wire_type,
            raw: field.raw.to_vec(),
        }
    }
}

// serde hands `serialize_with` functions a reference
#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_wire_type<S: Serializer>(wire_type: &WireType, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(wire_type_name(*wire_type))
}

/// Unrecognised fields of one record, in wire order.
///
/// The set is never interpreted. On encode its fields are appended after the
/// known fields exactly as they were read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UnknownFieldSet {
    fields: Vec<UnknownField>,
}

impl UnknownFieldSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Appends a field.
    pub fn push(&mut self, field: UnknownField) {
        self.fields.push(field);
    }

    /// Iterates the fields in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &UnknownField> {
        self.fields.iter()
    }

    /// Returns `true` if no fields were retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of retained fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Total encoded size of the retained fields.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.fields.iter().map(|field| field.raw.len()).sum()
    }

    /// Appends the raw bytes of every retained field.
    pub fn encode(&self, out: &mut Vec<u8>) {
        for field in &self.fields {
            out.extend_from_slice(&field.raw);
        }
    }
}
