use super::unknown::{UnknownField, UnknownFieldSet};
use super::wire::{Field, FieldReader};
use super::DecodeError;

/// A record that can be encoded to and decoded from the wire format.
///
/// Implementors handle their known fields; the provided methods take care of
/// framing and of routing everything else into the unknown field set.
pub trait Message: Default {
    /// Writes the known fields, in field-number order.
    fn encode_raw(&self, out: &mut Vec<u8>);

    /// Applies one field to `self`.
    ///
    /// Returns `Ok(false)` when the field number is not part of the schema so
    /// the caller can retain it.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when a known field has the wrong wire type
    /// or an invalid value.
    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError>;

    /// Fields retained from decoding.
    fn unknown_fields(&self) -> &UnknownFieldSet;

    /// Mutable access to the retained fields.
    fn unknown_fields_mut(&mut self) -> &mut UnknownFieldSet;

    /// Writes known fields followed by retained unknown fields.
    fn encode(&self, out: &mut Vec<u8>) {
        self.encode_raw(out);
        self.unknown_fields().encode(out);
    }

    /// Encodes into a fresh buffer.
    #[must_use]
    fn encode_to_vec(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    /// Merges an encoded message into `self`.
    ///
    /// # Errors
    ///
    /// Returns the first structural [`DecodeError`].
    fn merge(&mut self, buf: &[u8]) -> Result<(), DecodeError> {
        let mut reader = FieldReader::new(buf);
        while let Some(field) = reader.next_field()? {
            if !self.merge_field(&field)? {
                self.unknown_fields_mut().push(UnknownField::from_field(&field));
            }
        }
        Ok(())
    }

    /// Decodes a complete message.
    ///
    /// # Errors
    ///
    /// Returns the first structural [`DecodeError`].
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut message = Self::default();
        message.merge(buf)?;
        Ok(message)
    }
}
