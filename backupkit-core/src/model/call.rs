use serde::{Serialize, Serializer};

use crate::proto::{put_uint64_if_set, DecodeError, Field, Message, UnknownFieldSet};

/// A call not tied to a chat (started from a call link).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdHocCall {
    /// Backup-scoped call id, unique per backup.
    pub call_id: u64,
    /// Id of the [`Recipient`](super::Recipient) the call was placed to.
    pub recipient_id: u64,
    /// How the call ended.
    pub state: CallState,
    /// Start time in epoch milliseconds.
    pub call_timestamp: u64,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

/// State of an [`AdHocCall`].
///
/// Values this version does not know are kept as [`CallState::Other`] so they
/// are written back unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallState {
    /// Wire value 0.
    #[default]
    Unknown,
    /// Wire value 1.
    Generic,
    /// Any other wire value.
    Other(u64),
}

impl CallState {
    /// Maps a wire value to a state.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        match value {
            0 => Self::Unknown,
            1 => Self::Generic,
            other => Self::Other(other),
        }
    }

    /// Returns the wire value.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        match self {
            Self::Unknown => 0,
            Self::Generic => 1,
            Self::Other(value) => value,
        }
    }
}

impl Serialize for CallState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unknown => serializer.serialize_str("unknown"),
            Self::Generic => serializer.serialize_str("generic"),
            Self::Other(value) => serializer.serialize_u64(*value),
        }
    }
}

impl Message for AdHocCall {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        put_uint64_if_set(1, self.call_id, out);
        put_uint64_if_set(2, self.recipient_id, out);
        put_uint64_if_set(3, self.state.as_raw(), out);
        put_uint64_if_set(4, self.call_timestamp, out);
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => self.call_id = field.as_u64()?,
            2 => self.recipient_id = field.as_u64()?,
            3 => self.state = CallState::from_raw(field.as_u64()?),
            4 => self.call_timestamp = field.as_u64()?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_call_state_is_preserved() {
        let call = AdHocCall {
            call_id: 77,
            recipient_id: 1,
            state: CallState::from_raw(9),
            call_timestamp: 1_700_000_000_000,
            unknown_fields: UnknownFieldSet::new(),
        };
        let decoded = AdHocCall::decode(&call.encode_to_vec()).expect("decode");
        assert_eq!(decoded.state, CallState::Other(9));
        assert_eq!(decoded.state.as_raw(), 9);
    }
}
