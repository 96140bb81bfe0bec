use serde::Serialize;

use crate::proto::{
    put_bool_if_set, put_uint32, put_uint64, put_uint64_if_set, DecodeError, Field, Message,
    UnknownFieldSet,
};

/// A conversation with one recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Chat {
    /// Backup-scoped chat id.
    pub id: u64,
    /// Id of the [`Recipient`](super::Recipient) this chat is with.
    pub recipient_id: u64,
    /// Moved out of the main chat list.
    pub archived: bool,
    /// Position in the pinned list, if pinned.
    pub pinned_order: Option<u32>,
    /// Disappearing timer for new messages.
    pub expiration_timer_ms: Option<u64>,
    /// Absolute mute deadline. `u64::MAX` means muted forever.
    pub mute_until_ms: Option<u64>,
    /// Manually marked unread.
    pub mark_unread: bool,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl Message for Chat {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        put_uint64_if_set(1, self.id, out);
        put_uint64_if_set(2, self.recipient_id, out);
        put_bool_if_set(3, self.archived, out);
        if let Some(order) = self.pinned_order {
            put_uint32(4, order, out);
        }
        if let Some(timer) = self.expiration_timer_ms {
            put_uint64(5, timer, out);
        }
        if let Some(until) = self.mute_until_ms {
            put_uint64(6, until, out);
        }
        put_bool_if_set(7, self.mark_unread, out);
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => self.id = field.as_u64()?,
            2 => self.recipient_id = field.as_u64()?,
            3 => self.archived = field.as_bool()?,
            4 => self.pinned_order = Some(field.as_u32()?),
            5 => self.expiration_timer_ms = Some(field.as_u64()?),
            6 => self.mute_until_ms = Some(field.as_u64()?),
            7 => self.mark_unread = field.as_bool()?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}
