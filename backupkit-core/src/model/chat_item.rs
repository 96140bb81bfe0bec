use serde::Serialize;

use crate::proto::{
    put_bool_if_set, put_bytes, put_message, put_string, put_string_if_set, put_uint32,
    put_uint64, put_uint64_if_set, DecodeError, Field, Message, UnknownFieldSet,
};

/// One entry in a chat's timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatItem {
    /// Id of the owning [`Chat`](super::Chat).
    pub chat_id: u64,
    /// Id of the [`Recipient`](super::Recipient) who wrote it.
    pub author_id: u64,
    /// Send time in epoch milliseconds.
    pub date_sent: u64,
    /// When the disappearing timer started, in epoch milliseconds.
    pub expire_start_date: Option<u64>,
    /// Disappearing timer length.
    pub expires_in_ms: Option<u64>,
    /// Sent over SMS instead of the messaging service.
    pub sms: bool,
    /// The message body.
    pub content: ChatItemContent,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl ChatItem {
    /// When a disappearing message stops existing, if it is one.
    #[must_use]
    pub fn expires_at(&self) -> Option<u64> {
        let start = self.expire_start_date?;
        let ttl = self.expires_in_ms?;
        Some(start.saturating_add(ttl))
    }

    /// Whether the item had already disappeared at `now_ms`.
    #[must_use]
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expires_at().is_some_and(|at| at <= now_ms)
    }
}

/// The `item` oneof of [`ChatItem`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatItemContent {
    /// Text, attachments and reactions.
    StandardMessage(StandardMessage),
    /// A message the sender deleted for everyone.
    RemoteDeletedMessage(RemoteDeletedMessage),
    /// No content this version knows about; the payload is in the item's
    /// unknown fields.
    #[default]
    Unrecognized,
}

impl Message for ChatItem {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        put_uint64_if_set(1, self.chat_id, out);
        put_uint64_if_set(2, self.author_id, out);
        put_uint64_if_set(3, self.date_sent, out);
        if let Some(start) = self.expire_start_date {
            put_uint64(4, start, out);
        }
        if let Some(ttl) = self.expires_in_ms {
            put_uint64(5, ttl, out);
        }
        put_bool_if_set(6, self.sms, out);
        match &self.content {
            ChatItemContent::StandardMessage(message) => put_message(7, message, out),
            ChatItemContent::RemoteDeletedMessage(deleted) => put_message(8, deleted, out),
            ChatItemContent::Unrecognized => {}
        }
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => self.chat_id = field.as_u64()?,
            2 => self.author_id = field.as_u64()?,
            3 => self.date_sent = field.as_u64()?,
            4 => self.expire_start_date = Some(field.as_u64()?),
            5 => self.expires_in_ms = Some(field.as_u64()?),
            6 => self.sms = field.as_bool()?,
            7 => match &mut self.content {
                ChatItemContent::StandardMessage(message) => field.merge_into(message)?,
                _ => self.content = ChatItemContent::StandardMessage(field.as_message()?),
            },
            8 => match &mut self.content {
                ChatItemContent::RemoteDeletedMessage(deleted) => field.merge_into(deleted)?,
                _ => self.content = ChatItemContent::RemoteDeletedMessage(field.as_message()?),
            },
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}

/// A regular text/attachment message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StandardMessage {
    /// Message text, if any.
    pub text: Option<String>,
    /// Attached files, in send order.
    pub attachments: Vec<FilePointer>,
    /// Reactions, in sort order.
    pub reactions: Vec<Reaction>,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl Message for StandardMessage {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        if let Some(text) = &self.text {
            put_string(1, text, out);
        }
        for attachment in &self.attachments {
            put_message(2, attachment, out);
        }
        for reaction in &self.reactions {
            put_message(3, reaction, out);
        }
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => self.text = Some(field.as_string()?),
            2 => self.attachments.push(field.as_message()?),
            3 => self.reactions.push(field.as_message()?),
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}

/// Attachment metadata. The attachment bytes themselves are not part of the
/// backup stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilePointer {
    /// MIME type.
    pub content_type: Option<String>,
    /// Original file name.
    pub file_name: Option<String>,
    /// Plaintext size in bytes.
    pub size: Option<u64>,
    /// Digest of the encrypted attachment.
    #[serde(serialize_with = "crate::proto::hex_serde::option::serialize")]
    pub digest: Option<Vec<u8>>,
    /// Pixel width for images and video.
    pub width: Option<u32>,
    /// Pixel height for images and video.
    pub height: Option<u32>,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl Message for FilePointer {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        if let Some(content_type) = &self.content_type {
            put_string(1, content_type, out);
        }
        if let Some(name) = &self.file_name {
            put_string(2, name, out);
        }
        if let Some(size) = self.size {
            put_uint64(3, size, out);
        }
        if let Some(digest) = &self.digest {
            put_bytes(4, digest, out);
        }
        if let Some(width) = self.width {
            put_uint32(5, width, out);
        }
        if let Some(height) = self.height {
            put_uint32(6, height, out);
        }
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => self.content_type = Some(field.as_string()?),
            2 => self.file_name = Some(field.as_string()?),
            3 => self.size = Some(field.as_u64()?),
            4 => self.digest = Some(field.as_bytes()?.to_vec()),
            5 => self.width = Some(field.as_u32()?),
            6 => self.height = Some(field.as_u32()?),
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}

/// An emoji reaction on a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reaction {
    /// The reaction emoji.
    pub emoji: String,
    /// Id of the reacting [`Recipient`](super::Recipient).
    pub author_id: u64,
    /// When the reaction was sent, in epoch milliseconds.
    pub sent_timestamp: u64,
    /// Display position among the reactions on one message.
    pub sort_order: u64,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl Message for Reaction {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        put_string_if_set(1, &self.emoji, out);
        put_uint64_if_set(2, self.author_id, out);
        put_uint64_if_set(3, self.sent_timestamp, out);
        put_uint64_if_set(4, self.sort_order, out);
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => self.emoji = field.as_string()?,
            2 => self.author_id = field.as_u64()?,
            3 => self.sent_timestamp = field.as_u64()?,
            4 => self.sort_order = field.as_u64()?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}

/// Placeholder left behind by a delete-for-everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteDeletedMessage {
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl Message for RemoteDeletedMessage {
    fn encode_raw(&self, _out: &mut Vec<u8>) {}

    fn merge_field(&mut self, _field: &Field<'_>) -> Result<bool, DecodeError> {
        Ok(false)
    }

    unknown_fields_accessors!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_uses_given_clock() {
        let item = ChatItem {
            expire_start_date: Some(1_000),
            expires_in_ms: Some(500),
            ..ChatItem::default()
        };
        assert_eq!(item.expires_at(), Some(1_500));
        assert!(!item.is_expired_at(1_499));
        assert!(item.is_expired_at(1_500));

        let forever = ChatItem {
            expire_start_date: Some(u64::MAX - 1),
            expires_in_ms: Some(10),
            ..ChatItem::default()
        };
        assert_eq!(forever.expires_at(), Some(u64::MAX));

        assert!(!ChatItem::default().is_expired_at(u64::MAX));
    }

    #[test]
    fn test_repeated_fields_keep_order() {
        let message = StandardMessage {
            text: Some(String::new()),
            attachments: vec![
                FilePointer {
                    file_name: Some("a.jpg".to_string()),
                    ..FilePointer::default()
                },
                FilePointer {
                    file_name: Some("b.jpg".to_string()),
                    width: Some(0),
                    ..FilePointer::default()
                },
            ],
            reactions: vec![Reaction {
                emoji: "👍".to_string(),
                author_id: 2,
                ..Reaction::default()
            }],
            unknown_fields: UnknownFieldSet::new(),
        };
        let decoded = StandardMessage::decode(&message.encode_to_vec()).expect("decode");
        assert_eq!(decoded, message);
    }
}
