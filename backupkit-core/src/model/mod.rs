//! Backup records.
//!
//! Each record implements [`Message`] by hand. Field numbers are part of the
//! file format and must never be reused. Every record keeps the fields it does
//! not recognise, so a file written by a newer version survives a decode and
//! re-encode through this one.

/// Implements the unknown field accessors for a record with an
/// `unknown_fields` member.
macro_rules! unknown_fields_accessors {
    () => {
        fn unknown_fields(&self) -> &$crate::proto::UnknownFieldSet {
            &self.unknown_fields
        }

        fn unknown_fields_mut(&mut self) -> &mut $crate::proto::UnknownFieldSet {
            &mut self.unknown_fields
        }
    };
}

mod account;
mod call;
mod chat;
mod chat_item;
mod frame;
mod info;
mod recipient;
mod sticker;

pub use account::{AccountData, AccountSettings};
pub use call::{AdHocCall, CallState};
pub use chat::Chat;
pub use chat_item::{
    ChatItem, ChatItemContent, FilePointer, Reaction, RemoteDeletedMessage, StandardMessage,
};
pub use frame::{Frame, FrameItem, FrameKind};
pub use info::BackupInfo;
pub use recipient::{Contact, Destination, Group, Recipient, ReleaseNotes, SelfRecipient};
pub use sticker::StickerPack;

use crate::proto::{DecodeError, Field, Message};

/// Decodes a singular message field, merging into an existing value.
pub(crate) fn merge_optional<M: Message>(
    slot: &mut Option<M>,
    field: &Field<'_>,
) -> Result<(), DecodeError> {
    match slot {
        Some(existing) => field.merge_into(existing),
        None => {
            *slot = Some(field.as_message()?);
            Ok(())
        }
    }
}
