use serde::Serialize;
use strum::Display;

use super::{AccountData, AdHocCall, Chat, ChatItem, Recipient, StickerPack};
use crate::proto::{put_message, DecodeError, Field, Message, UnknownFieldSet};

/// One record following the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// The record this frame carries.
    pub item: FrameItem,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

/// The `item` oneof of [`Frame`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameItem {
    /// The local account.
    Account(AccountData),
    /// A contact, group, self or release notes entry.
    Recipient(Recipient),
    /// A conversation.
    Chat(Chat),
    /// A message in a chat.
    ChatItem(ChatItem),
    /// An installed sticker pack.
    StickerPack(StickerPack),
    /// A call placed outside any chat.
    AdHocCall(AdHocCall),
    /// A frame kind added after this version. Its payload is in the frame's
    /// unknown fields and is passed through untouched.
    #[default]
    Unrecognized,
}

/// Discriminant of [`FrameItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FrameKind {
    /// [`FrameItem::Account`].
    Account,
    /// [`FrameItem::Recipient`].
    Recipient,
    /// [`FrameItem::Chat`].
    Chat,
    /// [`FrameItem::ChatItem`].
    ChatItem,
    /// [`FrameItem::StickerPack`].
    StickerPack,
    /// [`FrameItem::AdHocCall`].
    AdHocCall,
    /// [`FrameItem::Unrecognized`].
    Unrecognized,
}

impl Frame {
    /// Wraps an item in a frame with no unknown fields.
    #[must_use]
    pub const fn new(item: FrameItem) -> Self {
        Self {
            item,
            unknown_fields: UnknownFieldSet::new(),
        }
    }

    /// Which kind of record this frame carries.
    #[must_use]
    pub const fn kind(&self) -> FrameKind {
        match self.item {
            FrameItem::Account(_) => FrameKind::Account,
            FrameItem::Recipient(_) => FrameKind::Recipient,
            FrameItem::Chat(_) => FrameKind::Chat,
            FrameItem::ChatItem(_) => FrameKind::ChatItem,
            FrameItem::StickerPack(_) => FrameKind::StickerPack,
            FrameItem::AdHocCall(_) => FrameKind::AdHocCall,
            FrameItem::Unrecognized => FrameKind::Unrecognized,
        }
    }
}

macro_rules! frame_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Frame {
                fn from(value: $ty) -> Self {
                    Self::new(FrameItem::$variant(value))
                }
            }
        )*
    };
}

frame_from!(
    Account(AccountData),
    Recipient(Recipient),
    Chat(Chat),
    ChatItem(ChatItem),
    StickerPack(StickerPack),
    AdHocCall(AdHocCall),
);

impl Message for Frame {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        match &self.item {
            FrameItem::Account(account) => put_message(1, account, out),
            FrameItem::Recipient(recipient) => put_message(2, recipient, out),
            FrameItem::Chat(chat) => put_message(3, chat, out),
            FrameItem::ChatItem(item) => put_message(4, item, out),
            FrameItem::StickerPack(pack) => put_message(5, pack, out),
            FrameItem::AdHocCall(call) => put_message(6, call, out),
            FrameItem::Unrecognized => {}
        }
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => match &mut self.item {
                FrameItem::Account(account) => field.merge_into(account)?,
                _ => self.item = FrameItem::Account(field.as_message()?),
            },
            2 => match &mut self.item {
                FrameItem::Recipient(recipient) => field.merge_into(recipient)?,
                _ => self.item = FrameItem::Recipient(field.as_message()?),
            },
            3 => match &mut self.item {
                FrameItem::Chat(chat) => field.merge_into(chat)?,
                _ => self.item = FrameItem::Chat(field.as_message()?),
            },
            4 => match &mut self.item {
                FrameItem::ChatItem(item) => field.merge_into(item)?,
                _ => self.item = FrameItem::ChatItem(field.as_message()?),
            },
            5 => match &mut self.item {
                FrameItem::StickerPack(pack) => field.merge_into(pack)?,
                _ => self.item = FrameItem::StickerPack(field.as_message()?),
            },
            6 => match &mut self.item {
                FrameItem::AdHocCall(call) => field.merge_into(call)?,
                _ => self.item = FrameItem::AdHocCall(field.as_message()?),
            },
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}
