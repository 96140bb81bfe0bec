//! Data-store access interface.
//!
//! The orchestrator never talks to a database directly. It enumerates and
//! upserts entities through [`BackupStore`], which an application implements
//! over its own persistence layer. [`MemoryStore`] is the reference
//! implementation used by the tests and the command line tool.

mod memory;

pub use memory::MemoryStore;

use std::fmt;

use serde::Serialize;
use strum::Display;

use crate::error::BackupResult;
use crate::model::{
    AccountData, AdHocCall, Chat, ChatItem, Frame, FrameItem, FrameKind, Recipient, StickerPack,
};
use crate::proto::UnknownFieldSet;

/// The kinds of entity a store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// The local account.
    Account,
    /// Contacts, groups and other recipients.
    Recipient,
    /// Conversations.
    Chat,
    /// Messages.
    ChatItem,
    /// Sticker packs.
    StickerPack,
    /// Calls outside any chat.
    AdHocCall,
    /// Frames of a kind this version does not understand.
    Opaque,
}

impl EntityKind {
    /// Export order. Every kind comes after the kinds it references.
    pub const EXPORT_ORDER: [Self; 7] = [
        Self::Account,
        Self::Recipient,
        Self::Chat,
        Self::ChatItem,
        Self::StickerPack,
        Self::AdHocCall,
        Self::Opaque,
    ];
}

impl From<FrameKind> for EntityKind {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Account => Self::Account,
            FrameKind::Recipient => Self::Recipient,
            FrameKind::Chat => Self::Chat,
            FrameKind::ChatItem => Self::ChatItem,
            FrameKind::StickerPack => Self::StickerPack,
            FrameKind::AdHocCall => Self::AdHocCall,
            FrameKind::Unrecognized => Self::Opaque,
        }
    }
}

/// Store-assigned identifier of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LocalId(pub u64);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The record carried by an [`Entity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// See [`EntityKind::Account`].
    Account(AccountData),
    /// See [`EntityKind::Recipient`].
    Recipient(Recipient),
    /// See [`EntityKind::Chat`].
    Chat(Chat),
    /// See [`EntityKind::ChatItem`].
    ChatItem(ChatItem),
    /// See [`EntityKind::StickerPack`].
    StickerPack(StickerPack),
    /// See [`EntityKind::AdHocCall`].
    AdHocCall(AdHocCall),
    /// A frame passed through untouched, unknown fields and all.
    Opaque(Frame),
}

/// One stored entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// The record itself.
    pub record: Record,
    /// Unrecognised fields that sat on the frame next to a known record.
    pub frame_unknown_fields: UnknownFieldSet,
}

impl Entity {
    /// Wraps a record with no frame-level unknown fields.
    #[must_use]
    pub const fn new(record: Record) -> Self {
        Self {
            record,
            frame_unknown_fields: UnknownFieldSet::new(),
        }
    }

    /// Kind of this entity.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self.record {
            Record::Account(_) => EntityKind::Account,
            Record::Recipient(_) => EntityKind::Recipient,
            Record::Chat(_) => EntityKind::Chat,
            Record::ChatItem(_) => EntityKind::ChatItem,
            Record::StickerPack(_) => EntityKind::StickerPack,
            Record::AdHocCall(_) => EntityKind::AdHocCall,
            Record::Opaque(_) => EntityKind::Opaque,
        }
    }

    /// Converts a decoded frame into the entity it describes.
    #[must_use]
    pub fn from_frame(frame: Frame) -> Self {
        let record = match frame.item {
            FrameItem::Account(account) => Record::Account(account),
            FrameItem::Recipient(recipient) => Record::Recipient(recipient),
            FrameItem::Chat(chat) => Record::Chat(chat),
            FrameItem::ChatItem(item) => Record::ChatItem(item),
            FrameItem::StickerPack(pack) => Record::StickerPack(pack),
            FrameItem::AdHocCall(call) => Record::AdHocCall(call),
            FrameItem::Unrecognized => {
                return Self::new(Record::Opaque(Frame {
                    item: FrameItem::Unrecognized,
                    unknown_fields: frame.unknown_fields,
                }));
            }
        };
        Self {
            record,
            frame_unknown_fields: frame.unknown_fields,
        }
    }

    /// Builds the frame this entity is exported as.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        let item = match &self.record {
            Record::Account(account) => FrameItem::Account(account.clone()),
            Record::Recipient(recipient) => FrameItem::Recipient(recipient.clone()),
            Record::Chat(chat) => FrameItem::Chat(chat.clone()),
            Record::ChatItem(item) => FrameItem::ChatItem(item.clone()),
            Record::StickerPack(pack) => FrameItem::StickerPack(pack.clone()),
            Record::AdHocCall(call) => FrameItem::AdHocCall(call.clone()),
            Record::Opaque(frame) => return frame.clone(),
        };
        Frame {
            item,
            unknown_fields: self.frame_unknown_fields.clone(),
        }
    }
}

impl From<Record> for Entity {
    fn from(record: Record) -> Self {
        Self::new(record)
    }
}

macro_rules! entity_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Record {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }

            impl From<$ty> for Entity {
                fn from(value: $ty) -> Self {
                    Self::new(Record::$variant(value))
                }
            }
        )*
    };
}

entity_from!(
    Account(AccountData),
    Recipient(Recipient),
    Chat(Chat),
    ChatItem(ChatItem),
    StickerPack(StickerPack),
    AdHocCall(AdHocCall),
);

/// Access to the application's entities.
///
/// Import runs inside one unit of work: [`begin_import`] before the first
/// upsert, then exactly one of [`commit_import`] or [`rollback_import`].
/// After a rollback the store must look as if the import never started.
///
/// [`begin_import`]: BackupStore::begin_import
/// [`commit_import`]: BackupStore::commit_import
/// [`rollback_import`]: BackupStore::rollback_import
pub trait BackupStore {
    /// Calls `visitor` for every entity of `kind`, in a stable order.
    ///
    /// # Errors
    ///
    /// Store errors, or the first error returned by `visitor`.
    fn visit(
        &self,
        kind: EntityKind,
        visitor: &mut dyn FnMut(LocalId, &Entity) -> BackupResult<()>,
    ) -> BackupResult<()>;

    /// Number of entities of `kind`.
    ///
    /// # Errors
    ///
    /// Store errors.
    fn count(&self, kind: EntityKind) -> BackupResult<u64> {
        let mut count = 0;
        self.visit(kind, &mut |_, _| {
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }

    /// Inserts `entity`, or replaces the entity previously upserted under the
    /// same `backup_id` during this import. Returns the local id.
    ///
    /// Entities that own an id (recipients and chats) are stored under their
    /// local id; the store rewrites that field.
    ///
    /// # Errors
    ///
    /// Store errors.
    fn upsert(&mut self, backup_id: Option<u64>, entity: Entity) -> BackupResult<LocalId>;

    /// Local id of the entity upserted under `backup_id` during this import.
    fn resolve(&self, kind: EntityKind, backup_id: u64) -> Option<LocalId>;

    /// Starts an import unit of work.
    ///
    /// # Errors
    ///
    /// Store errors, including an import already in progress.
    fn begin_import(&mut self) -> BackupResult<()>;

    /// Makes the import's changes permanent.
    ///
    /// # Errors
    ///
    /// Store errors.
    fn commit_import(&mut self) -> BackupResult<()>;

    /// Discards every change made since [`BackupStore::begin_import`].
    ///
    /// # Errors
    ///
    /// Store errors.
    fn rollback_import(&mut self) -> BackupResult<()>;
}
