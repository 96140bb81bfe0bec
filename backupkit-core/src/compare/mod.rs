//! Canonical comparison of backups.
//!
//! Two backups are equivalent when their canonical forms are equal. The
//! canonical form is plain JSON, so a mismatch can be shown as a line diff of
//! the pretty-printed forms.

mod canonical;
pub mod diff;

pub use diff::{render_diff, DiffOptions};

use std::io::{Cursor, Read};
use std::path::Path;

use serde_json::Value;

use crate::error::BackupResult;
use crate::model::{BackupInfo, Frame};
use crate::stream::{verify_container, BackupReader, Integrity, StreamMode};

/// A fully decoded backup held for comparison.
#[derive(Debug, Clone)]
pub struct ComparableBackup {
    info: BackupInfo,
    frames: Vec<Frame>,
    integrity: Integrity,
    canonical: Value,
}

impl ComparableBackup {
    /// Builds a comparable backup from already decoded parts.
    #[must_use]
    pub fn from_parts(info: BackupInfo, frames: Vec<Frame>) -> Self {
        let canonical = canonical::canonicalize(&info, &frames);
        Self {
            info,
            frames,
            integrity: Integrity::Unauthenticated,
            canonical,
        }
    }

    /// Reads a whole stream, including the integrity check.
    ///
    /// # Errors
    ///
    /// Any reader error.
    pub fn read<R: Read>(reader: BackupReader<R>) -> BackupResult<Self> {
        let (info, mut frames) = reader.read_header()?;
        let mut collected = Vec::new();
        while let Some(frame) = frames.next_frame()? {
            collected.push(frame);
        }
        let integrity = frames.finish()?;
        let mut backup = Self::from_parts(info, collected);
        backup.integrity = integrity;
        Ok(backup)
    }

    /// Reads a backup held in memory.
    ///
    /// Like [`ComparableBackup::from_path`], an encrypted container is
    /// authenticated in full before anything is decoded.
    ///
    /// # Errors
    ///
    /// Container and tag errors, then any reader error.
    pub fn from_bytes(bytes: &[u8], mode: &StreamMode) -> BackupResult<Self> {
        if let StreamMode::Encrypted(keys) = mode {
            verify_container(&mut Cursor::new(bytes), keys)?;
        }
        Self::read(BackupReader::new(bytes, mode)?)
    }

    /// Reads a backup file.
    ///
    /// # Errors
    ///
    /// Any reader error.
    pub fn from_path(path: impl AsRef<Path>, mode: &StreamMode) -> BackupResult<Self> {
        Self::read(BackupReader::open(path, mode)?)
    }

    /// The header.
    #[must_use]
    pub const fn info(&self) -> &BackupInfo {
        &self.info
    }

    /// Frames in stream order.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Integrity status the stream ended with.
    #[must_use]
    pub const fn integrity(&self) -> Integrity {
        self.integrity
    }

    /// The canonical form.
    #[must_use]
    pub const fn canonical_value(&self) -> &Value {
        &self.canonical
    }

    /// The canonical form as pretty-printed JSON with sorted keys.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        // `Value` with string keys always serialises.
        serde_json::to_string_pretty(&self.canonical).unwrap_or_default()
    }

    /// JSON paths (`$.chats[0].unknown_fields`) of every record that carried
    /// unknown fields.
    #[must_use]
    pub fn unknown_field_paths(&self) -> Vec<String> {
        canonical::unknown_field_paths(&self.canonical)
    }

    /// Whether both backups have the same canonical form.
    #[must_use]
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }

    /// Line diff from `self` to `other`, or `None` if they are equivalent.
    #[must_use]
    pub fn diff(&self, other: &Self, options: &DiffOptions) -> Option<String> {
        if self.is_equivalent(other) {
            return None;
        }
        render_diff(&self.canonical_json(), &other.canonical_json(), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chat, ChatItem, Reaction, Recipient, StandardMessage, ChatItemContent};
    use crate::proto::{put_uint64, Message};

    fn backup(offset: u64) -> ComparableBackup {
        let info = BackupInfo {
            version: 1,
            backup_time_ms: 1_000,
            frame_count: Some(4),
            ..BackupInfo::default()
        };
        let frames = vec![
            Frame::from(Recipient {
                id: 1 + offset,
                ..Recipient::default()
            }),
            Frame::from(Recipient {
                id: 2 + offset,
                destination: crate::model::Destination::Group(crate::model::Group {
                    title: Some("friends".to_string()),
                    ..crate::model::Group::default()
                }),
                ..Recipient::default()
            }),
            Frame::from(Chat {
                id: 10 + offset,
                recipient_id: 2 + offset,
                ..Chat::default()
            }),
            Frame::from(ChatItem {
                chat_id: 10 + offset,
                author_id: 1 + offset,
                date_sent: 500,
                content: ChatItemContent::StandardMessage(StandardMessage {
                    text: Some("hi".to_string()),
                    reactions: vec![Reaction {
                        emoji: "🎉".to_string(),
                        author_id: 2 + offset,
                        ..Reaction::default()
                    }],
                    ..StandardMessage::default()
                }),
                ..ChatItem::default()
            }),
        ];
        ComparableBackup::from_parts(info, frames)
    }

    #[test]
    fn test_renumbered_backups_are_equivalent() {
        let a = backup(0);
        let b = backup(100);
        assert!(a.is_equivalent(&b));
        assert_eq!(a.diff(&b, &DiffOptions::default()), None);

        let json = a.canonical_json();
        assert!(json.contains("\"friends\""));
        assert!(!json.contains("recipient_id"));
    }

    #[test]
    fn test_frame_order_does_not_matter() {
        let a = backup(0);
        let mut frames = a.frames().to_vec();
        frames.swap(0, 1);
        let b = ComparableBackup::from_parts(a.info().clone(), frames);
        assert!(a.is_equivalent(&b));
    }

    #[test]
    fn test_content_change_shows_in_diff() {
        let a = backup(0);
        let mut frames = a.frames().to_vec();
        frames[1] = Frame::from(Recipient {
            id: 2,
            ..Recipient::default()
        });
        let b = ComparableBackup::from_parts(a.info().clone(), frames);
        let diff = a.diff(&b, &DiffOptions::default()).expect("differs");
        assert!(diff.starts_with("--- expected\n+++ actual\n"));
        assert!(diff.contains("friends"));
    }

    #[test]
    fn test_unknown_fields_are_surfaced() {
        let mut chat_bytes = Chat {
            id: 10,
            recipient_id: 1,
            ..Chat::default()
        }
        .encode_to_vec();
        put_uint64(77, 1, &mut chat_bytes);
        let chat = Chat::decode(&chat_bytes).expect("decode");

        let backup = ComparableBackup::from_parts(
            BackupInfo {
                version: 1,
                backup_time_ms: 1,
                ..BackupInfo::default()
            },
            vec![
                Frame::from(Recipient {
                    id: 1,
                    ..Recipient::default()
                }),
                Frame::from(chat),
            ],
        );
        assert_eq!(
            backup.unknown_field_paths(),
            vec!["$.chats[0].unknown_fields".to_string()]
        );
    }

    #[test]
    fn test_expired_items_are_not_compared() {
        let a = backup(0);
        let mut frames = a.frames().to_vec();
        frames.push(Frame::from(ChatItem {
            chat_id: 10,
            author_id: 1,
            expire_start_date: Some(100),
            expires_in_ms: Some(100),
            ..ChatItem::default()
        }));
        let b = ComparableBackup::from_parts(a.info().clone(), frames);
        assert!(a.is_equivalent(&b));
    }
}
