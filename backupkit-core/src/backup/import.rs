use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use super::options::ImportOptions;
use crate::error::{BackupError, BackupResult};
use crate::model::{BackupInfo, ChatItemContent, Frame};
use crate::store::{BackupStore, Entity, EntityKind, Record};
use crate::stream::{BackupReader, Integrity, StreamMode};

/// Counts from a finished import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Frames read after the header.
    pub frames_read: u64,
    /// Entities written to the store per kind.
    pub imported: BTreeMap<EntityKind, u64>,
    /// Disappearing messages dropped because they had expired at
    /// `backup_time_ms`.
    pub expired_items_skipped: u64,
    /// Frames of an unknown kind stored for pass-through.
    pub opaque_frames: u64,
    /// Outcome of the integrity check.
    pub integrity: Integrity,
}

impl Default for ImportStats {
    fn default() -> Self {
        Self {
            frames_read: 0,
            imported: BTreeMap::new(),
            expired_items_skipped: 0,
            opaque_frames: 0,
            integrity: Integrity::Unauthenticated,
        }
    }
}

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// The backup's header.
    pub info: BackupInfo,
    /// Per-kind counts.
    pub stats: ImportStats,
}

/// Restores a backup stream into a store.
///
/// Frames are applied in stream order inside one store unit of work. The
/// header's `backup_time_ms` is the only clock consulted. Any error, including
/// a tag mismatch detected after the last frame, rolls the store back. When an
/// encrypted stream is abandoned early, the tag over the rest of it is checked
/// and a mismatch is reported in place of the error that stopped the import.
pub struct Importer<'a, S: BackupStore + ?Sized> {
    store: &'a mut S,
    options: ImportOptions,
    account_seen: bool,
}

impl<'a, S: BackupStore + ?Sized> Importer<'a, S> {
    /// Creates an importer writing into `store`.
    pub fn new(store: &'a mut S, options: ImportOptions) -> Self {
        Self {
            store,
            options,
            account_seen: false,
        }
    }

    /// Imports the whole stream.
    ///
    /// # Errors
    ///
    /// - Header, block, frame and integrity errors from the reader.
    /// - [`BackupError::MissingHeaderField`] if `backup_time_ms` is zero.
    /// - [`BackupError::UnexpectedFrame`] for a second account frame.
    /// - [`BackupError::DuplicateId`] for a repeated recipient, chat or call id.
    /// - [`BackupError::UnknownReference`] for a reference to an id that was
    ///   not imported earlier in the stream.
    /// - [`BackupError::FrameCountMismatch`] if enabled and the header's count
    ///   is wrong.
    /// - Store errors.
    pub fn import<R: Read>(&mut self, reader: BackupReader<R>) -> BackupResult<ImportSummary> {
        self.account_seen = false;
        self.store.begin_import()?;
        match self.run(reader) {
            Ok(summary) => {
                self.store.commit_import()?;
                log::info!(
                    "imported backup: {} frames, {} expired items skipped",
                    summary.stats.frames_read,
                    summary.stats.expired_items_skipped
                );
                Ok(summary)
            }
            Err(err) => {
                log::warn!("import failed, rolling back: {err}");
                if let Err(rollback) = self.store.rollback_import() {
                    log::error!("rollback after failed import also failed: {rollback}");
                }
                Err(err)
            }
        }
    }

    fn run<R: Read>(&mut self, reader: BackupReader<R>) -> BackupResult<ImportSummary> {
        let (info, mut frames) = reader.read_header()?;
        if info.backup_time_ms == 0 {
            return Err(frames.reject(BackupError::MissingHeaderField {
                field: "backup_time_ms",
            }));
        }
        if !self.options.verify_frame_count {
            frames.skip_frame_count_check();
        }

        let mut stats = ImportStats::default();
        while let Some(frame) = frames.next_frame()? {
            stats.frames_read += 1;
            self.apply(frame, &info, &mut stats)
                .map_err(|err| frames.reject(err))?;
        }
        stats.integrity = frames.finish()?;

        Ok(ImportSummary { info, stats })
    }

    fn apply(&mut self, frame: Frame, info: &BackupInfo, stats: &mut ImportStats) -> BackupResult<()> {
        let mut entity = Entity::from_frame(frame);
        let kind = entity.kind();
        let backup_id = match &mut entity.record {
            Record::Account(_) => {
                if self.account_seen {
                    return Err(BackupError::UnexpectedFrame {
                        kind,
                        reason: "backup contains more than one account frame".to_string(),
                    });
                }
                self.account_seen = true;
                None
            }
            Record::Recipient(recipient) => {
                self.ensure_new(kind, recipient.id)?;
                Some(recipient.id)
            }
            Record::Chat(chat) => {
                self.ensure_new(kind, chat.id)?;
                chat.recipient_id = self.local(kind, EntityKind::Recipient, chat.recipient_id)?;
                Some(chat.id)
            }
            Record::ChatItem(item) => {
                item.chat_id = self.local(kind, EntityKind::Chat, item.chat_id)?;
                item.author_id = self.local(kind, EntityKind::Recipient, item.author_id)?;
                if let ChatItemContent::StandardMessage(message) = &mut item.content {
                    for reaction in &mut message.reactions {
                        reaction.author_id =
                            self.local(kind, EntityKind::Recipient, reaction.author_id)?;
                    }
                }
                if self.options.skip_expired_items && item.is_expired_at(info.backup_time_ms) {
                    stats.expired_items_skipped += 1;
                    return Ok(());
                }
                None
            }
            Record::AdHocCall(call) => {
                self.ensure_new(kind, call.call_id)?;
                call.recipient_id = self.local(kind, EntityKind::Recipient, call.recipient_id)?;
                Some(call.call_id)
            }
            Record::StickerPack(_) => None,
            Record::Opaque(_) => {
                stats.opaque_frames += 1;
                None
            }
        };

        self.store.upsert(backup_id, entity)?;
        *stats.imported.entry(kind).or_default() += 1;
        Ok(())
    }

    fn ensure_new(&self, kind: EntityKind, id: u64) -> BackupResult<()> {
        if self.store.resolve(kind, id).is_some() {
            return Err(BackupError::DuplicateId { kind, id });
        }
        Ok(())
    }

    fn local(&self, referrer: EntityKind, kind: EntityKind, id: u64) -> BackupResult<u64> {
        self.store
            .resolve(kind, id)
            .map(|local| local.0)
            .ok_or(BackupError::UnknownReference { referrer, kind, id })
    }
}

/// Imports the backup file at `path` into `store`.
///
/// Encrypted files are authenticated in full before the first frame is
/// applied.
///
/// # Errors
///
/// See [`BackupReader::open`] and [`Importer::import`].
pub fn import_from_path<S: BackupStore + ?Sized>(
    store: &mut S,
    path: impl AsRef<Path>,
    mode: &StreamMode,
    options: ImportOptions,
) -> BackupResult<ImportSummary> {
    let reader = BackupReader::open(path, mode)?;
    Importer::new(store, options).import(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chat, ChatItem, Recipient};
    use crate::store::MemoryStore;
    use crate::stream::BackupWriter;

    const NOW: u64 = 1_700_000_000_000;

    fn stream(frames: Vec<Frame>) -> Vec<u8> {
        let info = BackupInfo {
            version: 1,
            backup_time_ms: NOW,
            ..BackupInfo::default()
        };
        let mut writer = BackupWriter::new(Vec::new(), &StreamMode::Plaintext)
            .expect("writer")
            .write_header(&info)
            .expect("header");
        for frame in &frames {
            writer.write_frame(frame).expect("frame");
        }
        writer.finalize().expect("finalize")
    }

    fn import(store: &mut MemoryStore, bytes: &[u8]) -> BackupResult<ImportSummary> {
        let reader = BackupReader::new(bytes, &StreamMode::Plaintext)?;
        Importer::new(store, ImportOptions::default()).import(reader)
    }

    fn recipient(id: u64) -> Frame {
        Frame::from(Recipient {
            id,
            ..Recipient::default()
        })
    }

    fn chat(id: u64, recipient_id: u64) -> Frame {
        Frame::from(Chat {
            id,
            recipient_id,
            ..Chat::default()
        })
    }

    #[test]
    fn test_references_are_rewritten_to_local_ids() {
        let bytes = stream(vec![recipient(500), chat(900, 500)]);
        let mut store = MemoryStore::new();
        let summary = import(&mut store, &bytes).expect("import");
        assert_eq!(summary.stats.frames_read, 2);

        let (_, entity) = store
            .entities(EntityKind::Chat)
            .next()
            .expect("chat imported");
        let Record::Chat(chat) = &entity.record else {
            panic!("expected chat");
        };
        assert_eq!(chat.recipient_id, 1);
        assert_eq!(chat.id, 1);
    }

    #[test]
    fn test_unknown_reference_rolls_back() {
        let bytes = stream(vec![recipient(1), chat(1, 2)]);
        let mut store = MemoryStore::new();
        let err = import(&mut store, &bytes).expect_err("unknown reference");
        assert!(matches!(
            err,
            BackupError::UnknownReference {
                referrer: EntityKind::Chat,
                kind: EntityKind::Recipient,
                id: 2,
            }
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_tag_mismatch_outranks_semantic_error() {
        let mode = StreamMode::Encrypted(crate::keys::BackupKeys::from_bytes([1; 32], [2; 32]));
        let info = BackupInfo {
            version: 1,
            backup_time_ms: NOW,
            ..BackupInfo::default()
        };
        let mut writer = BackupWriter::new(Vec::new(), &mode)
            .expect("writer")
            .write_header(&info)
            .expect("header");
        for frame in [recipient(1), chat(1, 2), recipient(3)] {
            writer.write_frame(&frame).expect("frame");
        }
        let intact = writer.finalize().expect("finalize");

        let mut store = MemoryStore::new();
        let reader = BackupReader::new(intact.as_slice(), &mode).expect("reader");
        let err = Importer::new(&mut store, ImportOptions::default())
            .import(reader)
            .expect_err("unknown reference");
        assert!(matches!(err, BackupError::UnknownReference { id: 2, .. }), "{err}");

        let mut tampered = intact;
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        let reader = BackupReader::new(tampered.as_slice(), &mode).expect("reader");
        let err = Importer::new(&mut store, ImportOptions::default())
            .import(reader)
            .expect_err("tampered");
        assert!(matches!(err, BackupError::HmacValidationFailed), "{err}");
        assert!(store.is_empty());
        assert!(!store.in_import());
    }

    #[test]
    fn test_duplicate_recipient_id() {
        let bytes = stream(vec![recipient(1), recipient(1)]);
        let mut store = MemoryStore::new();
        assert!(matches!(
            import(&mut store, &bytes),
            Err(BackupError::DuplicateId {
                kind: EntityKind::Recipient,
                id: 1
            })
        ));
    }

    #[test]
    fn test_second_account_is_rejected() {
        let account = Frame::from(crate::model::AccountData::default());
        let bytes = stream(vec![account.clone(), account]);
        let mut store = MemoryStore::new();
        assert!(matches!(
            import(&mut store, &bytes),
            Err(BackupError::UnexpectedFrame {
                kind: EntityKind::Account,
                ..
            })
        ));
    }

    #[test]
    fn test_expiry_is_judged_against_backup_time() {
        let expired = ChatItem {
            chat_id: 1,
            author_id: 1,
            date_sent: NOW - 10_000,
            expire_start_date: Some(NOW - 10_000),
            expires_in_ms: Some(5_000),
            ..ChatItem::default()
        };
        let alive = ChatItem {
            expires_in_ms: Some(60_000),
            ..expired.clone()
        };
        let bytes = stream(vec![
            recipient(1),
            chat(1, 1),
            Frame::from(expired),
            Frame::from(alive),
        ]);
        let mut store = MemoryStore::new();
        let summary = import(&mut store, &bytes).expect("import");
        assert_eq!(summary.stats.expired_items_skipped, 1);
        assert_eq!(store.count(EntityKind::ChatItem).expect("count"), 1);
    }

    #[test]
    fn test_zero_backup_time_is_rejected() {
        let mut bytes = Vec::new();
        crate::stream::write_block(
            &<BackupInfo as crate::proto::Message>::encode_to_vec(&BackupInfo {
                version: 1,
                ..BackupInfo::default()
            }),
            &mut bytes,
        )
        .expect("block");
        let mut store = MemoryStore::new();
        assert!(matches!(
            import(&mut store, &bytes),
            Err(BackupError::MissingHeaderField {
                field: "backup_time_ms"
            })
        ));
        assert!(!store.in_import());
    }

    #[test]
    fn test_unrecognized_frames_are_kept_opaque() {
        let mut future = Vec::new();
        crate::proto::put_bytes(31, b"future", &mut future);
        let mut bytes = stream(vec![recipient(1)]);
        crate::stream::write_block(&future, &mut bytes).expect("block");

        let mut store = MemoryStore::new();
        let summary = import(&mut store, &bytes).expect("import");
        assert_eq!(summary.stats.opaque_frames, 1);
        assert_eq!(store.count(EntityKind::Opaque).expect("count"), 1);
    }
}
