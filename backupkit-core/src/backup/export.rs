use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::options::ExportOptions;
use crate::error::{BackupError, BackupResult};
use crate::model::BackupInfo;
use crate::store::{BackupStore, Entity, EntityKind, Record};
use crate::stream::{BackupWriter, FrameWriter, StreamMode};

/// Counts from a finished export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    /// Frames written after the header.
    pub frames_written: u64,
    /// Frames written per entity kind.
    pub per_kind: BTreeMap<EntityKind, u64>,
}

impl ExportStats {
    fn add(&mut self, kind: EntityKind) {
        self.frames_written += 1;
        *self.per_kind.entry(kind).or_default() += 1;
    }
}

/// Ids already written, per referenced kind.
#[derive(Debug, Default)]
struct Emitted {
    recipients: HashSet<u64>,
    chats: HashSet<u64>,
    calls: HashSet<u64>,
    account: bool,
}

impl Emitted {
    fn require(&self, referrer: EntityKind, kind: EntityKind, id: u64) -> BackupResult<()> {
        let known = match kind {
            EntityKind::Recipient => self.recipients.contains(&id),
            EntityKind::Chat => self.chats.contains(&id),
            _ => false,
        };
        if known {
            Ok(())
        } else {
            Err(BackupError::DanglingReference { referrer, kind, id })
        }
    }

    /// Checks `entity` against what was written before it and records its id.
    fn admit(&mut self, entity: &Entity) -> BackupResult<()> {
        let kind = entity.kind();
        match &entity.record {
            Record::Account(_) => {
                if self.account {
                    return Err(BackupError::UnexpectedFrame {
                        kind,
                        reason: "store holds more than one account".to_string(),
                    });
                }
                self.account = true;
            }
            Record::Recipient(recipient) => {
                if !self.recipients.insert(recipient.id) {
                    return Err(BackupError::DuplicateId {
                        kind,
                        id: recipient.id,
                    });
                }
            }
            Record::Chat(chat) => {
                self.require(kind, EntityKind::Recipient, chat.recipient_id)?;
                if !self.chats.insert(chat.id) {
                    return Err(BackupError::DuplicateId { kind, id: chat.id });
                }
            }
            Record::ChatItem(item) => {
                self.require(kind, EntityKind::Chat, item.chat_id)?;
                self.require(kind, EntityKind::Recipient, item.author_id)?;
                if let crate::model::ChatItemContent::StandardMessage(message) = &item.content {
                    for reaction in &message.reactions {
                        self.require(kind, EntityKind::Recipient, reaction.author_id)?;
                    }
                }
            }
            Record::AdHocCall(call) => {
                self.require(kind, EntityKind::Recipient, call.recipient_id)?;
                if !self.calls.insert(call.call_id) {
                    return Err(BackupError::DuplicateId {
                        kind,
                        id: call.call_id,
                    });
                }
            }
            Record::StickerPack(_) | Record::Opaque(_) => {}
        }
        Ok(())
    }
}

/// Writes the contents of a store as a backup stream.
pub struct Exporter<'a, S: BackupStore + ?Sized> {
    store: &'a S,
    options: ExportOptions,
}

impl<'a, S: BackupStore + ?Sized> Exporter<'a, S> {
    /// Creates an exporter over `store`.
    #[must_use]
    pub const fn new(store: &'a S, options: ExportOptions) -> Self {
        Self { store, options }
    }

    /// Builds the header, counting frames if the options ask for it.
    ///
    /// # Errors
    ///
    /// - [`BackupError::MissingHeaderField`] if `backup_time_ms` is zero.
    /// - Store errors while counting.
    pub fn header(&self) -> BackupResult<BackupInfo> {
        if self.options.backup_time_ms == 0 {
            return Err(BackupError::MissingHeaderField {
                field: "backup_time_ms",
            });
        }
        let frame_count = if self.options.include_frame_count {
            let mut total = 0;
            for kind in EntityKind::EXPORT_ORDER {
                total += self.store.count(kind)?;
            }
            Some(total)
        } else {
            None
        };
        Ok(self.options.header(frame_count))
    }

    /// Writes every entity as a frame, kinds in dependency order.
    ///
    /// # Errors
    ///
    /// - [`BackupError::DanglingReference`] if an entity references an id
    ///   that was not written before it.
    /// - [`BackupError::DuplicateId`] for two recipients or chats sharing an id.
    /// - [`BackupError::UnexpectedFrame`] for more than one account.
    /// - Store and I/O errors.
    pub fn write_frames<W: Write>(&self, frames: &mut FrameWriter<W>) -> BackupResult<ExportStats> {
        let mut emitted = Emitted::default();
        let mut stats = ExportStats::default();
        for kind in EntityKind::EXPORT_ORDER {
            self.store.visit(kind, &mut |_, entity| {
                emitted.admit(entity)?;
                frames.write_frame(&entity.to_frame())?;
                stats.add(kind);
                Ok(())
            })?;
        }
        log::debug!("exported frames per kind: {:?}", stats.per_kind);
        Ok(stats)
    }

    /// Exports into `writer` and returns the finalized sink.
    ///
    /// # Errors
    ///
    /// See [`Exporter::header`] and [`Exporter::write_frames`].
    pub fn export<W: Write>(&self, writer: BackupWriter<W>) -> BackupResult<(W, ExportStats)> {
        let header = self.header()?;
        let mut frames = writer.write_header(&header)?;
        let stats = self.write_frames(&mut frames)?;
        let sink = frames.finalize()?;
        log::info!("exported backup with {} frames", stats.frames_written);
        Ok((sink, stats))
    }
}

/// Exports `store` to a file at `path`.
///
/// The file is written under a `.partial` name and only moved into place once
/// the stream is complete; on any error no file appears at `path`.
///
/// # Errors
///
/// See [`Exporter::export`].
pub fn export_to_path<S: BackupStore + ?Sized>(
    store: &S,
    path: impl AsRef<Path>,
    mode: &StreamMode,
    options: ExportOptions,
) -> BackupResult<(PathBuf, ExportStats)> {
    let exporter = Exporter::new(store, options);
    let header = exporter.header()?;
    let mut frames = BackupWriter::create(path, mode)?.write_header(&header)?;
    let stats = exporter.write_frames(&mut frames)?;
    let path = frames.finalize_file()?;
    Ok((path, stats))
}
