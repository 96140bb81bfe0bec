//! Common test utilities shared across integration tests.
#![allow(dead_code, missing_docs)]

use backupkit_core::backup::{Exporter, ExportOptions};
use backupkit_core::model::{
    BackupInfo, Chat, ChatItem, ChatItemContent, Frame, Recipient, StandardMessage,
};
use backupkit_core::proto::{put_string, Message};
use backupkit_core::store::MemoryStore;
use backupkit_core::{BackupWriter, DerivedKeyProvider, StreamMode};

pub const BACKUP_TIME_MS: u64 = 1_700_000_000_000;

pub fn encrypted_mode() -> StreamMode {
    let provider = DerivedKeyProvider::new([7u8; 32], b"integration-backup".to_vec());
    StreamMode::encrypted_from(&provider).expect("derive keys")
}

pub fn header(frame_count: Option<u64>) -> BackupInfo {
    BackupInfo {
        version: 1,
        backup_time_ms: BACKUP_TIME_MS,
        frame_count,
        ..BackupInfo::default()
    }
}

/// Recipient 1, a chat with it, and one message in that chat.
pub fn scenario_frames() -> Vec<Frame> {
    vec![
        Frame::from(Recipient {
            id: 1,
            ..Recipient::default()
        }),
        Frame::from(Chat {
            id: 1,
            recipient_id: 1,
            ..Chat::default()
        }),
        Frame::from(ChatItem {
            chat_id: 1,
            author_id: 1,
            date_sent: BACKUP_TIME_MS - 60_000,
            content: ChatItemContent::StandardMessage(StandardMessage {
                text: Some("hello".to_string()),
                ..StandardMessage::default()
            }),
            ..ChatItem::default()
        }),
    ]
}

pub fn write_stream(info: &BackupInfo, frames: &[Frame], mode: &StreamMode) -> Vec<u8> {
    let mut writer = BackupWriter::new(Vec::new(), mode)
        .expect("writer")
        .write_header(info)
        .expect("header");
    for frame in frames {
        writer.write_frame(frame).expect("frame");
    }
    writer.finalize().expect("finalize")
}

pub fn export_store(store: &MemoryStore, mode: &StreamMode) -> Vec<u8> {
    let writer = BackupWriter::new(Vec::new(), mode).expect("writer");
    let (bytes, _) = Exporter::new(store, ExportOptions::at(BACKUP_TIME_MS))
        .export(writer)
        .expect("export");
    bytes
}

/// Re-decodes `message` with an extra string field `number` appended.
pub fn with_unknown_field<M: Message>(message: &M, number: u32, value: &str) -> M {
    let mut bytes = message.encode_to_vec();
    put_string(number, value, &mut bytes);
    M::decode(&bytes).expect("decode with unknown field")
}
