//! Export order does not depend on the order entities were stored in.

mod common;

use backupkit_core::backup::{ImportOptions, Importer};
use backupkit_core::model::{
    Chat, ChatItem, ChatItemContent, Contact, Destination, FrameItem, Recipient, StandardMessage,
};
use backupkit_core::store::{EntityKind, MemoryStore, Record};
use backupkit_core::{BackupReader, ComparableBackup, StreamMode};
use proptest::prelude::*;

const PEOPLE: u64 = 4;

fn records() -> Vec<Record> {
    let mut records = Vec::new();
    for i in 1..=PEOPLE {
        records.push(Record::from(Recipient {
            id: i,
            destination: Destination::Contact(Contact {
                profile_given_name: Some(format!("person {i}")),
                ..Contact::default()
            }),
            ..Recipient::default()
        }));
        records.push(Record::from(Chat {
            id: i,
            recipient_id: i,
            ..Chat::default()
        }));
        records.push(Record::from(ChatItem {
            chat_id: i,
            author_id: (i % PEOPLE) + 1,
            date_sent: common::BACKUP_TIME_MS - i,
            content: ChatItemContent::StandardMessage(StandardMessage {
                text: Some(format!("message {i}")),
                ..StandardMessage::default()
            }),
            ..ChatItem::default()
        }));
    }
    records
}

fn frame_rank(item: &FrameItem) -> usize {
    let kind = match item {
        FrameItem::Account(_) => EntityKind::Account,
        FrameItem::Recipient(_) => EntityKind::Recipient,
        FrameItem::Chat(_) => EntityKind::Chat,
        FrameItem::ChatItem(_) => EntityKind::ChatItem,
        FrameItem::StickerPack(_) => EntityKind::StickerPack,
        FrameItem::AdHocCall(_) => EntityKind::AdHocCall,
        FrameItem::Unrecognized => EntityKind::Opaque,
    };
    EntityKind::EXPORT_ORDER
        .iter()
        .position(|k| *k == kind)
        .unwrap_or(usize::MAX)
}

fn reference() -> ComparableBackup {
    let mut store = MemoryStore::new();
    for record in records() {
        store.seed(record);
    }
    let bytes = common::export_store(&store, &StreamMode::Plaintext);
    ComparableBackup::from_bytes(&bytes, &StreamMode::Plaintext).expect("reference")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_export_order_ignores_insertion_order(
        order in Just((0..records().len()).collect::<Vec<_>>()).prop_shuffle()
    ) {
        let records = records();
        let mut store = MemoryStore::new();
        for index in order {
            store.seed(records[index].clone());
        }

        let bytes = common::export_store(&store, &StreamMode::Plaintext);
        let exported = ComparableBackup::from_bytes(&bytes, &StreamMode::Plaintext)
            .expect("read export");

        let ranks: Vec<usize> = exported.frames().iter().map(|f| frame_rank(&f.item)).collect();
        prop_assert!(ranks.windows(2).all(|pair| pair[0] <= pair[1]), "{ranks:?}");
        prop_assert!(exported.is_equivalent(&reference()));

        let mut target = MemoryStore::new();
        let reader = BackupReader::new(bytes.as_slice(), &StreamMode::Plaintext).expect("reader");
        let summary = Importer::new(&mut target, ImportOptions::default())
            .import(reader)
            .expect("import");
        prop_assert_eq!(summary.stats.frames_read, PEOPLE * 3);
    }
}
