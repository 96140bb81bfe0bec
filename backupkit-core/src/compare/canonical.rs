//! Order-normalised JSON projection of a backup.
//!
//! Ids are file-scoped, so two equivalent backups can number their entities
//! differently. The canonical form removes ids, replaces every reference
//! with the canonical value of the entity it points to, and sorts each
//! entity list by its serialised form. Repeated fields inside a record keep
//! their order.
//!
//! Chat items that had already expired at the header's `backup_time_ms` are
//! left out, matching what an import keeps. The header's `frame_count` is
//! left out as it depends on that filtering.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{BackupInfo, Frame, FrameItem};

/// Keys that hold an embedded referenced entity rather than the record's own
/// fields.
pub(crate) const REFERENCE_KEYS: [&str; 3] = ["recipient", "chat", "author"];

fn to_value<T: Serialize>(value: &T) -> Value {
    // Model types have string keys only, so serialisation cannot fail.
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn with_frame_fields(mut value: Value, frame: &Frame) -> Value {
    if !frame.unknown_fields.is_empty() {
        if let Value::Object(map) = &mut value {
            map.insert(
                "frame_unknown_fields".to_string(),
                to_value(&frame.unknown_fields),
            );
        }
    }
    value
}

fn missing(kind: &str, id: u64) -> Value {
    Value::String(format!("<missing {kind} {id}>"))
}

/// Replaces `map[field]` (an id) with `map[new_field]` = the referenced value.
fn embed_reference(
    map: &mut Map<String, Value>,
    field: &str,
    new_field: &str,
    kind: &str,
    lookup: &HashMap<u64, Value>,
) {
    let id = map.remove(field).and_then(|v| v.as_u64()).unwrap_or(0);
    let target = lookup.get(&id).cloned().unwrap_or_else(|| missing(kind, id));
    map.insert(new_field.to_string(), target);
}

fn sorted(mut values: Vec<Value>) -> Value {
    values.sort_by_cached_key(Value::to_string);
    Value::Array(values)
}

/// Builds the canonical value for a header and its frames.
pub(crate) fn canonicalize(info: &BackupInfo, frames: &[Frame]) -> Value {
    let mut header = to_value(info);
    if let Value::Object(map) = &mut header {
        map.remove("frame_count");
    }

    let mut accounts = Vec::new();
    let mut recipients = HashMap::new();
    let mut recipient_list = Vec::new();
    let mut sticker_packs = Vec::new();
    let mut opaque = Vec::new();

    // Recipients first: everything else points at them.
    for frame in frames {
        match &frame.item {
            FrameItem::Account(account) => accounts.push(with_frame_fields(to_value(account), frame)),
            FrameItem::Recipient(recipient) => {
                let mut value = to_value(recipient);
                if let Value::Object(map) = &mut value {
                    map.remove("id");
                }
                let value = with_frame_fields(value, frame);
                recipients.insert(recipient.id, value.clone());
                recipient_list.push(value);
            }
            FrameItem::StickerPack(pack) => {
                sticker_packs.push(with_frame_fields(to_value(pack), frame));
            }
            FrameItem::Unrecognized => opaque.push(to_value(frame)),
            FrameItem::Chat(_) | FrameItem::ChatItem(_) | FrameItem::AdHocCall(_) => {}
        }
    }

    let mut chats = HashMap::new();
    let mut chat_list = Vec::new();
    let mut calls = Vec::new();
    for frame in frames {
        match &frame.item {
            FrameItem::Chat(chat) => {
                let mut value = to_value(chat);
                if let Value::Object(map) = &mut value {
                    map.remove("id");
                    embed_reference(map, "recipient_id", "recipient", "recipient", &recipients);
                }
                let value = with_frame_fields(value, frame);
                chats.insert(chat.id, value.clone());
                chat_list.push(value);
            }
            FrameItem::AdHocCall(call) => {
                let mut value = to_value(call);
                if let Value::Object(map) = &mut value {
                    embed_reference(map, "recipient_id", "recipient", "recipient", &recipients);
                }
                calls.push(with_frame_fields(value, frame));
            }
            _ => {}
        }
    }

    let mut items = Vec::new();
    for frame in frames {
        let FrameItem::ChatItem(item) = &frame.item else {
            continue;
        };
        if item.is_expired_at(info.backup_time_ms) {
            continue;
        }
        let mut value = to_value(item);
        if let Value::Object(map) = &mut value {
            embed_reference(map, "chat_id", "chat", "chat", &chats);
            embed_reference(map, "author_id", "author", "recipient", &recipients);
            if let Some(Value::Array(reactions)) = map
                .get_mut("content")
                .and_then(|content| content.get_mut("standard_message"))
                .and_then(|message| message.get_mut("reactions"))
            {
                for reaction in reactions.iter_mut() {
                    if let Value::Object(reaction) = reaction {
                        embed_reference(reaction, "author_id", "author", "recipient", &recipients);
                    }
                }
            }
        }
        items.push(with_frame_fields(value, frame));
    }

    let account = match accounts.len() {
        0 => Value::Null,
        1 => accounts.pop().unwrap_or(Value::Null),
        _ => sorted(accounts),
    };

    let mut root = Map::new();
    root.insert("backup_info".to_string(), header);
    root.insert("account".to_string(), account);
    root.insert("recipients".to_string(), sorted(recipient_list));
    root.insert("chats".to_string(), sorted(chat_list));
    root.insert("chat_items".to_string(), sorted(items));
    root.insert("sticker_packs".to_string(), sorted(sticker_packs));
    root.insert("ad_hoc_calls".to_string(), sorted(calls));
    root.insert("opaque_frames".to_string(), sorted(opaque));
    Value::Object(root)
}

/// JSON paths of every non-empty unknown field set in `value`.
pub(crate) fn unknown_field_paths(value: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    walk(value, "$", &mut paths);
    paths
}

fn walk(value: &Value, path: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = format!("{path}.{key}");
                if key == "unknown_fields" || key == "frame_unknown_fields" {
                    if child.as_array().is_some_and(|fields| !fields.is_empty()) {
                        out.push(child_path);
                    }
                } else if !REFERENCE_KEYS.contains(&key.as_str()) {
                    walk(child, &child_path, out);
                }
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk(child, &format!("{path}[{index}]"), out);
            }
        }
        _ => {}
    }
}
