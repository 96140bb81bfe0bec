use serde::Serialize;

use crate::proto::{
    put_bytes, put_string, put_uint64, put_uint64_if_set, DecodeError, Field, Message,
    UnknownFieldSet,
};

/// The header record. Exactly one per stream, always the first block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupInfo {
    /// Format version the stream was written with.
    pub version: u64,
    /// Capture time in epoch milliseconds. Import treats this as "now".
    pub backup_time_ms: u64,
    /// Root key for media backups, if the exporter had one.
    #[serde(serialize_with = "crate::proto::hex_serde::option::serialize")]
    pub media_root_backup_key: Option<Vec<u8>>,
    /// Version of the app that wrote the backup.
    pub current_app_version: Option<String>,
    /// Version of the app the account was first registered with.
    pub first_app_version: Option<String>,
    /// Number of frame blocks following the header, when the writer knew it.
    pub frame_count: Option<u64>,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl Message for BackupInfo {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        put_uint64_if_set(1, self.version, out);
        put_uint64_if_set(2, self.backup_time_ms, out);
        if let Some(key) = &self.media_root_backup_key {
            put_bytes(3, key, out);
        }
        if let Some(version) = &self.current_app_version {
            put_string(4, version, out);
        }
        if let Some(version) = &self.first_app_version {
            put_string(5, version, out);
        }
        if let Some(count) = self.frame_count {
            put_uint64(6, count, out);
        }
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => self.version = field.as_u64()?,
            2 => self.backup_time_ms = field.as_u64()?,
            3 => self.media_root_backup_key = Some(field.as_bytes()?.to_vec()),
            4 => self.current_app_version = Some(field.as_string()?),
            5 => self.first_app_version = Some(field.as_string()?),
            6 => self.frame_count = Some(field.as_u64()?),
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}
