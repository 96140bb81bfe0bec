use crate::model::BackupInfo;
use crate::stream::format::FORMAT_VERSION;

/// Settings for an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Value for the header's `backup_time_ms`. Must be non-zero.
    pub backup_time_ms: u64,
    /// Header format version.
    pub version: u64,
    /// Copied to the header's `media_root_backup_key`.
    pub media_root_backup_key: Option<Vec<u8>>,
    /// Copied to the header's `current_app_version`.
    pub current_app_version: Option<String>,
    /// Copied to the header's `first_app_version`.
    pub first_app_version: Option<String>,
    /// Whether to count the frames up front and declare them in the header.
    pub include_frame_count: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            backup_time_ms: 0,
            version: FORMAT_VERSION,
            media_root_backup_key: None,
            current_app_version: None,
            first_app_version: None,
            include_frame_count: true,
        }
    }
}

impl ExportOptions {
    /// Options for a backup taken at `backup_time_ms`.
    #[must_use]
    pub fn at(backup_time_ms: u64) -> Self {
        Self {
            backup_time_ms,
            ..Self::default()
        }
    }

    /// Options reproducing the header of an imported backup, so a re-export
    /// keeps its time anchor and metadata.
    #[must_use]
    pub fn from_info(info: &BackupInfo) -> Self {
        Self {
            backup_time_ms: info.backup_time_ms,
            version: info.version,
            media_root_backup_key: info.media_root_backup_key.clone(),
            current_app_version: info.current_app_version.clone(),
            first_app_version: info.first_app_version.clone(),
            include_frame_count: info.frame_count.is_some(),
        }
    }

    pub(crate) fn header(&self, frame_count: Option<u64>) -> BackupInfo {
        BackupInfo {
            version: self.version,
            backup_time_ms: self.backup_time_ms,
            media_root_backup_key: self.media_root_backup_key.clone(),
            current_app_version: self.current_app_version.clone(),
            first_app_version: self.first_app_version.clone(),
            frame_count,
            ..BackupInfo::default()
        }
    }
}

/// Settings for an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Drop disappearing messages that had already expired at the header's
    /// `backup_time_ms`.
    pub skip_expired_items: bool,
    /// Fail if the header's frame count disagrees with the stream.
    pub verify_frame_count: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            skip_expired_items: true,
            verify_frame_count: true,
        }
    }
}
