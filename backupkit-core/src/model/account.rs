use serde::Serialize;

use super::merge_optional;
use crate::proto::{
    put_bool_if_set, put_bytes_if_set, put_message, put_string, put_string_if_set,
    put_uint32_if_set, DecodeError, Field, Message, UnknownFieldSet,
};

/// The local account's profile. At most one per backup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountData {
    /// Profile encryption key.
    #[serde(serialize_with = "crate::proto::hex_serde::serialize")]
    pub profile_key: Vec<u8>,
    /// Username, if one is set.
    pub username: Option<String>,
    /// Profile given name.
    pub given_name: String,
    /// Profile family name.
    pub family_name: String,
    /// Server path of the profile avatar.
    pub avatar_url_path: String,
    /// Account-wide settings.
    pub account_settings: Option<AccountSettings>,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl Message for AccountData {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        put_bytes_if_set(1, &self.profile_key, out);
        if let Some(username) = &self.username {
            put_string(2, username, out);
        }
        put_string_if_set(3, &self.given_name, out);
        put_string_if_set(4, &self.family_name, out);
        put_string_if_set(5, &self.avatar_url_path, out);
        if let Some(settings) = &self.account_settings {
            put_message(6, settings, out);
        }
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => self.profile_key = field.as_bytes()?.to_vec(),
            2 => self.username = Some(field.as_string()?),
            3 => self.given_name = field.as_string()?,
            4 => self.family_name = field.as_string()?,
            5 => self.avatar_url_path = field.as_string()?,
            6 => merge_optional(&mut self.account_settings, field)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}

/// Account-wide preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountSettings {
    /// Send read receipts.
    pub read_receipts: bool,
    /// Show sealed sender indicators.
    pub sealed_sender_indicators: bool,
    /// Send typing indicators.
    pub typing_indicators: bool,
    /// Generate link previews.
    pub link_previews: bool,
    /// Default disappearing timer for new chats. Zero means off.
    pub universal_expire_timer_seconds: u32,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl Message for AccountSettings {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        put_bool_if_set(1, self.read_receipts, out);
        put_bool_if_set(2, self.sealed_sender_indicators, out);
        put_bool_if_set(3, self.typing_indicators, out);
        put_bool_if_set(4, self.link_previews, out);
        put_uint32_if_set(5, self.universal_expire_timer_seconds, out);
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => self.read_receipts = field.as_bool()?,
            2 => self.sealed_sender_indicators = field.as_bool()?,
            3 => self.typing_indicators = field.as_bool()?,
            4 => self.link_previews = field.as_bool()?,
            5 => self.universal_expire_timer_seconds = field.as_u32()?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}
