use serde::Serialize;

use crate::proto::{
    put_bool_if_set, put_bytes, put_bytes_if_set, put_message, put_string, put_uint64,
    put_uint64_if_set, DecodeError, Field, Message, UnknownFieldSet,
};

/// Someone (or something) a chat can be with.
///
/// `id` is scoped to the backup file; chats and messages refer to recipients
/// by this id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Recipient {
    /// Backup-scoped recipient id.
    pub id: u64,
    /// Who or what this recipient is.
    pub destination: Destination,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

/// The `destination` oneof of [`Recipient`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// Another user.
    Contact(Contact),
    /// A group chat.
    Group(Group),
    /// The account owner.
    SelfRecipient(SelfRecipient),
    /// The release notes channel.
    ReleaseNotes(ReleaseNotes),
    /// No destination this version knows about. Whatever was on the wire is in
    /// the recipient's unknown fields.
    #[default]
    Unrecognized,
}

impl Message for Recipient {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        put_uint64_if_set(1, self.id, out);
        match &self.destination {
            Destination::Contact(contact) => put_message(2, contact, out),
            Destination::Group(group) => put_message(3, group, out),
            Destination::SelfRecipient(me) => put_message(4, me, out),
            Destination::ReleaseNotes(notes) => put_message(5, notes, out),
            Destination::Unrecognized => {}
        }
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => self.id = field.as_u64()?,
            2 => match &mut self.destination {
                Destination::Contact(contact) => field.merge_into(contact)?,
                _ => self.destination = Destination::Contact(field.as_message()?),
            },
            3 => match &mut self.destination {
                Destination::Group(group) => field.merge_into(group)?,
                _ => self.destination = Destination::Group(field.as_message()?),
            },
            4 => match &mut self.destination {
                Destination::SelfRecipient(me) => field.merge_into(me)?,
                _ => self.destination = Destination::SelfRecipient(field.as_message()?),
            },
            5 => match &mut self.destination {
                Destination::ReleaseNotes(notes) => field.merge_into(notes)?,
                _ => self.destination = Destination::ReleaseNotes(field.as_message()?),
            },
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}

/// An individual the account has talked to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Contact {
    /// Account identifier, 16 bytes.
    #[serde(serialize_with = "crate::proto::hex_serde::option::serialize")]
    pub aci: Option<Vec<u8>>,
    /// Phone number without the leading `+`.
    pub e164: Option<u64>,
    /// Profile encryption key.
    #[serde(serialize_with = "crate::proto::hex_serde::option::serialize")]
    pub profile_key: Option<Vec<u8>>,
    /// Profile given name.
    pub profile_given_name: Option<String>,
    /// Profile family name.
    pub profile_family_name: Option<String>,
    /// Whether the user blocked this contact.
    pub blocked: bool,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl Message for Contact {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        if let Some(aci) = &self.aci {
            put_bytes(1, aci, out);
        }
        if let Some(e164) = self.e164 {
            put_uint64(2, e164, out);
        }
        if let Some(key) = &self.profile_key {
            put_bytes(3, key, out);
        }
        if let Some(name) = &self.profile_given_name {
            put_string(4, name, out);
        }
        if let Some(name) = &self.profile_family_name {
            put_string(5, name, out);
        }
        put_bool_if_set(6, self.blocked, out);
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => self.aci = Some(field.as_bytes()?.to_vec()),
            2 => self.e164 = Some(field.as_u64()?),
            3 => self.profile_key = Some(field.as_bytes()?.to_vec()),
            4 => self.profile_given_name = Some(field.as_string()?),
            5 => self.profile_family_name = Some(field.as_string()?),
            6 => self.blocked = field.as_bool()?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}

/// A group conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Group {
    /// Group master key.
    #[serde(serialize_with = "crate::proto::hex_serde::serialize")]
    pub master_key: Vec<u8>,
    /// Whether the user accepted the group invite.
    pub whitelisted: bool,
    /// Hide the group story.
    pub hide_story: bool,
    /// Group title.
    pub title: Option<String>,
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl Message for Group {
    fn encode_raw(&self, out: &mut Vec<u8>) {
        put_bytes_if_set(1, &self.master_key, out);
        put_bool_if_set(2, self.whitelisted, out);
        put_bool_if_set(3, self.hide_story, out);
        if let Some(title) = &self.title {
            put_string(4, title, out);
        }
    }

    fn merge_field(&mut self, field: &Field<'_>) -> Result<bool, DecodeError> {
        match field.number {
            1 => self.master_key = field.as_bytes()?.to_vec(),
            2 => self.whitelisted = field.as_bool()?,
            3 => self.hide_story = field.as_bool()?,
            4 => self.title = Some(field.as_string()?),
            _ => return Ok(false),
        }
        Ok(true)
    }

    unknown_fields_accessors!();
}

/// The account itself, as a chat destination ("note to self").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelfRecipient {
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl Message for SelfRecipient {
    fn encode_raw(&self, _out: &mut Vec<u8>) {}

    fn merge_field(&mut self, _field: &Field<'_>) -> Result<bool, DecodeError> {
        Ok(false)
    }

    unknown_fields_accessors!();
}

/// The app's release-notes channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseNotes {
    /// Fields from newer writers.
    pub unknown_fields: UnknownFieldSet,
}

impl Message for ReleaseNotes {
    fn encode_raw(&self, _out: &mut Vec<u8>) {}

    fn merge_field(&mut self, _field: &Field<'_>) -> Result<bool, DecodeError> {
        Ok(false)
    }

    unknown_fields_accessors!();
}
