//! Typed dispatch payloads (`t` field of a `DISPATCH` envelope).
//!
//! [`crate::event::parse_gateway_event`] stops at the envelope: it leaves
//! `d` as unparsed JSON so the shard can make its fast-path decisions
//! (sequence tracking, resume eligibility) without paying for a full
//! parse. Once a dispatch reaches the cache and the event router, though,
//! they need typed data — that's what this module produces.

use crate::{
    entity::{Channel, Guild, Member, Message, Ready, Role, User, VoiceServerUpdate, VoiceState},
    interaction::Interaction,
    snowflake::Snowflake,
};
use serde::Deserialize;
use serde_json::value::RawValue;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// A single decoded dispatch event, covering the categories named in spec
/// §1: messages, presence, voice state, interactions, reactions, and guild
/// lifecycle.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum DispatchEvent {
    Ready(Box<Ready>),
    Resumed,
    GuildCreate(Box<Guild>),
    GuildUpdate(Box<Guild>),
    GuildDelete(GuildDelete),
    ChannelCreate(Box<Channel>),
    ChannelUpdate(Box<Channel>),
    ChannelDelete(Box<Channel>),
    RoleCreate(RoleCreate),
    RoleUpdate(RoleCreate),
    RoleDelete(RoleDelete),
    MemberAdd(Box<MemberAdd>),
    MemberUpdate(Box<MemberUpdate>),
    MemberRemove(MemberRemove),
    MessageCreate(Box<Message>),
    MessageUpdate(Box<MessagePatch>),
    MessageDelete(MessageDelete),
    MessageDeleteBulk(MessageDeleteBulk),
    MessageReactionAdd(Box<ReactionAdd>),
    MessageReactionRemove(Box<ReactionAdd>),
    PresenceUpdate(Box<PresenceUpdate>),
    VoiceStateUpdate(Box<VoiceState>),
    VoiceServerUpdate(Box<VoiceServerUpdate>),
    InteractionCreate(Box<Interaction>),
    /// An event type this crate doesn't model strongly; callers that need
    /// it can still reach the raw JSON.
    Unknown { name: String, body: Box<RawValue> },
}

#[derive(Clone, Debug, Deserialize)]
pub struct GuildDelete {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RoleCreate {
    pub guild_id: Snowflake,
    pub role: Role,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RoleDelete {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MemberAdd {
    pub guild_id: Snowflake,
    #[serde(flatten)]
    pub member: Member,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MemberUpdate {
    pub guild_id: Snowflake,
    pub user: User,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MemberRemove {
    pub guild_id: Snowflake,
    pub user: User,
}

/// A message edit carries only the fields that changed; everything else
/// stays `None` and the cache patches in place over whatever it already
/// has.
#[derive(Clone, Debug, Deserialize)]
pub struct MessagePatch {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MessageDelete {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MessageDeleteBulk {
    pub ids: Vec<Snowflake>,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReactionAdd {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub emoji: ReactionEmoji,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReactionEmoji {
    pub id: Option<Snowflake>,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PresenceUpdate {
    pub user: PartialUser,
    pub guild_id: Snowflake,
    pub status: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PartialUser {
    pub id: Snowflake,
}

#[derive(Debug)]
pub struct DispatchParsingError {
    pub event_type: String,
    pub source: serde_json::Error,
}

impl Display for DispatchParsingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} dispatch body", self.event_type)
    }
}

impl Error for DispatchParsingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Parse a dispatch body (the `d` field) into a [`DispatchEvent`], given
/// the event's `t` name.
///
/// Unrecognized event names parse successfully into
/// [`DispatchEvent::Unknown`] rather than erroring — this design scopes full
/// REST/event model coverage out, so new or rarely-used event types are
/// expected and shouldn't be treated as protocol errors.
pub fn parse_dispatch_event(
    event_type: &str,
    body: Box<RawValue>,
) -> Result<DispatchEvent, DispatchParsingError> {
    macro_rules! parse {
        ($variant:path) => {
            serde_json::from_str(body.get())
.map($variant)
.map_err(|source| DispatchParsingError {
                    event_type: event_type.to_owned(),
                    source,
                })
        };
    }

    match event_type {
        "READY" => parse!(DispatchEvent::Ready),
        "RESUMED" => Ok(DispatchEvent::Resumed),
        "GUILD_CREATE" => parse!(DispatchEvent::GuildCreate),
        "GUILD_UPDATE" => parse!(DispatchEvent::GuildUpdate),
        "GUILD_DELETE" => parse!(DispatchEvent::GuildDelete),
        "CHANNEL_CREATE" => parse!(DispatchEvent::ChannelCreate),
        "CHANNEL_UPDATE" => parse!(DispatchEvent::ChannelUpdate),
        "CHANNEL_DELETE" => parse!(DispatchEvent::ChannelDelete),
        "GUILD_ROLE_CREATE" => parse!(DispatchEvent::RoleCreate),
        "GUILD_ROLE_UPDATE" => parse!(DispatchEvent::RoleUpdate),
        "GUILD_ROLE_DELETE" => parse!(DispatchEvent::RoleDelete),
        "GUILD_MEMBER_ADD" => parse!(DispatchEvent::MemberAdd),
        "GUILD_MEMBER_UPDATE" => parse!(DispatchEvent::MemberUpdate),
        "GUILD_MEMBER_REMOVE" => parse!(DispatchEvent::MemberRemove),
        "MESSAGE_CREATE" => parse!(DispatchEvent::MessageCreate),
        "MESSAGE_UPDATE" => parse!(DispatchEvent::MessageUpdate),
        "MESSAGE_DELETE" => parse!(DispatchEvent::MessageDelete),
        "MESSAGE_DELETE_BULK" => parse!(DispatchEvent::MessageDeleteBulk),
        "MESSAGE_REACTION_ADD" => parse!(DispatchEvent::MessageReactionAdd),
        "MESSAGE_REACTION_REMOVE" => parse!(DispatchEvent::MessageReactionRemove),
        "PRESENCE_UPDATE" => parse!(DispatchEvent::PresenceUpdate),
        "VOICE_STATE_UPDATE" => parse!(DispatchEvent::VoiceStateUpdate),
        "VOICE_SERVER_UPDATE" => parse!(DispatchEvent::VoiceServerUpdate),
        "INTERACTION_CREATE" => parse!(DispatchEvent::InteractionCreate),
        other => Ok(DispatchEvent::Unknown {
            name: other.to_owned(),
            body,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_event_type_does_not_error() {
        let body = RawValue::from_string("{}".into()).unwrap();
        let event = parse_dispatch_event("THREAD_LIST_SYNC", body).unwrap();
        assert!(matches!(event, DispatchEvent::Unknown {.. }));
    }

    #[test]
    fn message_create_parses_author_and_content() {
        let body = RawValue::from_string(
            r#"{"id":"1","channel_id":"2","author":{"id":"3","username":"a","discriminator":"0001"},"content":"hi"}"#
.into(),
        )
.unwrap();
        match parse_dispatch_event("MESSAGE_CREATE", body).unwrap() {
            DispatchEvent::MessageCreate(message) => assert_eq!(message.content, "hi"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
