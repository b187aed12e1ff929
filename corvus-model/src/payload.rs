//! Outgoing gateway payload wrappers (op 1-8), shaped exactly as documented
//! for Discord's gateway so they serialize directly to the wire.

use crate::{intents::Intents, snowflake::Snowflake};
use serde::Serialize;
use std::env::consts::OS;

#[derive(Serialize)]
struct Envelope<T> {
    op: u8,
    d: T,
}

fn wrap<T: Serialize>(op: u8, d: T) -> impl Serialize {
    Envelope { op, d }
}

#[derive(Serialize)]
pub struct Heartbeat {
    op: u8,
    d: Option<u64>,
}

impl Heartbeat {
    /// `last_seq` of zero serializes as JSON `null`, per the design ("last
    /// sequence or null").
    pub fn new(last_seq: u64) -> Self {
        Self {
            op: 1,
            d: if last_seq == 0 { None } else { Some(last_seq) },
        }
    }
}

#[derive(Serialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: OS.to_owned(),
            browser: "corvus".to_owned(),
            device: "corvus".to_owned(),
        }
    }
}

#[derive(Serialize)]
struct IdentifyInfo {
    token: String,
    properties: IdentifyProperties,
    shard: [u64; 2],
    intents: Intents,
    /// Always `false`: per-message compression is never requested over
    /// `IDENTIFY` even when connection-level `compress=zlib-stream` is used
    /// in the gateway URL (Open Question 1).
    compress: bool,
    large_threshold: u8,
}

pub fn identify(
    token: &str,
    shard_id: u64,
    shard_count: u64,
    intents: Intents,
) -> impl Serialize {
    wrap(
        2,
        IdentifyInfo {
            token: token.to_owned(),
            properties: IdentifyProperties::default(),
            shard: [shard_id, shard_count],
            intents,
            compress: false,
            large_threshold: 250,
        },
    )
}

#[derive(Serialize)]
struct ResumeInfo {
    token: String,
    session_id: String,
    seq: u64,
}

pub fn resume(token: &str, session_id: &str, seq: u64) -> impl Serialize {
    wrap(
        6,
        ResumeInfo {
            token: token.to_owned(),
            session_id: session_id.to_owned(),
            seq,
        },
    )
}

#[derive(Serialize)]
struct RequestGuildMembersInfo {
    guild_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_ids: Option<Vec<Snowflake>>,
    limit: u32,
}

pub fn request_guild_members_by_query(
    guild_id: Snowflake,
    query: impl Into<String>,
    limit: u32,
) -> impl Serialize {
    wrap(
        8,
        RequestGuildMembersInfo {
            guild_id,
            query: Some(query.into()),
            user_ids: None,
            limit,
        },
    )
}

pub fn request_guild_members_by_ids(guild_id: Snowflake, user_ids: Vec<Snowflake>) -> impl Serialize {
    wrap(
        8,
        RequestGuildMembersInfo {
            guild_id,
            query: None,
            user_ids: Some(user_ids),
            limit: 0,
        },
    )
}

#[derive(Serialize)]
struct UpdateVoiceStateInfo {
    guild_id: Snowflake,
    channel_id: Option<Snowflake>,
    self_mute: bool,
    self_deaf: bool,
}

pub fn update_voice_state(
    guild_id: Snowflake,
    channel_id: Option<Snowflake>,
    self_mute: bool,
    self_deaf: bool,
) -> impl Serialize {
    wrap(
        4,
        UpdateVoiceStateInfo {
            guild_id,
            channel_id,
            self_mute,
            self_deaf,
        },
    )
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Idle,
    Dnd,
    Invisible,
    Offline,
}

#[derive(Serialize)]
struct UpdatePresenceInfo {
    since: Option<u64>,
    activities: Vec<serde_json::Value>,
    status: PresenceStatus,
    afk: bool,
}

pub fn update_presence(status: PresenceStatus, afk: bool) -> impl Serialize {
    wrap(
        3,
        UpdatePresenceInfo {
            since: None,
            activities: Vec::new(),
            status,
            afk,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_zero_sequence_serializes_null() {
        let value = serde_json::to_value(Heartbeat::new(0)).unwrap();
        assert_eq!(value["d"], serde_json::Value::Null);
    }

    #[test]
    fn heartbeat_nonzero_sequence_serializes_number() {
        let value = serde_json::to_value(Heartbeat::new(7)).unwrap();
        assert_eq!(value["d"], 7);
    }

    #[test]
    fn identify_never_requests_per_message_compression() {
        let value = serde_json::to_value(identify("t", 0, 1, Intents::empty())).unwrap();
        assert_eq!(value["d"]["compress"], false);
    }
}
