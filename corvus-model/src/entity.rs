//! Minimal entity shapes.
//!
//! Per this design, full REST entity modeling is explicitly out of scope — it's
//! "mechanical" wire-JSON mapping, not hard engineering. These types carry
//! only the fields the gateway state machine, the cache, and the example
//! REST builders actually touch; anything else round-trips through
//! `serde_json::Value` instead of a dedicated struct.

use crate::snowflake::Snowflake;
use serde::{Deserialize, Serialize};

pub trait CachedEntity {
    fn id(&self) -> Snowflake;
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl CachedEntity for User {
    fn id(&self) -> Snowflake {
        self.id
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Role {
    pub id: Snowflake,
    pub name: String,
    pub position: i64,
    #[serde(default)]
    pub permissions: String,
}

impl CachedEntity for Role {
    fn id(&self) -> Snowflake {
        self.id
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Member {
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Channel {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub parent_id: Option<Snowflake>,
}

impl CachedEntity for Channel {
    fn id(&self) -> Snowflake {
        self.id
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub unavailable: bool,
    #[serde(default)]
    pub member_count: Option<u64>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl CachedEntity for Guild {
    fn id(&self) -> Snowflake {
        self.id
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
}

impl CachedEntity for Message {
    fn id(&self) -> Snowflake {
        self.id
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VoiceState {
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub channel_id: Option<Snowflake>,
    pub user_id: Snowflake,
    pub session_id: String,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub self_deaf: bool,
}

/// Discord's two-message voice rendezvous delivers its endpoint/token via a
/// dedicated event rather than via [`VoiceState`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VoiceServerUpdate {
    pub token: String,
    pub guild_id: Snowflake,
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SessionStartLimit {
    pub total: u64,
    pub remaining: u64,
    pub reset_after: u64,
    pub max_concurrency: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GatewayBotInfo {
    pub url: String,
    pub shards: u64,
    pub session_start_limit: SessionStartLimit,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Ready {
    pub v: u8,
    pub user: User,
    pub session_id: String,
    pub resume_gateway_url: String,
    #[serde(default)]
    pub guilds: Vec<Guild>,
}
