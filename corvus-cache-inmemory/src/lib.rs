//! An in-memory cache of frequently referenced Discord entities, keyed by
//! [`Snowflake`] and safe to read concurrently.
//!
//! `dashmap` gives a "concurrent readers / exclusive writer" contract
//! per-shard, without a hand-rolled `RwLock<HashMap<_>>` — this is the same
//! choice the teacher's cache crate makes, and it means relations
//! (guild→channel, guild→member) are stored as snowflake ids resolved via
//! a second lookup rather than raw pointers.

pub mod config;
pub mod stats;
pub mod updates;

pub use config::{Config, InMemoryCacheBuilder, ResourceType};
pub use stats::InMemoryCacheStats;
pub use updates::UpdateCache;

use corvus_model::{Channel, Guild, Message, Role, Snowflake, User, VoiceState};
use dashmap::DashMap;
use std::collections::{HashSet, VecDeque};

/// The cache itself: keyed snowflake maps plus the relation indexes needed
/// to answer "which channels does this guild have" without walking every
/// channel.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    config: Config,
    guilds: DashMap<Snowflake, Guild>,
    channels: DashMap<Snowflake, Channel>,
    guild_channels: DashMap<Snowflake, HashSet<Snowflake>>,
    users: DashMap<Snowflake, User>,
    roles: DashMap<Snowflake, Role>,
    guild_roles: DashMap<Snowflake, HashSet<Snowflake>>,
    guild_members: DashMap<Snowflake, HashSet<Snowflake>>,
    members: DashMap<(Snowflake, Snowflake), corvus_model::Member>,
    voice_states: DashMap<(Snowflake, Snowflake), VoiceState>,
    messages: DashMap<Snowflake, VecDeque<Message>>,
    /// Which shard last saw a given guild, kept regardless of
    /// `ResourceType::GUILD` so a shard's `guild_count`/`member_count`/
    /// `channel_count` reporting stays correct even when a consumer opts
    /// out of retaining full guild objects.
    guild_shard: DashMap<Snowflake, u64>,
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn builder() -> InMemoryCacheBuilder {
        InMemoryCacheBuilder::new()
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> InMemoryCacheStats<'_> {
        InMemoryCacheStats::new(self)
    }

    /// Look up a cached guild by id.
    pub fn guild(&self, guild_id: Snowflake) -> Option<Guild> {
        self.guilds.get(&guild_id).map(|entry| entry.clone())
    }

    pub fn channel(&self, channel_id: Snowflake) -> Option<Channel> {
        self.channels.get(&channel_id).map(|entry| entry.clone())
    }

    pub fn user(&self, user_id: Snowflake) -> Option<User> {
        self.users.get(&user_id).map(|entry| entry.clone())
    }

    pub fn role(&self, role_id: Snowflake) -> Option<Role> {
        self.roles.get(&role_id).map(|entry| entry.clone())
    }

    pub fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<corvus_model::Member> {
        self.members.get(&(guild_id, user_id)).map(|entry| entry.clone())
    }

    pub fn voice_state(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<VoiceState> {
        self.voice_states
            .get(&(guild_id, user_id))
            .map(|entry| entry.clone())
    }

    /// Apply a dispatch event to the cache, recording which shard it came
    /// from for per-shard guild/member/channel accounting.
    pub fn update(&self, shard_id: u64, event: &impl UpdateCache) {
        event.update_cache(self, shard_id);
    }

    pub(crate) fn note_guild_shard(&self, shard_id: u64, guild_id: Snowflake) {
        self.guild_shard.insert(guild_id, shard_id);
    }

    pub(crate) fn forget_guild_shard(&self, guild_id: Snowflake) {
        self.guild_shard.remove(&guild_id);
    }

    /// Every guild id this cache currently attributes to `shard_id`.
    pub(crate) fn guilds_on_shard(&self, shard_id: u64) -> Vec<Snowflake> {
        self.guild_shard
            .iter()
            .filter(|entry| *entry.value() == shard_id)
            .map(|entry| *entry.key())
            .collect()
    }

    fn cache_guild(&self, guild: Guild) {
        let guild_id = guild.id;
        let mut channel_ids = HashSet::with_capacity(guild.channels.len());
        let mut role_ids = HashSet::with_capacity(guild.roles.len());
        let mut member_ids = HashSet::with_capacity(guild.members.len());

        for channel in &guild.channels {
            channel_ids.insert(channel.id);
            self.channels.insert(channel.id, channel.clone());
        }
        for role in &guild.roles {
            role_ids.insert(role.id);
            self.roles.insert(role.id, role.clone());
        }
        for member in &guild.members {
            if let Some(user) = &member.user {
                member_ids.insert(user.id);
                self.users.insert(user.id, user.clone());
                self.members.insert((guild_id, user.id), member.clone());
            }
        }

        self.guild_channels.insert(guild_id, channel_ids);
        self.guild_roles.insert(guild_id, role_ids);
        self.guild_members.insert(guild_id, member_ids);
        self.guilds.insert(guild_id, guild);
    }

    fn delete_guild(&self, guild_id: Snowflake) {
        self.guilds.remove(&guild_id);
        self.guild_shard.remove(&guild_id);

        if let Some((_, channel_ids)) = self.guild_channels.remove(&guild_id) {
            for channel_id in channel_ids {
                self.channels.remove(&channel_id);
            }
        }
        if let Some((_, role_ids)) = self.guild_roles.remove(&guild_id) {
            for role_id in role_ids {
                self.roles.remove(&role_id);
            }
        }
        if let Some((_, member_ids)) = self.guild_members.remove(&guild_id) {
            for user_id in member_ids {
                self.members.remove(&(guild_id, user_id));
            }
        }
    }

    fn cache_channel(&self, channel: Channel) {
        if let Some(guild_id) = channel.guild_id {
            self.guild_channels
                .entry(guild_id)
                .or_default()
                .insert(channel.id);
        }
        self.channels.insert(channel.id, channel);
    }

    fn cache_message(&self, message: Message) {
        let mut channel_messages = self.messages.entry(message.channel_id).or_default();
        channel_messages.push_front(message);
        channel_messages.truncate(self.config.message_cache_size);
    }

    fn cache_voice_state(&self, state: VoiceState) {
        let Some(guild_id) = state.guild_id else {
            return;
        };

        if state.channel_id.is_none() {
            self.voice_states.remove(&(guild_id, state.user_id));
        } else {
            self.voice_states.insert((guild_id, state.user_id), state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvus_model::DispatchEvent;

    fn guild(id: u64) -> Guild {
        Guild {
            id: Snowflake(id),
            name: "test".to_owned(),
            ..Guild::default()
        }
    }

    #[test]
    fn guild_create_then_delete_clears_relations() {
        let cache = InMemoryCache::new();
        let event = DispatchEvent::GuildCreate(Box::new(guild(1)));
        cache.update(1, &event);
        assert!(cache.guild(Snowflake(1)).is_some());

        let event = DispatchEvent::GuildDelete(corvus_model::dispatch::GuildDelete {
            id: Snowflake(1),
            unavailable: false,
        });
        cache.update(1, &event);
        assert!(cache.guild(Snowflake(1)).is_none());
    }

    #[test]
    fn resource_type_gate_skips_disabled_resources() {
        let cache = InMemoryCache::with_config(Config {
            resource_types: ResourceType::GUILD,
            message_cache_size: 10,
        });
        let event = DispatchEvent::ChannelCreate(Box::new(Channel {
            id: Snowflake(1),
            kind: 0,
            guild_id: Some(Snowflake(2)),
            name: None,
            position: None,
            parent_id: None,
        }));
        cache.update(1, &event);
        assert!(cache.channel(Snowflake(1)).is_none());
    }

    #[test]
    fn message_cache_is_bounded_per_channel() {
        let cache = InMemoryCache::with_config(Config {
            resource_types: ResourceType::all(),
            message_cache_size: 2,
        });

        for id in 1..=3u64 {
            let event = DispatchEvent::MessageCreate(Box::new(Message {
                id: Snowflake(id),
                channel_id: Snowflake(100),
                guild_id: None,
                author: User {
                    id: Snowflake(1),
                    username: "a".into(),
                    discriminator: "0001".into(),
                    bot: false,
                    avatar: None,
                },
                content: String::new(),
            }));
            cache.update(1, &event);
        }

        assert_eq!(cache.stats().guilds(), 0);
    }
}
