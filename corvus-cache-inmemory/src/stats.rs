use super::InMemoryCache;
use corvus_model::Snowflake;

/// Read-only accessors backing this design's `guild_count`/`member_count`/
/// `channel_count` shard reporting.
#[derive(Clone, Copy, Debug)]
pub struct InMemoryCacheStats<'a>(&'a InMemoryCache);

impl<'a> InMemoryCacheStats<'a> {
    pub(super) const fn new(cache: &'a InMemoryCache) -> Self {
        Self(cache)
    }

    pub fn guilds(&self) -> usize {
        self.0.guilds.len()
    }

    pub fn channels(&self) -> usize {
        self.0.channels.len()
    }

    pub fn users(&self) -> usize {
        self.0.users.len()
    }

    pub fn roles(&self) -> usize {
        self.0.roles.len()
    }

    pub fn voice_states(&self) -> usize {
        self.0.voice_states.len()
    }

    /// Number of channels belonging to a given guild, or `None` if the
    /// guild isn't cached.
    pub fn guild_channels(&self, guild_id: Snowflake) -> Option<usize> {
        self.0
            .guild_channels
            .get(&guild_id)
            .map(|entry| entry.len())
    }

    /// Number of members of a guild, preferring the live roster
    /// (aggressive caching) and falling back to the approximate
    /// `member_count` the guild object itself carries.
    pub fn guild_members(&self, guild_id: Snowflake) -> Option<usize> {
        if let Some(roster) = self.0.guild_members.get(&guild_id) {
            if !roster.is_empty() {
                return Some(roster.len());
            }
        }

        self.0
            .guilds
            .get(&guild_id)
            .and_then(|guild| guild.member_count)
            .map(|count| count as usize)
    }

    /// Number of guilds a shard owns: filtering the guild map by
    /// `shard_id == self.id`.
    pub fn guild_count(&self, shard_id: u64) -> usize {
        self.0.guilds_on_shard(shard_id).len()
    }

    /// Channels belonging to any guild `shard_id` owns, summed.
    pub fn channel_count(&self, shard_id: u64) -> usize {
        self.0
            .guilds_on_shard(shard_id)
            .into_iter()
            .filter_map(|guild_id| self.guild_channels(guild_id))
            .sum()
    }

    /// Members across every guild `shard_id` owns, summed, using
    /// [`Self::guild_members`]'s roster-or-`member_count` fallback per
    /// guild.
    pub fn member_count(&self, shard_id: u64) -> usize {
        self.0
            .guilds_on_shard(shard_id)
            .into_iter()
            .filter_map(|guild_id| self.guild_members(guild_id))
            .sum()
    }
}
