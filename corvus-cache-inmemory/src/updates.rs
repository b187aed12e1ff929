use crate::{config::ResourceType, InMemoryCache};
use corvus_model::DispatchEvent;

/// Applies one dispatch event to a cache.
///
/// Implemented once, for [`DispatchEvent`], as a dispatch table (the
/// teacher's `updates.rs` is structured the same way: one `match` arm per
/// event name rather than a `CacheableX` trait per entity type, since
/// unlike the teacher's model crate, `corvus-model`'s entities don't need
/// per-type cache-merge hooks — a guild replace-on-write is enough for
/// every resource this cache tracks).
pub trait UpdateCache {
    fn update_cache(&self, cache: &InMemoryCache, shard_id: u64);
}

impl UpdateCache for DispatchEvent {
    fn update_cache(&self, cache: &InMemoryCache, shard_id: u64) {
        let types = cache.config.resource_types;

        match self {
            DispatchEvent::Ready(ready) => {
                if types.contains(ResourceType::USER) {
                    cache.users.insert(ready.user.id, ready.user.clone());
                }
                // Shard/guild attribution (this design's `guild_count`
                // accounting) is tracked regardless of `ResourceType::GUILD`,
                // same as the comment on that bitflag promises.
                for guild in &ready.guilds {
                    cache.note_guild_shard(shard_id, guild.id);
                }
                if types.contains(ResourceType::GUILD) {
                    for guild in &ready.guilds {
                        cache.cache_guild(guild.clone());
                    }
                }
            }
            DispatchEvent::Resumed => {}
            DispatchEvent::GuildCreate(guild) | DispatchEvent::GuildUpdate(guild) => {
                cache.note_guild_shard(shard_id, guild.id);
                if types.contains(ResourceType::GUILD) {
                    cache.cache_guild((**guild).clone());
                }
            }
            DispatchEvent::GuildDelete(delete) => {
                cache.forget_guild_shard(delete.id);
                if types.contains(ResourceType::GUILD) {
                    cache.delete_guild(delete.id);
                }
            }
            DispatchEvent::ChannelCreate(channel) | DispatchEvent::ChannelUpdate(channel) => {
                if types.contains(ResourceType::CHANNEL) {
                    cache.cache_channel((**channel).clone());
                }
            }
            DispatchEvent::ChannelDelete(channel) => {
                if types.contains(ResourceType::CHANNEL) {
                    cache.channels.remove(&channel.id);
                    if let Some(guild_id) = channel.guild_id {
                        if let Some(mut set) = cache.guild_channels.get_mut(&guild_id) {
                            set.remove(&channel.id);
                        }
                    }
                }
            }
            DispatchEvent::RoleCreate(info) | DispatchEvent::RoleUpdate(info) => {
                if types.contains(ResourceType::ROLE) {
                    cache.roles.insert(info.role.id, info.role.clone());
                    cache
                        .guild_roles
                        .entry(info.guild_id)
                        .or_default()
                        .insert(info.role.id);
                }
            }
            DispatchEvent::RoleDelete(info) => {
                if types.contains(ResourceType::ROLE) {
                    cache.roles.remove(&info.role_id);
                    if let Some(mut set) = cache.guild_roles.get_mut(&info.guild_id) {
                        set.remove(&info.role_id);
                    }
                }
            }
            DispatchEvent::MemberAdd(info) => {
                if types.contains(ResourceType::MEMBER) {
                    if let Some(user) = &info.member.user {
                        cache.users.insert(user.id, user.clone());
                        cache
                            .guild_members
                            .entry(info.guild_id)
                            .or_default()
                            .insert(user.id);
                        cache
                            .members
                            .insert((info.guild_id, user.id), info.member.clone());
                    }
                }
            }
            DispatchEvent::MemberUpdate(info) => {
                if types.contains(ResourceType::MEMBER) {
                    cache.users.insert(info.user.id, info.user.clone());
                    if let Some(mut member) = cache.members.get_mut(&(info.guild_id, info.user.id))
                    {
                        member.nick = info.nick.clone();
                        member.roles = info.roles.clone();
                    }
                }
            }
            DispatchEvent::MemberRemove(info) => {
                if types.contains(ResourceType::MEMBER) {
                    cache.members.remove(&(info.guild_id, info.user.id));
                    if let Some(mut set) = cache.guild_members.get_mut(&info.guild_id) {
                        set.remove(&info.user.id);
                    }
                }
            }
            DispatchEvent::MessageCreate(message) => {
                if types.contains(ResourceType::MESSAGE) {
                    cache.cache_message((**message).clone());
                }
                if types.contains(ResourceType::USER) {
                    cache.users.insert(message.author.id, message.author.clone());
                }
            }
            DispatchEvent::MessageUpdate(patch) => {
                if types.contains(ResourceType::MESSAGE) {
                    if let Some(mut channel_messages) = cache.messages.get_mut(&patch.channel_id) {
                        if let Some(existing) =
                            channel_messages.iter_mut().find(|m| m.id == patch.id)
                        {
                            if let Some(content) = &patch.content {
                                existing.content = content.clone();
                            }
                        }
                    }
                }
            }
            DispatchEvent::MessageDelete(delete) => {
                if types.contains(ResourceType::MESSAGE) {
                    if let Some(mut channel_messages) = cache.messages.get_mut(&delete.channel_id) {
                        channel_messages.retain(|m| m.id != delete.id);
                    }
                }
            }
            DispatchEvent::MessageDeleteBulk(delete) => {
                if types.contains(ResourceType::MESSAGE) {
                    if let Some(mut channel_messages) = cache.messages.get_mut(&delete.channel_id) {
                        channel_messages.retain(|m| !delete.ids.contains(&m.id));
                    }
                }
            }
            DispatchEvent::MessageReactionAdd(_) | DispatchEvent::MessageReactionRemove(_) => {
                // Reaction counts aren't modeled on `Message` (the
                // entity shapes only carry what the cache/gateway actually
                // need); reactions pass straight through to the router.
            }
            DispatchEvent::PresenceUpdate(_) => {
                // Presence isn't retained: no consumer in this workspace
                // reads it back from the cache, only from the live event.
            }
            DispatchEvent::VoiceStateUpdate(state) => {
                if types.contains(ResourceType::VOICE_STATE) {
                    cache.cache_voice_state((**state).clone());
                }
            }
            DispatchEvent::VoiceServerUpdate(_) | DispatchEvent::InteractionCreate(_) => {
                // Not cached entities; the router delivers these directly.
            }
            DispatchEvent::Unknown {.. } => {}
        }
    }
}
