use bitflags::bitflags;

bitflags! {
    /// Which resources an [`InMemoryCache`](crate::InMemoryCache) actually
    /// stores.
    ///
    /// Every dispatch still passes through [`crate::UpdateCache::update`],
    /// even for resources that aren't enabled — the bit only gates whether
    /// the update is retained, the same way the teacher's cache builder
    /// works, so the shard's `guild_count`/`channel_count` accounting
    ///  stays correct regardless of which resource types a
    /// consumer opted into.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceType: u64 {
        const CHANNEL = 1;
        const GUILD = 1 << 1;
        const MEMBER = 1 << 2;
        const MESSAGE = 1 << 3;
        const PRESENCE = 1 << 4;
        const REACTION = 1 << 5;
        const ROLE = 1 << 6;
        const USER = 1 << 7;
        const VOICE_STATE = 1 << 8;
    }
}

impl Default for ResourceType {
    fn default() -> Self {
        Self::all()
    }
}

/// Configuration for an [`InMemoryCache`](crate::InMemoryCache).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    pub(crate) resource_types: ResourceType,
    pub(crate) message_cache_size: usize,
}

impl Config {
    pub const fn resource_types(&self) -> ResourceType {
        self.resource_types
    }

    pub const fn message_cache_size(&self) -> usize {
        self.message_cache_size
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resource_types: ResourceType::all(),
            message_cache_size: 100,
        }
    }
}

/// Builder for [`Config`], mirroring the teacher's `*Builder` convention
/// used across the workspace.
#[derive(Clone, Copy, Debug, Default)]
pub struct InMemoryCacheBuilder(Config);

impl InMemoryCacheBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn resource_types(mut self, resource_types: ResourceType) -> Self {
        self.0.resource_types = resource_types;
        self
    }

    #[must_use]
    pub const fn message_cache_size(mut self, message_cache_size: usize) -> Self {
        self.0.message_cache_size = message_cache_size;
        self
    }

    #[must_use]
    pub fn build(self) -> crate::InMemoryCache {
        crate::InMemoryCache::with_config(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resource_types_is_all() {
        assert_eq!(Config::default().resource_types, ResourceType::all());
    }

    #[test]
    fn builder_overrides_message_cache_size() {
        let cache = InMemoryCacheBuilder::new().message_cache_size(50).build();
        assert_eq!(cache.config.message_cache_size, 50);
    }
}
