//! Cluster configuration, in the teacher's builder-pattern house
//! style (mirrors [`corvus_gateway::ShardConfigBuilder`]).

use corvus_cache_inmemory::ResourceType;
use corvus_gateway::Transport;
use corvus_model::Intents;
use std::{ops::Range, time::Duration};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Which shards this process is responsible for, out of the bot's full
/// shard total.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShardScheme {
    /// Start every shard Discord recommends for this bot (the
    /// `shards` field of `GET /gateway/bot`).
    Auto,
    /// Start exactly `range` out of `total` shards, for processes that
    /// split one bot's shards across multiple machines.
    Range { range: Range<u64>, total: u64 },
}

#[derive(Clone, Debug)]
pub struct ClusterConfig {
    pub(crate) token: String,
    pub(crate) intents: Intents,
    pub(crate) transport: Transport,
    pub(crate) compressed: bool,
    pub(crate) shard_scheme: ShardScheme,
    pub(crate) resource_types: ResourceType,
    pub(crate) request_timeout: Duration,
}

/// Builds a [`ClusterConfig`], and from it a
/// [`Cluster`](crate::cluster::Cluster).
#[derive(Clone, Debug)]
pub struct ClusterBuilder {
    config: ClusterConfig,
}

impl ClusterBuilder {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            config: ClusterConfig {
                token: token.into(),
                intents: Intents::empty(),
                transport: Transport::Json,
                compressed: true,
                shard_scheme: ShardScheme::Auto,
                resource_types: ResourceType::all(),
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            },
        }
    }

    #[must_use]
    pub const fn intents(mut self, intents: Intents) -> Self {
        self.config.intents = intents;
        self
    }

    #[must_use]
    pub const fn transport(mut self, transport: Transport) -> Self {
        self.config.transport = transport;
        self
    }

    #[must_use]
    pub const fn compressed(mut self, compressed: bool) -> Self {
        self.config.compressed = compressed;
        self
    }

    #[must_use]
    pub fn shard_scheme(mut self, scheme: ShardScheme) -> Self {
        self.config.shard_scheme = scheme;
        self
    }

    #[must_use]
    pub const fn resource_types(mut self, resource_types: ResourceType) -> Self {
        self.config.resource_types = resource_types;
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn build(self) -> ClusterConfig {
        self.config
    }
}

impl ClusterConfig {
    #[must_use]
    pub fn builder(token: impl Into<String>) -> ClusterBuilder {
        ClusterBuilder::new(token)
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;
    use std::fmt::Debug;

    assert_impl_all!(ClusterConfig: Debug, Send, Sync, Clone);

    #[test]
    fn defaults_to_auto_sharding_and_full_compression() {
        let config = ClusterBuilder::new("token").build();
        assert_eq!(config.shard_scheme, ShardScheme::Auto);
        assert!(config.compressed);
    }
}
