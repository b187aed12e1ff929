//! `corvus`: a Discord gateway and REST client library. Wires
//! together the gateway, REST, cache, and event-routing crates into one
//! `Cluster` that runs every shard a bot needs and fans dispatch events out
//! to a shared cache and router.
//!
//! The per-crate pieces (`corvus-gateway`'s `Shard`, `corvus-http`'s
//! `Client`, `corvus-cache-inmemory`'s `InMemoryCache`,
//! `corvus-router`'s `EventRouter`) are each usable standalone; this crate
//! is the batteries-included assembly of all four, re-exported here so a
//! consumer only needs one dependency.

pub mod cluster;
pub mod config;

pub use cluster::{Cluster, ClusterStartError, ClusterStartHandle, ShardStats};
pub use config::{ClusterBuilder, ClusterConfig, ShardScheme};

pub use corvus_cache_inmemory::{InMemoryCache, ResourceType};
pub use corvus_gateway::{Shard, ShardEvent, Stage, Transport};
pub use corvus_http::{Client, Error as HttpError};
pub use corvus_model as model;
pub use corvus_router::{EventContext, EventRouter, Handle};
