//! The [`Cluster`]: a manager for running and maintaining every shard a bot
//! needs, bringing up sessions in budget-respecting batches, and fanning
//! dispatch events out to one shared cache and event router.
//!
//! Grounded on the teacher's older `gateway::cluster` module (`Cluster`,
//! `ClusterConfig`, the `DashMap<u64, Shard>` + `Arc<ClusterRef>` shape),
//! adapted to this workspace's split-crate architecture: REST, cache, and
//! routing are separate crates here rather than re-exported through the
//! gateway crate itself.

use crate::config::{ClusterConfig, ShardScheme};
use corvus_cache_inmemory::InMemoryCache;
use corvus_gateway::{ReconnectGate, Shard, ShardConfigBuilder, ShardEvent};
use corvus_http::{Client as HttpClient, Error as HttpError, Response};
use corvus_model::{Channel, DispatchEvent, Message, Snowflake};
use corvus_router::EventRouter;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use std::{
    collections::HashMap,
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
    time::{sleep, timeout, Instant},
};
use tracing::{debug, info, instrument, warn};

/// Minimum spacing between any two `IDENTIFY`/`RESUME` attempts across the
/// whole cluster ("enforces ≥ 5s between reconnect attempts
/// globally via `last_identify` timestamp on the cluster").
const RECONNECT_SPACING: Duration = Duration::from_secs(5);

/// How long a startup batch is given to reach [`corvus_gateway::Stage::Ready`]
/// before the cluster gives up waiting on it and starts the next batch
/// anyway (this design's bounded-wait Open Question resolution — see
/// `DESIGN.md`).
const BATCH_READY_TIMEOUT: Duration = Duration::from_secs(90);

/// Pause observed between startup batches, on top of each shard's own
/// per-bucket and daily-budget pacing.
const BATCH_PAUSE: Duration = Duration::from_secs(5);

/// The process-wide `last_identify` gate every shard's supervisor loop
/// awaits before connecting, serializing `IDENTIFY`/`RESUME` attempts
/// across the entire cluster (not just within one shard).
#[derive(Debug)]
struct LastIdentifyGate {
    next_allowed: tokio::sync::Mutex<Instant>,
}

impl LastIdentifyGate {
    fn new() -> Self {
        Self {
            next_allowed: tokio::sync::Mutex::new(Instant::now()),
        }
    }
}

impl ReconnectGate for LastIdentifyGate {
    fn wait<'a>(&'a self) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let mut next_allowed = self.next_allowed.lock().await;
            let now = Instant::now();
            if *next_allowed > now {
                sleep(*next_allowed - now).await;
            }
            *next_allowed = Instant::now() + RECONNECT_SPACING;
        })
    }
}

/// Retrieving gateway metadata during cluster startup failed.
#[derive(Debug)]
pub enum ClusterStartError {
    RetrievingGatewayInfo { source: HttpError },
}

impl Display for ClusterStartError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::RetrievingGatewayInfo {.. } => f.write_str("getting the bot's gateway info failed"),
        }
    }
}

impl StdError for ClusterStartError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::RetrievingGatewayInfo { source } => Some(source),
        }
    }
}

async fn model<T: DeserializeOwned>(
    response: Result<Response<T>, HttpError>,
) -> Result<T, ClusterStartError> {
    let response = response.map_err(|source| ClusterStartError::RetrievingGatewayInfo { source })?;
    response
        .model()
        .await
        .map_err(|source| ClusterStartError::RetrievingGatewayInfo { source })
}

/// Per-shard cache occupancy, reported on demand per the design.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShardStats {
    pub guilds: usize,
    pub members: usize,
    pub channels: usize,
}

struct ClusterRef {
    config: ClusterConfig,
    http: HttpClient,
    cache: Arc<InMemoryCache>,
    router: Arc<EventRouter>,
    gate: Arc<LastIdentifyGate>,
    gateway_url: String,
    shard_ids: Vec<u64>,
    shard_total: u64,
    shards: DashMap<u64, Shard>,
    dm_channels: Mutex<HashMap<Snowflake, Snowflake>>,
}

/// A manager for every shard a bot runs, plus the REST client, cache, and
/// event router they share.
///
/// Cheap to clone: the whole thing lives behind one `Arc`.
#[derive(Clone)]
pub struct Cluster(Arc<ClusterRef>);

/// Returned by [`Cluster::up`]: a non-blocking handle for the shard tasks
/// a startup batch already launched. `run_to_completion` turns this into
/// a blocking join, per the "two explicit entry points" design note.
pub struct ClusterStartHandle {
    cluster: Cluster,
    tasks: Vec<JoinHandle<()>>,
    events: UnboundedReceiver<(u64, ShardEvent)>,
}

impl ClusterStartHandle {
    #[must_use]
    pub fn cluster(&self) -> Cluster {
        self.cluster.clone()
    }

    /// Block until every shard task this handle owns has exited — normally
    /// only on process shutdown, since a shard's own supervisor loop
    /// reconnects indefinitely on recoverable errors.
    pub async fn run_to_completion(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }

    /// Take the combined `(shard_id, event)` stream for every shard this
    /// handle started. May only be called once.
    pub fn events(&mut self) -> &mut UnboundedReceiver<(u64, ShardEvent)> {
        &mut self.events
    }
}

impl Cluster {
    /// Fetch gateway metadata and construct (but do not start) a cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterStartError::RetrievingGatewayInfo`] if `GET
    /// /gateway/bot` fails.
    pub async fn new(config: ClusterConfig) -> Result<Self, ClusterStartError> {
        let http = HttpClient::builder()
            .token(config.token.clone())
            .timeout(config.request_timeout)
            .build();

        let bot_info = model(http.gateway_bot().await).await?;

        let (shard_ids, shard_total): (Vec<u64>, u64) = match &config.shard_scheme {
            ShardScheme::Auto => ((0..bot_info.shards).collect(), bot_info.shards),
            ShardScheme::Range { range, total } => (range.clone().collect(), *total),
        };

        let cache = InMemoryCache::builder()
            .resource_types(config.resource_types)
            .build();

        Ok(Self(Arc::new(ClusterRef {
            gateway_url: bot_info.url,
            shard_ids,
            shard_total,
            http,
            cache: Arc::new(cache),
            router: Arc::new(EventRouter::new()),
            gate: Arc::new(LastIdentifyGate::new()),
            shards: DashMap::new(),
            dm_channels: Mutex::new(HashMap::new()),
            config,
        })))
    }

    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.0.config
    }

    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.0.http
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<InMemoryCache> {
        &self.0.cache
    }

    #[must_use]
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.0.router
    }

    #[must_use]
    pub fn shard(&self, id: u64) -> Option<Shard> {
        self.0.shards.get(&id).map(|entry| entry.value().clone())
    }

    /// `guild_count`/`member_count`/`channel_count` for one shard, computed
    /// by filtering the shared cache's guild map by `shard_id == id` and
    /// summing.
    #[must_use]
    pub fn shard_stats(&self, id: u64) -> ShardStats {
        let stats = self.0.cache.stats();
        ShardStats {
            guilds: stats.guild_count(id),
            members: stats.member_count(id),
            channels: stats.channel_count(id),
        }
    }

    /// Look up (or remember) the DM channel for a user, the way the
    /// teacher's cluster tracks `dm_channels` behind a mutex.
    #[must_use]
    pub fn dm_channel(&self, user_id: Snowflake) -> Option<Snowflake> {
        self.0
            .dm_channels
            .lock()
            .expect("dm_channels poisoned")
            .get(&user_id)
            .copied()
    }

    pub fn remember_dm_channel(&self, user_id: Snowflake, channel_id: Snowflake) {
        self.0
            .dm_channels
            .lock()
            .expect("dm_channels poisoned")
            .insert(user_id, channel_id);
    }

    /// Bring the cluster up: fetch the session-start budget, then launch
    /// every configured shard in batches of `session_start_max_concurrency`,
    /// waiting for each batch to reach `Ready` (bounded by
    /// [`BATCH_READY_TIMEOUT`]) before starting the next one, with a
    /// [`BATCH_PAUSE`] breather in between.
    ///
    /// Returns once gateway metadata has been fetched and the first batch
    /// has been *launched* — not once every shard is ready.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterStartError::RetrievingGatewayInfo`] if refreshing
    /// the session-start budget fails.
    #[instrument(skip(self))]
    pub async fn up(self) -> Result<ClusterStartHandle, ClusterStartError> {
        let bot_info = model(self.0.http.gateway_bot().await).await?;
        let session_start = Arc::new(corvus_gateway::SessionStartLimiter::new(
            &bot_info.session_start_limit,
        ));

        let (events_tx, events_rx) = unbounded_channel();
        let mut tasks = Vec::new();
        let batch_size = usize::try_from(session_start.max_concurrency).unwrap_or(1).max(1);
        let shard_ids = self.0.shard_ids.clone();

        for batch in shard_ids.chunks(batch_size) {
            let mut ready_waiters = Vec::with_capacity(batch.len());

            for &shard_id in batch {
                session_start.acquire(shard_id).await;

                let shard_config = ShardConfigBuilder::new(self.0.config.token.clone(), self.0.gateway_url.clone())
                    .shard(shard_id, self.0.shard_total)
                    .intents(self.0.config.intents)
                    .transport(self.0.config.transport)
                    .compressed(self.0.config.compressed)
                    .build();

                let gate: Arc<dyn ReconnectGate> = Arc::clone(&self.0.gate);
                let (shard, mut shard_events) = Shard::connect(shard_config, gate);
                self.0.shards.insert(shard_id, shard.clone());

                let cluster = self.clone();
                let forward_tx = events_tx.clone();
                let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
                let mut ready_tx = Some(ready_tx);

                tasks.push(tokio::spawn(async move {
                    while let Some(event) = shard_events.recv().await {
                        if let ShardEvent::Dispatch(DispatchEvent::Ready(_)) = &event {
                            if let Some(tx) = ready_tx.take() {
                                let _ = tx.send(());
                            }
                        }
                        cluster.handle_event(shard_id, &event);
                        if forward_tx.send((shard_id, event)).is_err() {
                            break;
                        }
                    }
                }));

                ready_waiters.push(ready_rx);
            }

            for waiter in ready_waiters {
                if timeout(BATCH_READY_TIMEOUT, waiter).await.is_err() {
                    warn!("a shard in this startup batch did not reach Ready within the timeout; proceeding anyway");
                }
            }

            sleep(BATCH_PAUSE).await;
        }

        info!(shards = self.0.shard_ids.len(), "cluster startup batches launched");

        Ok(ClusterStartHandle {
            cluster: self,
            tasks,
            events: events_rx,
        })
    }

    /// Feed one shard's dispatch into the shared cache and event router.
    /// Each [`DispatchEvent`] variant's inner concrete type is what gets
    /// routed, not the enum itself, since [`EventRouter`] is keyed by the
    /// listener's `TypeId`.
    fn handle_event(&self, shard_id: u64, event: &ShardEvent) {
        let ShardEvent::Dispatch(dispatch) = event else {
            return;
        };

        self.0.cache.update(shard_id, dispatch);

        match dispatch {
            DispatchEvent::Ready(ready) => {
                debug!(shard_id, session_id = %ready.session_id, "shard ready");
                self.0.router.dispatch(ready.as_ref);
            }
            DispatchEvent::GuildCreate(guild) => self.0.router.dispatch(guild.as_ref),
            DispatchEvent::GuildUpdate(guild) => self.0.router.dispatch(guild.as_ref),
            DispatchEvent::GuildDelete(event) => self.0.router.dispatch(event),
            DispatchEvent::ChannelCreate(channel) => self.0.router.dispatch(channel.as_ref),
            DispatchEvent::ChannelUpdate(channel) => self.0.router.dispatch(channel.as_ref),
            DispatchEvent::ChannelDelete(channel) => self.0.router.dispatch(channel.as_ref),
            DispatchEvent::RoleCreate(event) => self.0.router.dispatch(event),
            DispatchEvent::RoleUpdate(event) => self.0.router.dispatch(event),
            DispatchEvent::RoleDelete(event) => self.0.router.dispatch(event),
            DispatchEvent::MemberAdd(event) => self.0.router.dispatch(event.as_ref),
            DispatchEvent::MemberUpdate(event) => self.0.router.dispatch(event.as_ref),
            DispatchEvent::MemberRemove(event) => self.0.router.dispatch(event),
            DispatchEvent::MessageCreate(message) => self.0.router.dispatch(message.as_ref),
            DispatchEvent::MessageUpdate(event) => self.0.router.dispatch(event.as_ref),
            DispatchEvent::MessageDelete(event) => self.0.router.dispatch(event),
            DispatchEvent::MessageDeleteBulk(event) => self.0.router.dispatch(event),
            DispatchEvent::MessageReactionAdd(event) => self.0.router.dispatch(event.as_ref),
            DispatchEvent::MessageReactionRemove(event) => self.0.router.dispatch(event.as_ref),
            DispatchEvent::PresenceUpdate(event) => self.0.router.dispatch(event.as_ref),
            DispatchEvent::VoiceStateUpdate(state) => self.0.router.dispatch(state.as_ref),
            DispatchEvent::VoiceServerUpdate(update) => self.0.router.dispatch(update.as_ref),
            DispatchEvent::InteractionCreate(interaction) => self.0.router.dispatch(interaction.as_ref),
            DispatchEvent::Resumed | DispatchEvent::Unknown {.. } => {}
        }
    }

    /// Send a message, threading the internal (authenticated) pipeline.
    pub async fn create_message(
        &self,
        channel_id: Snowflake,
        content: &str,
    ) -> Result<Message, HttpError> {
        self.0
            .http
            .create_message(channel_id)
            .content(content)
            .exec()
            .await?
            .model()
            .await
    }

    /// Delete a channel, threading an optional audit-log reason.
    pub async fn delete_channel(
        &self,
        channel_id: Snowflake,
        reason: Option<&str>,
    ) -> Result<Channel, HttpError> {
        self.0.http.delete_channel(channel_id, reason).await?.model().await
    }

    /// Execute a webhook. Routed through the REST client's un-authenticated
    /// pipeline, since the webhook URL already carries its own auth.
    pub async fn execute_webhook(
        &self,
        webhook_id: Snowflake,
        token: &str,
        content: &str,
        wait: bool,
    ) -> Result<Option<Message>, HttpError> {
        self.0
            .http
            .execute_webhook(webhook_id, token, content, wait)
            .await?
            .model()
            .await
    }

    /// Walk a channel's full message history backwards from `before` (or
    /// the newest message if `None`), paging 100 at a time.
    ///
    /// Implements this design's Open Question #2 fix: stop once a page comes
    /// back with fewer than 100 entries, **or** the oldest id on the page
    /// matches the cursor the page was requested with — the latter guards
    /// against an empty-looking page whose cursor genuinely never moves,
    /// which the source's unconditional "until < 100" recursion would spin
    /// on forever.
    pub async fn channel_messages_before(
        &self,
        channel_id: Snowflake,
        mut before: Option<Snowflake>,
    ) -> Result<Vec<Message>, HttpError> {
        let mut all = Vec::new();

        loop {
            let requested_cursor = before;
            let page = self
                .0
                .http
                .channel_messages(channel_id, Some(100), requested_cursor, None)
                .await?
                .model()
                .await?;

            let page_len = page.len();
            let oldest = page.last().map(|message| message.id);
            all.extend(page);

            if page_len < 100 || oldest == requested_cursor {
                break;
            }

            before = oldest;
        }

        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;
    use std::fmt::Debug;

    assert_impl_all!(Cluster: Clone, Send, Sync);
    assert_impl_all!(ClusterStartError: Debug, StdError, Send, Sync);
}
