//! The shard connection: a public [`Shard`] handle plus the supervisor and
//! per-connection run loop driving one gateway websocket (this design.3).
//!
//! Grounded on the teacher's `ShardProcessor`/`Session` split: `Session`
//! (see [`crate::session`]) is the `Arc`-shared mutable state other tasks
//! read, while the run loop here plays the role of the teacher's processor
//! — it owns the socket and drives the state machine, spawning a
//! `Heartbeater`-equivalent task and a socket-forwarder task per connection,
//! the same shape as the teacher's `start_heartbeater`/`SocketForwarder`.

use crate::{
    codec::{self, Transport},
    error::{ShardError, ShardErrorType},
    inflater::Inflater,
    session::Session,
    stage::Stage,
    voice::VoiceAction,
};
use corvus_model::{
    dispatch::{parse_dispatch_event, DispatchEvent},
    event::{parse_gateway_event, GatewayEvent},
    payload, CloseCode, Intents, Snowflake,
};
use futures_util::{SinkExt, StreamExt};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    time::Duration,
};
use tokio::{
    net::TcpStream,
    sync::{
        mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
        Notify,
    },
    task::JoinHandle,
};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// 1 initial attempt plus up to 4 retries, per the design.
const CONNECT_ATTEMPTS: u32 = 5;
/// Unsolicited websocket-level ping cadence, distinct from the gateway's own
/// heartbeat.
const SOCKET_PING_INTERVAL: Duration = Duration::from_secs(20);
/// Grace period given to the forwarder task to flush a just-queued close
/// frame onto the socket before the connection is torn down.
const CLOSE_FLUSH_GRACE: Duration = Duration::from_millis(200);

/// Something the shard supervisor awaits before every connect attempt
/// (initial or reconnect). The cluster implements this to enforce the
/// global `≥ 5 s` reconnect spacing of this design across every shard it
/// owns; a standalone shard with no cluster can use [`ImmediateGate`].
pub trait ReconnectGate: Send + Sync {
    fn wait<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// A gate that never waits, for running a single [`Shard`] outside a
/// cluster (tests, small bots with one shard and no reconnect spacing
/// requirement beyond what Discord itself enforces on its end).
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateGate;

impl ReconnectGate for ImmediateGate {
    fn wait<'a>(&'a self) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }
}

#[derive(Clone, Debug)]
pub struct ShardConfig {
    pub shard_id: u64,
    pub shard_count: u64,
    pub token: String,
    pub intents: Intents,
    pub transport: Transport,
    pub compressed: bool,
    /// The base gateway URL from `GET /gateway/bot`, used for the very
    /// first connect and for any re-identify after the session is reset.
    pub gateway_url: String,
}

#[derive(Clone, Debug)]
pub struct ShardConfigBuilder {
    shard_id: u64,
    shard_count: u64,
    token: String,
    intents: Intents,
    transport: Transport,
    compressed: bool,
    gateway_url: String,
}

impl ShardConfigBuilder {
    #[must_use]
    pub fn new(token: impl Into<String>, gateway_url: impl Into<String>) -> Self {
        Self {
            shard_id: 0,
            shard_count: 1,
            token: token.into(),
            intents: Intents::empty(),
            transport: Transport::Json,
            compressed: true,
            gateway_url: gateway_url.into(),
        }
    }

    #[must_use]
    pub const fn shard(mut self, shard_id: u64, shard_count: u64) -> Self {
        self.shard_id = shard_id;
        self.shard_count = shard_count;
        self
    }

    #[must_use]
    pub const fn intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    #[must_use]
    pub const fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub const fn compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    #[must_use]
    pub fn build(self) -> ShardConfig {
        ShardConfig {
            shard_id: self.shard_id,
            shard_count: self.shard_count,
            token: self.token,
            intents: self.intents,
            transport: self.transport,
            compressed: self.compressed,
            gateway_url: self.gateway_url,
        }
    }
}

/// What the run loop surfaces to whoever is driving the shard (normally the
/// cluster, which feeds these into the cache and the event router).
#[derive(Debug)]
pub enum ShardEvent {
    Dispatch(DispatchEvent),
    /// A voice rendezvous completed for this guild.
    VoiceReady { guild_id: Snowflake },
    /// The connection dropped and a reconnect is about to be attempted.
    Reconnecting,
    /// The run loop ended for good; no further events will arrive.
    Closed(ShardError),
}

/// A running shard's public handle: outbound actions plus read access to
/// its [`Session`]. Cloning is cheap; every clone shares the same
/// underlying connection and outbound queue.
#[derive(Clone, Debug)]
pub struct Shard {
    config: ShardConfig,
    session: Arc<Session>,
}

impl Shard {
    /// Start the shard's supervisor task and return the handle plus the
    /// channel of events it will produce. The supervisor runs until a
    /// fatal error (e.g. a disallowed-intents close) or the handle and its
    /// receiver are both dropped.
    #[must_use]
    pub fn connect(config: ShardConfig, gate: Arc<dyn ReconnectGate>) -> (Self, UnboundedReceiver<ShardEvent>) {
        let session = Session::new(config.shard_id, config.shard_count, config.transport, config.compressed);
        let (events_tx, events_rx) = unbounded_channel();

        let supervisor_session = Arc::clone(&session);
        let supervisor_config = config.clone();
        tokio::spawn(async move {
            run_supervisor(supervisor_session, supervisor_config, gate, events_tx).await;
        });

        (Self { config, session }, events_rx)
    }

    #[must_use]
    pub const fn shard_id(&self) -> u64 {
        self.config.shard_id
    }

    #[must_use]
    pub const fn shard_count(&self) -> u64 {
        self.config.shard_count
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.session.stage()
    }

    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.session.websocket_ping()
    }

    fn send(&self, payload: impl serde::Serialize) {
        match codec::encode(self.session.transport, payload) {
            Ok(bytes) => self.session.outbound.push(bytes, true),
            Err(error) => warn!(shard_id = self.config.shard_id, %error, "failed to encode outbound payload"),
        }
    }

    pub fn update_presence(&self, status: payload::PresenceStatus, afk: bool) {
        self.send(payload::update_presence(status, afk));
    }

    pub fn request_guild_members_by_query(&self, guild_id: Snowflake, query: impl Into<String>, limit: u32) {
        self.send(payload::request_guild_members_by_query(guild_id, query, limit));
    }

    pub fn request_guild_members_by_ids(&self, guild_id: Snowflake, user_ids: Vec<Snowflake>) {
        self.send(payload::request_guild_members_by_ids(guild_id, user_ids));
    }

    /// `connect_voice` per the design: idempotent for an already pending or
    /// active connection to the same channel.
    pub fn connect_voice(&self, guild_id: Snowflake, channel_id: Snowflake, self_mute: bool, self_deaf: bool, dave: bool) {
        let action = self
            .session
            .voice
            .lock()
            .expect("voice poisoned")
            .connect(guild_id, channel_id, dave);

        if let VoiceAction::SendVoiceStateUpdate { channel_id } = action {
            self.send(payload::update_voice_state(guild_id, channel_id, self_mute, self_deaf));
        }
    }

    pub fn disconnect_voice(&self, guild_id: Snowflake) {
        let action = self.session.voice.lock().expect("voice poisoned").disconnect(guild_id, false);

        if let VoiceAction::SendVoiceStateUpdate { channel_id } = action {
            self.send(payload::update_voice_state(guild_id, channel_id, false, false));
        }
    }
}

/// Aborts every held task on drop, mirroring the teacher's
/// `AbortHandle`-based `stop_heartbeater`: a connection's background tasks
/// (heartbeater, socket forwarder, ping ticker) never outlive the
/// connection they serve.
struct TaskGuard(Vec<JoinHandle<()>>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

async fn run_supervisor(
    session: Arc<Session>,
    config: ShardConfig,
    gate: Arc<dyn ReconnectGate>,
    events_tx: UnboundedSender<ShardEvent>,
) {
    loop {
        gate.wait().await;

        let url = if session.can_resume() {
            session.resume_gateway_url().unwrap_or_else(|| config.gateway_url.clone())
        } else {
            config.gateway_url.clone()
        };

        match connect_once(&session, &url, &config, &events_tx).await {
            Err(error) if error.is_fatal() => {
                debug!(shard_id = config.shard_id, %error, "shard closing permanently");
                let _ = events_tx.send(ShardEvent::Closed(error));
                return;
            }
            Err(error) => {
                debug!(shard_id = config.shard_id, %error, "shard reconnecting");
                session.record_reconnect();
                session.set_stage(Stage::Reconnecting);
                if events_tx.send(ShardEvent::Reconnecting).is_err() {
                    return;
                }
            }
            Ok(()) => {}
        }
    }
}

async fn connect_websocket(url: &str) -> Result<WsStream, ShardError> {
    for attempt in 1..=CONNECT_ATTEMPTS {
        match tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(url)).await {
            Ok(Ok((stream, _response))) => return Ok(stream),
            Ok(Err(source)) if attempt == CONNECT_ATTEMPTS => {
                return Err(ShardError::with_source(ShardErrorType::Connection, source));
            }
            Err(_) if attempt == CONNECT_ATTEMPTS => {
                return Err(ShardError::new(ShardErrorType::ConnectTimedOut));
            }
            Ok(Err(source)) => trace!(%source, attempt, "gateway connect attempt failed, retrying"),
            Err(_) => trace!(attempt, "gateway connect attempt timed out, retrying"),
        }
    }

    unreachable!("the final attempt above always returns")
}

fn connect_url(base: &str, transport: Transport, compressed: bool) -> String {
    let compress = if compressed { "&compress=zlib-stream" } else { "" };
    format!("{base}/?v=10&encoding={}{compress}", transport.query_value())
}

fn spawn_heartbeater(session: Arc<Session>, force_reconnect: Arc<Notify>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let period_ms = (session.heartbeat_interval_ms() as f64 * 0.75) as u64;
            tokio::time::sleep(Duration::from_millis(period_ms)).await;

            if session.note_heartbeat_interval_elapsed() > 2 {
                trace!(shard_id = session.shard_id, "missed two heartbeat acks, forcing reconnect");
                force_reconnect.notify_one();
                return;
            }

            match codec::encode(session.transport, payload::Heartbeat::new(session.last_seq())) {
                Ok(bytes) => session.outbound.push_heartbeat(bytes),
                Err(error) => {
                    warn!(shard_id = session.shard_id, %error, "failed to encode heartbeat");
                    force_reconnect.notify_one();
                    return;
                }
            }
        }
    })
}

fn spawn_socket_ping(outbound: UnboundedSender<Message>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SOCKET_PING_INTERVAL);
        loop {
            interval.tick().await;
            if outbound.send(Message::Ping(Vec::new())).is_err() {
                return;
            }
        }
    })
}

fn spawn_forwarder(
    mut write: futures_util::stream::SplitSink<WsStream, Message>,
    mut outbound_rx: UnboundedReceiver<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if write.send(message).await.is_err() {
                return;
            }
        }
    })
}

/// Send the handshake frame appropriate to the session's current state
/// (this design's `HELLO_WAIT` row): `RESUME` if a prior session can be
/// resumed, otherwise a fresh `IDENTIFY`.
fn send_handshake(session: &Session, config: &ShardConfig, outbound: &UnboundedSender<Message>) -> Result<(), ShardError> {
    let payload_bytes = if let Some(session_id) = session.session_id().filter(|_| session.can_resume()) {
        session.set_stage(Stage::Resuming);
        codec::encode(session.transport, payload::resume(&config.token, &session_id, session.last_seq()))
    } else {
        session.set_stage(Stage::Identifying);
        codec::encode(
            session.transport,
            payload::identify(&config.token, config.shard_id, config.shard_count, config.intents),
        )
    }
.map_err(|source| ShardError::with_source(ShardErrorType::Serializing, source))?;

    outbound
.send(Message::Binary(payload_bytes))
.map_err(|_| ShardError::new(ShardErrorType::Connection))
}

/// Run a single connection end to end: connect, handshake, then forward
/// inbound frames through the state machine until the socket closes or a
/// fatal condition is hit. Every background task it spawns is torn down
/// before this returns.
#[instrument(skip(session, config, events_tx), fields(shard_id = config.shard_id))]
async fn connect_once(
    session: &Arc<Session>,
    url: &str,
    config: &ShardConfig,
    events_tx: &UnboundedSender<ShardEvent>,
) -> Result<(), ShardError> {
    let full_url = connect_url(url, session.transport, session.compressed);
    let stream = connect_websocket(&full_url).await?;
    let (write, mut read) = stream.split();

    let (outbound_tx, outbound_rx) = unbounded_channel::<Message>();
    session.outbound.spawn_tick_task(outbound_tx.clone());

    let force_reconnect = Arc::new(Notify::new());
    let mut guard = TaskGuard(vec![
        spawn_forwarder(write, outbound_rx),
        spawn_socket_ping(outbound_tx.clone()),
    ]);

    let mut inflater = session.compressed.then(Inflater::new);
    let mut heartbeater_started = false;

    loop {
        let frame = tokio::select! {
            frame = read.next() => frame,
            () = force_reconnect.notified() => {
                return Err(ShardError::new(ShardErrorType::Reconnect));
            }
        };

        let message = match frame {
            Some(Ok(message)) => message,
            Some(Err(source)) => return Err(ShardError::with_source(ShardErrorType::Connection, source)),
            None => return Err(ShardError::new(ShardErrorType::Reconnect)),
        };

        let bytes = match message {
            Message::Binary(bytes) => bytes,
            Message::Text(text) => text.into_bytes(),
            Message::Ping(payload) => {
                let _ = outbound_tx.send(Message::Pong(payload));
                continue;
            }
            Message::Pong(_) => continue,
            Message::Close(frame) => {
                return Err(classify_close(frame));
            }
            _ => continue,
        };

        let json_text = if let Some(inflater) = inflater.as_mut() {
            inflater.extend(&bytes);
            match inflater.message() {
                Ok(Some(decompressed)) => codec::frame_to_json_text(session.transport, decompressed),
                Ok(None) => continue,
                Err(source) => return Err(ShardError::with_source(ShardErrorType::Decompressing, source)),
            }
        } else {
            codec::frame_to_json_text(session.transport, &bytes)
        }
.map_err(|source| ShardError::with_source(ShardErrorType::Deserializing, source))?;

        let event = parse_gateway_event(&json_text)
.map_err(|source| ShardError::with_source(ShardErrorType::Deserializing, source))?;

        match event {
            GatewayEvent::Hello { heartbeat_interval_ms } => {
                session.set_heartbeat_interval_ms(heartbeat_interval_ms);
                send_handshake(session, config, &outbound_tx)?;
                if !heartbeater_started {
                    guard.0.push(spawn_heartbeater(Arc::clone(session), Arc::clone(&force_reconnect)));
                    heartbeater_started = true;
                }
            }
            GatewayEvent::Heartbeat {.. } => {
                let bytes = codec::encode(session.transport, payload::Heartbeat::new(session.last_seq()))
.map_err(|source| ShardError::with_source(ShardErrorType::Serializing, source))?;
                session.outbound.push_heartbeat(bytes);
            }
            GatewayEvent::HeartbeatAck => {
                session.record_heartbeat_ack();
            }
            GatewayEvent::Reconnect => {
                let close = Message::Close(Some(tokio_tungstenite::tungstenite::protocol::CloseFrame {
                    code: 1000.into(),
                    reason: "reconnect requested".into(),
                }));
                let _ = outbound_tx.send(close);
                // Give the forwarder a moment to actually write the close
                // frame before `guard` aborts it on return.
                tokio::time::sleep(CLOSE_FLUSH_GRACE).await;
                session.outbound.clear();
                return Err(ShardError::new(ShardErrorType::Reconnect));
            }
            GatewayEvent::InvalidSession { resumable } => {
                trace!(shard_id = config.shard_id, resumable, "invalid session");
                session.reset_session();
                return Err(ShardError::new(ShardErrorType::Reconnect));
            }
            GatewayEvent::Dispatch {
                sequence,
                event_type,
                body,
            } => {
                session.set_last_seq(sequence);

                match parse_dispatch_event(&event_type, body) {
                    Ok(dispatch) => {
                        handle_dispatch(session, &dispatch, events_tx);
                        if events_tx.send(ShardEvent::Dispatch(dispatch)).is_err() {
                            return Ok(());
                        }
                    }
                    Err(error) => warn!(shard_id = config.shard_id, %error, "failed to parse dispatch body"),
                }
            }
        }
    }
}

fn classify_close(frame: Option<tokio_tungstenite::tungstenite::protocol::CloseFrame<'static>>) -> ShardError {
    let Some(frame) = frame else {
        return ShardError::new(ShardErrorType::Reconnect);
    };

    let code = u16::from(frame.code);
    if CloseCode::from_u16(code).is_fatal() {
        ShardError::new(ShardErrorType::FatallyClosed { code })
    } else {
        ShardError::new(ShardErrorType::Reconnect)
    }
}

/// Side effects a dispatch triggers inside the shard itself — session
/// capture on `READY`/`RESUMED`, and feeding the voice rendezvous — before
/// the event is handed off to the cluster.
fn handle_dispatch(session: &Arc<Session>, dispatch: &DispatchEvent, events_tx: &UnboundedSender<ShardEvent>) {
    match dispatch {
        DispatchEvent::Ready(ready) => {
            session.set_ready(ready.session_id.clone(), ready.resume_gateway_url.clone());
            session.set_stage(Stage::Ready);
            session.set_stage(Stage::Running);
        }
        DispatchEvent::Resumed => {
            session.record_resume();
            session.set_stage(Stage::Running);
        }
        DispatchEvent::VoiceStateUpdate(state) => {
            let Some(guild_id) = state.guild_id else {
                return;
            };

            let action = if state.channel_id.is_none() {
                session.voice.lock().expect("voice poisoned").disconnect(guild_id, true)
            } else {
                session
                    .voice
                    .lock()
                    .expect("voice poisoned")
                    .on_voice_state_update(guild_id, state.session_id.clone())
            };

            if action == VoiceAction::BecameActive {
                let _ = events_tx.send(ShardEvent::VoiceReady { guild_id });
            }
        }
        DispatchEvent::VoiceServerUpdate(update) => {
            let Some(endpoint) = update.endpoint.clone() else {
                return;
            };

            let action = session.voice.lock().expect("voice poisoned").on_voice_server_update(
                update.guild_id,
                endpoint,
                update.token.clone(),
            );

            if action == VoiceAction::BecameActive {
                let _ = events_tx.send(ShardEvent::VoiceReady { guild_id: update.guild_id });
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_url_includes_compression_only_when_requested() {
        let with = connect_url("wss://gateway.discord.gg", Transport::Json, true);
        assert_eq!(with, "wss://gateway.discord.gg/?v=10&encoding=json&compress=zlib-stream");

        let without = connect_url("wss://gateway.discord.gg", Transport::Etf, false);
        assert_eq!(without, "wss://gateway.discord.gg/?v=10&encoding=etf");
    }

    #[test]
    fn fatal_close_codes_classify_as_fatal() {
        let frame = Some(tokio_tungstenite::tungstenite::protocol::CloseFrame {
            code: 4004u16.into(),
            reason: "auth failed".into(),
        });
        assert!(classify_close(frame).is_fatal());
    }

    #[test]
    fn recoverable_close_codes_classify_as_reconnect() {
        let frame = Some(tokio_tungstenite::tungstenite::protocol::CloseFrame {
            code: 1001u16.into(),
            reason: "going away".into(),
        });
        assert!(!classify_close(frame).is_fatal());
    }

    #[test]
    fn missing_close_frame_classifies_as_reconnect() {
        assert!(!classify_close(None).is_fatal());
    }
}
