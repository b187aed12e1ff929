//! Shard session state (this design "Shard state"), `Arc`-shared and
//! atomics-backed so background tasks (the heartbeater, the outbound tick,
//! the run loop) can all read and update it without a single coarse lock —
//! grounded on the teacher's `shard::processor::Session`.

use crate::{
    codec::Transport,
    queue::OutboundQueue,
    stage::Stage,
    voice::VoiceConnections,
};
use corvus_model::Snowflake;
use std::{
    convert::TryFrom,
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Mutex,
    },
    time::{Duration, Instant},
};

/// Fields that only change on a fresh identify/resume cycle, guarded by a
/// single mutex since they're read together far more often than written.
#[derive(Debug, Default)]
struct SessionIdentity {
    session_id: Option<String>,
    resume_gateway_url: Option<String>,
}

#[derive(Debug)]
pub struct Session {
    pub shard_id: u64,
    pub shard_count: u64,
    pub transport: Transport,
    pub compressed: bool,

    identity: Mutex<SessionIdentity>,
    last_seq: AtomicU64,
    stage: AtomicU8,
    heartbeat_interval_ms: AtomicU64,
    last_heartbeat_ack: Mutex<Option<Instant>>,
    missed_acks: AtomicU64,
    websocket_ping: Mutex<Option<Duration>>,
    resumes: AtomicU64,
    reconnects: AtomicU64,

    pub outbound: std::sync::Arc<OutboundQueue>,
    pub voice: Mutex<VoiceConnections>,
}

impl Session {
    #[must_use]
    pub fn new(shard_id: u64, shard_count: u64, transport: Transport, compressed: bool) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            shard_id,
            shard_count,
            transport,
            compressed,
            identity: Mutex::new(SessionIdentity::default()),
            last_seq: AtomicU64::new(0),
            stage: AtomicU8::new(Stage::default() as u8),
            heartbeat_interval_ms: AtomicU64::new(0),
            last_heartbeat_ack: Mutex::new(None),
            missed_acks: AtomicU64::new(0),
            websocket_ping: Mutex::new(None),
            resumes: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            outbound: OutboundQueue::new(),
            voice: Mutex::new(VoiceConnections::new()),
        })
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        Stage::try_from(self.stage.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn set_stage(&self, stage: Stage) {
        self.stage.store(stage as u8, Ordering::Release);
    }

    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.last_seq.load(Ordering::Acquire)
    }

    /// Set the last-seen dispatch sequence. Per this design's invariant, this
    /// only ever increases except through an explicit reset (the caller
    /// is responsible for calling [`Session::reset_session`] for that).
    pub fn set_last_seq(&self, seq: u64) {
        self.last_seq.store(seq, Ordering::Release);
    }

    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.identity.lock().expect("identity poisoned").session_id.clone()
    }

    #[must_use]
    pub fn resume_gateway_url(&self) -> Option<String> {
        self.identity
            .lock()
            .expect("identity poisoned")
            .resume_gateway_url
            .clone()
    }

    /// Whether a resume should be attempted on the next connect, per spec
    /// §3: "once `session_id` is set, resume is preferred … until reset".
    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.identity
            .lock()
            .expect("identity poisoned")
            .session_id
            .is_some()
    }

    pub fn set_ready(&self, session_id: String, resume_gateway_url: String) {
        let mut identity = self.identity.lock().expect("identity poisoned");
        identity.session_id = Some(session_id);
        identity.resume_gateway_url = Some(resume_gateway_url);
    }

    /// Opcode-9 (`INVALID_SESSION`, not resumable) handling: clear session
    /// id and sequence so the next connect issues a fresh `IDENTIFY`
    /// (this design transition table, §8 scenario 2).
    pub fn reset_session(&self) {
        let mut identity = self.identity.lock().expect("identity poisoned");
        identity.session_id = None;
        self.last_seq.store(0, Ordering::Release);
    }

    pub fn record_resume(&self) {
        self.resumes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn resumes(&self) -> u64 {
        self.resumes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn heartbeat_interval_ms(&self) -> u64 {
        self.heartbeat_interval_ms.load(Ordering::Acquire)
    }

    pub fn set_heartbeat_interval_ms(&self, interval: u64) {
        self.heartbeat_interval_ms.store(interval, Ordering::Release);
    }

    /// Record a `HEARTBEAT_ACK` (op 11): clears the missed-ack counter and
    /// computes the round-trip ping from [`OutboundQueue::ping_start`]
    /// ("`ping = now − ping_start`").
    pub fn record_heartbeat_ack(&self) {
        self.missed_acks.store(0, Ordering::Release);
        *self.last_heartbeat_ack.lock().expect("ack poisoned") = Some(Instant::now());

        if let Some(start) = self.outbound.ping_start() {
            *self.websocket_ping.lock().expect("ping poisoned") = Some(start.elapsed());
        }
    }

    /// Called once per heartbeat interval tick before a new heartbeat is
    /// sent; returns the number of consecutive intervals that have now
    /// passed without an ack, per the design ("missed 2 heartbeat acks
    /// forces a reconnect").
    #[must_use]
    pub fn note_heartbeat_interval_elapsed(&self) -> u64 {
        self.missed_acks.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[must_use]
    pub fn websocket_ping(&self) -> Option<Duration> {
        *self.websocket_ping.lock().expect("ping poisoned")
    }

    #[must_use]
    pub fn has_active_voice_connection(&self, guild_id: Snowflake) -> bool {
        self.voice.lock().expect("voice poisoned").is_active(guild_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_session_resets_id_and_sequence_but_resume_url_is_untouched_by_caller() {
        let session = Session::new(0, 1, Transport::Json, false);
        session.set_ready("abc".into(), "wss://r.example".into());
        session.set_last_seq(5);

        assert!(session.can_resume());

        session.reset_session();

        assert!(!session.can_resume());
        assert_eq!(session.last_seq(), 0);
    }

    #[test]
    fn two_missed_intervals_reach_the_force_reconnect_threshold() {
        let session = Session::new(0, 1, Transport::Json, false);
        assert_eq!(session.note_heartbeat_interval_elapsed(), 1);
        assert_eq!(session.note_heartbeat_interval_elapsed(), 2);
    }
}
