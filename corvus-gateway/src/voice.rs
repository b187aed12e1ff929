//! Voice session negotiator : rendezvous between the two
//! dispatch events (`VOICE_STATE_UPDATE`, `VOICE_SERVER_UPDATE`) needed to
//! form a usable voice session, either of which may arrive first.

use corvus_model::Snowflake;
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
struct VoiceConn {
    channel_id: Snowflake,
    dave: bool,
    session_id: Option<String>,
    endpoint: Option<String>,
    token: Option<String>,
}

impl VoiceConn {
    fn is_ready(&self) -> bool {
        self.session_id.is_some() && self.endpoint.is_some() && self.token.is_some()
    }
}

/// Per-shard table of in-progress and active voice connections, keyed by
/// guild.
#[derive(Debug, Default)]
pub struct VoiceConnections {
    pending: HashMap<Snowflake, VoiceConn>,
    active: HashMap<Snowflake, VoiceConn>,
}

/// What the caller should do as a result of feeding a dispatch or a connect
/// request into the negotiator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VoiceAction {
    /// Send an outbound `voice_state_update` (op 4) frame.
    SendVoiceStateUpdate { channel_id: Option<Snowflake> },
    /// Both halves of the rendezvous are now present; the caller may spawn
    /// its voice client (out of scope for this library).
    BecameActive,
    /// Nothing to do — already pending/active, or the entry didn't exist.
    None,
}

impl VoiceConnections {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `connect_voice(guild, channel,..)`: idempotent — connecting again to
    /// the same channel while already pending or active is a no-op.
    pub fn connect(&mut self, guild_id: Snowflake, channel_id: Snowflake, dave: bool) -> VoiceAction {
        if let Some(existing) = self.pending.get(&guild_id).or_else(|| self.active.get(&guild_id)) {
            if existing.channel_id == channel_id {
                return VoiceAction::None;
            }
        }

        self.pending.insert(
            guild_id,
            VoiceConn {
                channel_id,
                dave,
                ..VoiceConn::default()
            },
        );

        VoiceAction::SendVoiceStateUpdate {
            channel_id: Some(channel_id),
        }
    }

    /// Feed in a `VOICE_STATE_UPDATE` dispatch for our own session.
    pub fn on_voice_state_update(&mut self, guild_id: Snowflake, session_id: String) -> VoiceAction {
        let Some(conn) = self.pending.get_mut(&guild_id) else {
            return VoiceAction::None;
        };
        conn.session_id = Some(session_id);
        self.promote_if_ready(guild_id)
    }

    /// Feed in a `VOICE_SERVER_UPDATE` dispatch.
    pub fn on_voice_server_update(
        &mut self,
        guild_id: Snowflake,
        endpoint: String,
        token: String,
    ) -> VoiceAction {
        let Some(conn) = self.pending.get_mut(&guild_id) else {
            return VoiceAction::None;
        };
        conn.endpoint = Some(endpoint);
        conn.token = Some(token);
        self.promote_if_ready(guild_id)
    }

    fn promote_if_ready(&mut self, guild_id: Snowflake) -> VoiceAction {
        let Some(conn) = self.pending.get(&guild_id) else {
            return VoiceAction::None;
        };
        if !conn.is_ready() {
            return VoiceAction::None;
        }

        let conn = self.pending.remove(&guild_id).expect("checked above");
        self.active.insert(guild_id, conn);
        VoiceAction::BecameActive
    }

    #[must_use]
    pub fn is_active(&self, guild_id: Snowflake) -> bool {
        self.active.contains_key(&guild_id)
    }

    /// `disconnect_voice(guild)`: idempotent. `external` is set when the
    /// removal was triggered by an incoming `VOICE_STATE_UPDATE` showing
    /// the bot already left, in which case no outbound op-4 is needed.
    pub fn disconnect(&mut self, guild_id: Snowflake, external: bool) -> VoiceAction {
        let had_entry =
            self.pending.remove(&guild_id).is_some() || self.active.remove(&guild_id).is_some();

        if !had_entry || external {
            return VoiceAction::None;
        }

        VoiceAction::SendVoiceStateUpdate { channel_id: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_is_idempotent_for_the_same_channel() {
        let mut conns = VoiceConnections::new();
        let first = conns.connect(Snowflake(1), Snowflake(2), false);
        assert_ne!(first, VoiceAction::None);

        let second = conns.connect(Snowflake(1), Snowflake(2), false);
        assert_eq!(second, VoiceAction::None);
    }

    #[test]
    fn either_dispatch_order_completes_the_rendezvous() {
        let mut conns = VoiceConnections::new();
        conns.connect(Snowflake(1), Snowflake(2), false);

        assert_eq!(
            conns.on_voice_server_update(Snowflake(1), "e".into(), "t".into()),
            VoiceAction::None
        );
        assert_eq!(
            conns.on_voice_state_update(Snowflake(1), "s".into()),
            VoiceAction::BecameActive
        );
        assert!(conns.is_active(Snowflake(1)));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut conns = VoiceConnections::new();
        conns.connect(Snowflake(1), Snowflake(2), false);

        assert_eq!(
            conns.disconnect(Snowflake(1), false),
            VoiceAction::SendVoiceStateUpdate { channel_id: None }
        );
        assert_eq!(conns.disconnect(Snowflake(1), false), VoiceAction::None);
    }

    #[test]
    fn external_disconnect_suppresses_outbound_frame() {
        let mut conns = VoiceConnections::new();
        conns.connect(Snowflake(1), Snowflake(2), false);

        assert_eq!(conns.disconnect(Snowflake(1), true), VoiceAction::None);
    }
}
