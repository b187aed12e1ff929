//! Discord gateway shard implementation (this design.3, §4.6): owns one
//! websocket connection per shard, the zlib/ETF/JSON wire codec, the
//! heartbeat and outbound-queue discipline, and the voice rendezvous state
//! machine. The cluster-level concerns (sharding a bot across many shards,
//! the daily session-start budget, REST, caching, event routing) live in
//! the crates above this one.

pub mod codec;
pub mod error;
pub mod inflater;
pub mod queue;
pub mod session;
pub mod session_start;
pub mod shard;
pub mod stage;
pub mod voice;

pub use codec::Transport;
pub use error::{ShardError, ShardErrorType};
pub use session::Session;
pub use session_start::SessionStartLimiter;
pub use shard::{ImmediateGate, ReconnectGate, Shard, ShardConfig, ShardConfigBuilder, ShardEvent};
pub use stage::Stage;
pub use voice::{VoiceAction, VoiceConnections};
