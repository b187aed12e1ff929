//! Data model shared across the Corvus workspace: snowflakes, gateway wire
//! types, and the neutral document model the ETF and JSON codecs both
//! convert through.

pub mod close_code;
pub mod dispatch;
pub mod document;
pub mod entity;
pub mod event;
pub mod intents;
pub mod interaction;
pub mod opcode;
pub mod payload;
pub mod snowflake;
pub mod timestamp;

pub use close_code::CloseCode;
pub use dispatch::{parse_dispatch_event, DispatchEvent, DispatchParsingError};
pub use document::{Document, EtfError};
pub use entity::{
    CachedEntity, Channel, GatewayBotInfo, Guild, Member, Message, Ready, Role, SessionStartLimit,
    User, VoiceServerUpdate, VoiceState,
};
pub use event::{parse_gateway_event, GatewayEvent, GatewayEventParsingError};
pub use intents::Intents;
pub use interaction::Interaction;
pub use opcode::OpCode;
pub use snowflake::Snowflake;
pub use timestamp::{parse_timestamp, parse_timestamp_millis};
