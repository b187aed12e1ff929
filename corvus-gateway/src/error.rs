//! Gateway error taxonomy, in the teacher's house style: a
//! `#[non_exhaustive]` kind enum plus a wrapping struct carrying an
//! optional boxed source, with manual `Display`/`Error` impls rather than
//! a derive macro.

use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
};

#[derive(Debug)]
#[non_exhaustive]
pub enum ShardErrorType {
    /// DNS/TCP/TLS failure establishing the websocket connection.
    Connection,
    /// The connect handshake didn't complete within the retry budget
    /// (5s timeout, 4 retries).
    ConnectTimedOut,
    /// A frame couldn't be decoded as JSON, ETF, or a valid gateway
    /// envelope.
    Deserializing,
    /// A payload couldn't be serialized to the wire for the shard's
    /// configured transport.
    Serializing,
    /// The zlib inflate stream reported a decompression error.
    Decompressing,
    /// The websocket closed with a fatal code (4004 and friends).
    FatallyClosed { code: u16 },
    /// The gateway told us to reconnect, or the socket just dropped:
    /// recoverable, the run loop will reconnect and resume/identify.
    Reconnect,
}

impl ShardErrorType {
    /// Whether this error should end the shard's run loop entirely rather
    /// than trigger a reconnect ("authentication errors …
    /// surface as a distinct 'invalid token' exception; do not
    /// reconnect").
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::FatallyClosed {.. })
    }
}

#[derive(Debug)]
pub struct ShardError {
    pub(crate) kind: ShardErrorType,
    pub(crate) source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ShardError {
    pub(crate) fn new(kind: ShardErrorType) -> Self {
        Self { kind, source: None }
    }

    pub(crate) fn with_source(
        kind: ShardErrorType,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &ShardErrorType {
        &self.kind
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }

    /// Split into kind and source, mirroring the teacher's `into_parts`
    /// accessor used across every error type in the workspace.
    #[must_use]
    pub fn into_parts(self) -> (ShardErrorType, Option<Box<dyn StdError + Send + Sync>>) {
        (self.kind, self.source)
    }
}

impl Display for ShardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.kind {
            ShardErrorType::Connection => f.write_str("failed to establish gateway connection"),
            ShardErrorType::ConnectTimedOut => {
                f.write_str("gateway connect attempt exhausted its retry budget")
            }
            ShardErrorType::Deserializing => f.write_str("failed to deserialize gateway payload"),
            ShardErrorType::Serializing => f.write_str("failed to serialize outgoing payload"),
            ShardErrorType::Decompressing => f.write_str("failed to inflate compressed frame"),
            ShardErrorType::FatallyClosed { code } => {
                write!(
                    f,
                    "gateway closed the connection fatally with code {code} ({})",
                    corvus_model::CloseCode::from_u16(*code).reason()
                )
            }
            ShardErrorType::Reconnect => f.write_str("gateway requested a reconnect"),
        }
    }
}

impl StdError for ShardError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatally_closed_is_the_only_fatal_kind() {
        assert!(ShardError::new(ShardErrorType::FatallyClosed { code: 4004 }).is_fatal());
        assert!(!ShardError::new(ShardErrorType::Reconnect).is_fatal());
    }
}
