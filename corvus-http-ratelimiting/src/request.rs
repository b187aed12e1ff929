//! Request shapes used to key ratelimit buckets.
//!
//! Discord's ratelimit buckets are keyed by a route's *template* plus its
//! major parameter (guild/channel/webhook id), never by the literal URL —
//! `GET /channels/1/messages` and `GET /channels/2/messages` are different
//! buckets, but `GET /channels/1/messages` and `GET /channels/1/messages/9`
//! (a single-message fetch) may or may not share one depending on Discord's
//! own bucketing, which is why the major parameter is carried separately
//! from the route shape.

use crate::Snowflake;
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Method {
    Delete,
    Get,
    Patch,
    Post,
    Put,
}

impl Method {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Patch => "PATCH",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// The route a request belongs to, for the purposes of ratelimit bucketing.
///
/// Each variant names a route template and carries whichever major
/// parameter (channel, guild, or webhook id) Discord scopes that route's
/// bucket by. Two requests compare equal under this type, and therefore
/// share a bucket, iff they're the same route template with the same major
/// parameter — never by comparing literal URLs.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Path {
    ChannelsIdMessages(Snowflake),
    ChannelsIdMessagesId(Method, Snowflake),
    ChannelsId(Snowflake),
    GuildsIdCommands(Snowflake),
    GuildsId(Snowflake),
    WebhooksId(Snowflake),
    WebhooksIdToken(Snowflake),
    Gateway,
    GatewayBot,
    /// A route outside this crate's typed builders (e.g. the `raw`
    /// pipeline's arbitrary user URLs); bucketed by method + path alone.
    Other(Method, String),
}

impl Path {
    /// The major parameter this route's bucket is scoped by, if any.
    pub fn major_parameter(&self) -> Option<Snowflake> {
        match self {
            Self::ChannelsIdMessages(id)
            | Self::ChannelsIdMessagesId(_, id)
            | Self::ChannelsId(id)
            | Self::GuildsIdCommands(id)
            | Self::GuildsId(id)
            | Self::WebhooksId(id)
            | Self::WebhooksIdToken(id) => Some(*id),
            Self::Gateway | Self::GatewayBot | Self::Other(..) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_route_same_major_param_is_one_bucket_key() {
        let a = Path::ChannelsIdMessages(Snowflake(1));
        let b = Path::ChannelsIdMessages(Snowflake(1));
        assert_eq!(a, b);
    }

    #[test]
    fn same_route_different_major_param_differs() {
        let a = Path::ChannelsIdMessages(Snowflake(1));
        let b = Path::ChannelsIdMessages(Snowflake(2));
        assert_ne!(a, b);
    }
}
