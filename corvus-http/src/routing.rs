//! Maps typed request builders onto wire paths and ratelimit buckets.
//!
//! Grounded on the teacher's `routing::Route`, pared down to the resources
//! this crate actually exposes typed builders for (this design names this
//! "endpoint" routing; the bucket key itself lives in
//! `corvus-http-ratelimiting` so that crate stays reusable outside of this
//! one).

use corvus_http_ratelimiting::{Method as BucketMethod, Path};
use corvus_model::Snowflake;
use hyper::Method;
use std::fmt::Write as _;

#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Route<'a> {
    GetGateway,
    GetGatewayBot,
    CreateMessage {
        channel_id: Snowflake,
    },
    GetChannelMessages {
        channel_id: Snowflake,
        limit: Option<u64>,
        before: Option<Snowflake>,
        after: Option<Snowflake>,
    },
    UpdateMessage {
        channel_id: Snowflake,
        message_id: Snowflake,
    },
    DeleteMessage {
        channel_id: Snowflake,
        message_id: Snowflake,
    },
    GetChannel {
        channel_id: Snowflake,
    },
    UpdateChannel {
        channel_id: Snowflake,
    },
    DeleteChannel {
        channel_id: Snowflake,
    },
    GetGuild {
        guild_id: Snowflake,
    },
    CreateGuildCommand {
        application_id: Snowflake,
        guild_id: Snowflake,
    },
    CreateWebhook {
        channel_id: Snowflake,
    },
    ExecuteWebhook {
        webhook_id: Snowflake,
        token: &'a str,
        wait: bool,
    },
}

impl<'a> Route<'a> {
    /// Decompose into the HTTP method, ratelimiting bucket, and the
    /// path (without the `/api/v10/` prefix or leading slash) to request.
    #[must_use]
    pub fn into_parts(self) -> (Method, Path, String) {
        match self {
            Self::GetGateway => (Method::GET, Path::Gateway, "gateway".to_owned()),
            Self::GetGatewayBot => (Method::GET, Path::GatewayBot, "gateway/bot".to_owned()),
            Self::CreateMessage { channel_id } => (
                Method::POST,
                Path::ChannelsIdMessages(channel_id),
                format!("channels/{channel_id}/messages"),
            ),
            Self::GetChannelMessages {
                channel_id,
                limit,
                before,
                after,
            } => {
                let mut path = format!("channels/{channel_id}/messages?");
                if let Some(limit) = limit {
                    let _ = write!(path, "limit={limit}&");
                }
                if let Some(before) = before {
                    let _ = write!(path, "before={before}&");
                }
                if let Some(after) = after {
                    let _ = write!(path, "after={after}&");
                }
                path.pop();

                (
                    Method::GET,
                    Path::ChannelsIdMessages(channel_id),
                    path,
                )
            }
            Self::UpdateMessage {
                channel_id,
                message_id,
            } => (
                Method::PATCH,
                Path::ChannelsIdMessagesId(BucketMethod::Patch, channel_id),
                format!("channels/{channel_id}/messages/{message_id}"),
            ),
            Self::DeleteMessage {
                channel_id,
                message_id,
            } => (
                Method::DELETE,
                Path::ChannelsIdMessagesId(BucketMethod::Delete, channel_id),
                format!("channels/{channel_id}/messages/{message_id}"),
            ),
            Self::GetChannel { channel_id } => (
                Method::GET,
                Path::ChannelsId(channel_id),
                format!("channels/{channel_id}"),
            ),
            Self::UpdateChannel { channel_id } => (
                Method::PATCH,
                Path::ChannelsId(channel_id),
                format!("channels/{channel_id}"),
            ),
            Self::DeleteChannel { channel_id } => (
                Method::DELETE,
                Path::ChannelsId(channel_id),
                format!("channels/{channel_id}"),
            ),
            Self::GetGuild { guild_id } => (
                Method::GET,
                Path::GuildsId(guild_id),
                format!("guilds/{guild_id}"),
            ),
            Self::CreateGuildCommand {
                application_id,
                guild_id,
            } => (
                Method::POST,
                Path::GuildsIdCommands(guild_id),
                format!("applications/{application_id}/guilds/{guild_id}/commands"),
            ),
            Self::CreateWebhook { channel_id } => (
                Method::POST,
                Path::ChannelsId(channel_id),
                format!("channels/{channel_id}/webhooks"),
            ),
            Self::ExecuteWebhook {
                webhook_id,
                token,
                wait,
            } => (
                Method::POST,
                Path::WebhooksIdToken(webhook_id),
                format!("webhooks/{webhook_id}/{token}?wait={wait}"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_message_routes_to_channel_messages_bucket() {
        let (method, path, path_str) = Route::CreateMessage {
            channel_id: Snowflake(123),
        }
        .into_parts();

        assert_eq!(method, Method::POST);
        assert_eq!(path, Path::ChannelsIdMessages(Snowflake(123)));
        assert_eq!(path_str, "channels/123/messages");
    }

    #[test]
    fn delete_message_uses_method_specific_bucket() {
        let (_, path, _) = Route::DeleteMessage {
            channel_id: Snowflake(1),
            message_id: Snowflake(2),
        }
        .into_parts();

        assert_eq!(
            path,
            Path::ChannelsIdMessagesId(BucketMethod::Delete, Snowflake(1))
        );
    }
}
