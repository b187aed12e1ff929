//! The public REST client (component C+E of this design): typed builders over
//! the two token-policy pipelines described in this design.

use crate::{
    audit_reason::set_audit_reason,
    error::Error,
    pipeline::{Pipeline, TokenPolicy},
    request::{Attachment, Form, Request},
    response::Response,
    routing::Route,
};
use corvus_http_ratelimiting::{InMemoryRatelimiter, Ratelimiter};
use corvus_model::{Channel, Guild, GatewayBotInfo, Message, Snowflake};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response body of `GET /gateway`: just the connect URL, with no session
/// start limit information (that's only included by the authenticated
/// `/gateway/bot` endpoint, via [`GatewayBotInfo`]).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GatewayUrl {
    pub url: String,
}

/// Builds a [`Client`]; mirrors the teacher's `ClientBuilder` (proxy,
/// ratelimiter swap-in, default timeout) but narrows the TLS backend to
/// the one dependency this crate actually carries (`hyper-rustls`).
pub struct ClientBuilder {
    token: Option<String>,
    proxy_host: Option<String>,
    use_http: bool,
    timeout: Duration,
    ratelimiter_factory: Option<Arc<dyn Fn() -> Arc<dyn Ratelimiter> + Send + Sync>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            token: None,
            proxy_host: None,
            use_http: false,
            timeout: DEFAULT_TIMEOUT,
            ratelimiter_factory: None,
        }
    }
}

impl ClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        let mut token = token.into();
        if !token.starts_with("Bot ") && !token.starts_with("Bearer ") {
            token = format!("Bot {token}");
        }
        self.token = Some(token);
        self
    }

    #[must_use]
    pub fn proxy(mut self, host: impl Into<String>, use_http: bool) -> Self {
        self.proxy_host = Some(host.into());
        self.use_http = use_http;
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Swap in a different ratelimiter backend, via a factory invoked once
    /// per pipeline. Defaults to a fresh [`InMemoryRatelimiter`] per
    /// pipeline if left unset. The `internal` and `raw` pipelines each get
    /// their own ratelimiter instance from this factory, so they never
    /// share global ratelimit state (this design's two-pipeline
    /// independence requirement).
    #[must_use]
    pub fn ratelimiter(
        mut self,
        factory: impl Fn() -> Arc<dyn Ratelimiter> + Send + Sync + 'static,
    ) -> Self {
        self.ratelimiter_factory = Some(Arc::new(factory));
        self
    }

    #[must_use]
    pub fn build(self) -> Client {
        let make_ratelimiter = self
            .ratelimiter_factory
            .unwrap_or_else(|| Arc::new(|| Arc::new(InMemoryRatelimiter::new()) as Arc<dyn Ratelimiter>));

        let internal = Pipeline::new(
            make_ratelimiter(),
            self.token.clone(),
            TokenPolicy::Attach,
            self.timeout,
            self.proxy_host.clone(),
            self.use_http,
        );
        let raw = Pipeline::new(
            make_ratelimiter(),
            self.token,
            TokenPolicy::Never,
            self.timeout,
            self.proxy_host,
            self.use_http,
        );

        Client {
            internal: Arc::new(internal),
            raw: Arc::new(raw),
        }
    }
}

/// The REST client. Cheap to clone: both pipelines are held behind `Arc`.
#[derive(Clone)]
pub struct Client {
    internal: Arc<Pipeline>,
    raw: Arc<Pipeline>,
}

impl Client {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        ClientBuilder::new().token(token).build()
    }

    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The pipeline that never attaches the bot token, for requests against
    /// URLs the caller doesn't control (e.g. CDN links, third-party
    /// webhooks received from other services).
    #[must_use]
    pub fn raw_pipeline(&self) -> &Arc<Pipeline> {
        &self.raw
    }

    async fn exec<T>(&self, request: Request<'_>) -> Result<Response<T>, Error> {
        self.internal.raw(request).await
    }

    pub async fn gateway(&self) -> Result<Response<GatewayUrl>, Error> {
        self.exec(Request::from_route(Route::GetGateway)).await
    }

    pub async fn gateway_bot(&self) -> Result<Response<GatewayBotInfo>, Error> {
        self.exec(Request::from_route(Route::GetGatewayBot)).await
    }

    pub fn create_message(&self, channel_id: Snowflake) -> CreateMessage<'_> {
        CreateMessage::new(self, channel_id)
    }

    pub async fn channel_messages(
        &self,
        channel_id: Snowflake,
        limit: Option<u64>,
        before: Option<Snowflake>,
        after: Option<Snowflake>,
    ) -> Result<Response<Vec<Message>>, Error> {
        self.exec(Request::from_route(Route::GetChannelMessages {
            channel_id,
            limit,
            before,
            after,
        }))
        .await
    }

    pub async fn update_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        content: &str,
    ) -> Result<Response<Message>, Error> {
        #[derive(Serialize)]
        struct Body<'a> {
            content: &'a str,
        }

        let request = Request::builder(Route::UpdateMessage {
            channel_id,
            message_id,
        })
        .json(&Body { content })?
        .build();

        self.exec(request).await
    }

    pub async fn delete_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<Response<()>, Error> {
        self.exec(Request::from_route(Route::DeleteMessage {
            channel_id,
            message_id,
        }))
        .await
    }

    pub async fn channel(&self, channel_id: Snowflake) -> Result<Response<Channel>, Error> {
        self.exec(Request::from_route(Route::GetChannel { channel_id }))
            .await
    }

    /// Delete a channel. Accepts an optional audit-log reason, which is
    /// pushed into the thread-local slot immediately before the request so
    /// it is consumed by exactly this call.
    pub async fn delete_channel(
        &self,
        channel_id: Snowflake,
        reason: Option<&str>,
    ) -> Result<Response<Channel>, Error> {
        if let Some(reason) = reason {
            set_audit_reason(reason)?;
        }

        self.exec(Request::from_route(Route::DeleteChannel { channel_id }))
            .await
    }

    pub async fn guild(&self, guild_id: Snowflake) -> Result<Response<Guild>, Error> {
        self.exec(Request::from_route(Route::GetGuild { guild_id }))
            .await
    }

    /// Create (or execute, via `wait=true`) a webhook message. Routed
    /// through the token-free "raw" pipeline, since the webhook URL itself
    /// already authenticates the request (this design's pipeline split).
    pub async fn execute_webhook(
        &self,
        webhook_id: Snowflake,
        token: &str,
        content: &str,
        wait: bool,
    ) -> Result<Response<Option<Message>>, Error> {
        #[derive(Serialize)]
        struct Body<'a> {
            content: &'a str,
        }

        let request = Request::builder(Route::ExecuteWebhook {
            webhook_id,
            token,
            wait,
        })
        .json(&Body { content })?
        .use_authorization_token(false)
        .build();

        self.raw.raw(request).await
    }
}

/// Typed builder for `POST /channels/{channel_id}/messages`, the one
/// endpoint that needs multipart support.
pub struct CreateMessage<'a> {
    client: &'a Client,
    channel_id: Snowflake,
    content: Option<&'a str>,
    files: Vec<Attachment>,
}

impl<'a> CreateMessage<'a> {
    fn new(client: &'a Client, channel_id: Snowflake) -> Self {
        Self {
            client,
            channel_id,
            content: None,
            files: Vec::new(),
        }
    }

    #[must_use]
    pub fn content(mut self, content: &'a str) -> Self {
        self.content = Some(content);
        self
    }

    #[must_use]
    pub fn attach(mut self, filename: impl Into<String>, content: Vec<u8>) -> Self {
        self.files.push(Attachment {
            filename: filename.into(),
            content,
        });
        self
    }

    pub async fn exec(self) -> Result<Response<Message>, Error> {
        #[derive(Serialize)]
        struct Body<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            content: Option<&'a str>,
        }

        let payload = serde_json::to_vec(&Body {
            content: self.content,
        })
        .map_err(|source| Error::with_source(crate::error::ErrorType::Json, source))?;

        let route = Route::CreateMessage {
            channel_id: self.channel_id,
        };

        let request = if self.files.is_empty() {
            Request::builder(route).body(payload).build()
        } else {
            Request::builder(route)
                .form(Form::new(payload, self.files))
                .build()
        };

        self.client.exec(request).await
    }
}
