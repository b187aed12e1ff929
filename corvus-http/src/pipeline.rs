//! The REST pipeline : ratelimit-gated request dispatch over a
//! `hyper` HTTPS client.
//!
//! Ratelimit bookkeeping itself lives in `corvus-http-ratelimiting`'s
//! [`InMemoryRatelimiter`], which implements spec §4.4's fixed pool of K
//! concurrency queues: a request's [`Path`] hashes to one of K queues, each
//! ticking once a second and dispatching whichever of its buckets may
//! currently proceed. This pipeline is the client-facing half — it asks the
//! ratelimiter for a ticket, performs the HTTPS request once granted, and
//! reports the response's ratelimit headers back so the bucket tracker
//! stays accurate.

use crate::{
    error::{Error, ErrorType},
    request::Request,
    response::Response,
};
use corvus_http_ratelimiting::{headers::RatelimitHeaders, Ratelimiter};
use hyper::{
    client::{Client as HyperClient, HttpConnector},
    header::{HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT},
    Body, Method,
};
use hyper_rustls::HttpsConnector;
use std::{sync::Arc, time::Duration};
use tokio::time;

pub(crate) const API_VERSION: u8 = 10;

/// Whether a pipeline attaches the client's bot token to outbound requests.
///
/// Spec §4.4: "internal" pipelines always attach `Authorization: Bot
/// <token>`; "raw" pipelines never do, so user code that calls arbitrary
/// (non-Discord) URLs can't leak the token to a third party by accident.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TokenPolicy {
    Attach,
    Never,
}

pub struct Pipeline {
    http: HyperClient<HttpsConnector<HttpConnector>, Body>,
    ratelimiter: Arc<dyn Ratelimiter>,
    token: Option<String>,
    token_policy: TokenPolicy,
    timeout: Duration,
    proxy_host: Option<String>,
    use_http: bool,
}

impl Pipeline {
    pub(crate) fn new(
        ratelimiter: Arc<dyn Ratelimiter>,
        token: Option<String>,
        token_policy: TokenPolicy,
        timeout: Duration,
        proxy_host: Option<String>,
        use_http: bool,
    ) -> Self {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http1()
            .build();

        Self {
            http: HyperClient::builder().build(connector),
            ratelimiter,
            token,
            token_policy,
            timeout,
            proxy_host,
            use_http,
        }
    }

    /// Send a request and return the raw response, without deserializing
    /// the body. Errors if the request times out, the connection fails, or
    /// the bucket tracker's ticket channel closes unexpectedly.
    pub async fn raw<T>(&self, request: Request<'_>) -> Result<Response<T>, Error> {
        let Request {
            body,
            form,
            headers: extra_headers,
            method,
            bucket,
            path,
            use_authorization_token,
..
        } = request;

        let scheme = if self.use_http { "http" } else { "https" };
        let host = self.proxy_host.as_deref().unwrap_or("discord.com");
        let url = format!("{scheme}://{host}/api/v{API_VERSION}/{path}");

        let mut builder = hyper::Request::builder().method(method.clone()).uri(&url);

        if use_authorization_token && self.token_policy == TokenPolicy::Attach {
            if let Some(token) = &self.token {
                let value = HeaderValue::from_str(token)
.map_err(|source| Error::with_source(ErrorType::BuildingRequest, source))?;
                if let Some(headers) = builder.headers_mut() {
                    headers.insert(AUTHORIZATION, value);
                }
            }
        }

        if let Some(headers) = builder.headers_mut() {
            headers.insert(
                USER_AGENT,
                HeaderValue::from_static(concat!(
                    "DiscordBot (https://github.com, ",
                    env!("CARGO_PKG_VERSION"),
                    ") corvus-http"
                )),
            );

            if let Some(reason) = crate::audit_reason::take_audit_reason() {
                let encoded =
                    percent_encoding::utf8_percent_encode(&reason, percent_encoding::NON_ALPHANUMERIC)
                        .to_string();
                let value = HeaderValue::from_str(&encoded)
                    .map_err(|source| Error::with_source(ErrorType::BuildingRequest, source))?;
                headers.insert(
                    hyper::header::HeaderName::from_static("x-audit-log-reason"),
                    value,
                );
            }

            if let Some(extra) = extra_headers {
                for (name, value) in extra.iter() {
                    headers.insert(name, value.clone());
                }
            }
        }

        let hyper_request = if let Some(form) = form {
            if let Some(headers) = builder.headers_mut() {
                if let Ok(content_type) = HeaderValue::from_str(&form.content_type) {
                    headers.insert(CONTENT_TYPE, content_type);
                }
            }
            builder
                .body(Body::from(form.build()))
                .map_err(|source| Error::with_source(ErrorType::BuildingRequest, source))?
        } else if let Some(bytes) = body {
            if let Some(headers) = builder.headers_mut() {
                headers.insert(CONTENT_LENGTH, bytes.len().into());
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            builder
                .body(Body::from(bytes))
                .map_err(|source| Error::with_source(ErrorType::BuildingRequest, source))?
        } else if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
            if let Some(headers) = builder.headers_mut() {
                headers.insert(CONTENT_LENGTH, 0.into());
            }
            builder
                .body(Body::empty())
                .map_err(|source| Error::with_source(ErrorType::BuildingRequest, source))?
        } else {
            builder
                .body(Body::empty())
                .map_err(|source| Error::with_source(ErrorType::BuildingRequest, source))?
        };

        let ticket_receiver = self
            .ratelimiter
            .ticket(bucket)
            .await
            .map_err(|source| Error::with_source(ErrorType::Ratelimiting, source))?;
        let ticket_sender = ticket_receiver
            .await
            .map_err(|source| Error::with_source(ErrorType::RequestCanceled, source))?;

        let result = time::timeout(self.timeout, self.http.request(hyper_request)).await;

        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => {
                let _ = ticket_sender.headers(None);
                return Err(Error::with_source(ErrorType::Connection, source));
            }
            Err(_) => {
                let _ = ticket_sender.headers(None);
                return Err(Error::new(ErrorType::RequestTimedOut));
            }
        };

        let parsed_headers = RatelimitHeaders::from_pairs(
            response
                .headers()
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_bytes())),
        )
        .ok();
        let _ = ticket_sender.headers(parsed_headers);

        if response.status() == hyper::StatusCode::UNAUTHORIZED {
            return Err(Error::new(ErrorType::Unauthorized));
        }

        Ok(Response::new(response))
    }
}
