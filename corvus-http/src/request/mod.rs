//! The request builder (this design.5): a route plus optional JSON body,
//! multipart form, extra headers, and a use-authorization-token flag,
//! ready to be handed to a [`crate::client::Client`].

mod multipart;

pub use multipart::{Attachment, Form};

use crate::{
    error::{Error, ErrorType},
    routing::Route,
};
use corvus_http_ratelimiting::Path;
use hyper::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method,
};
use serde::Serialize;

#[derive(Debug)]
pub struct Request<'a> {
    pub(crate) body: Option<Vec<u8>>,
    pub(crate) form: Option<Form>,
    pub(crate) headers: Option<HeaderMap<HeaderValue>>,
    pub(crate) method: Method,
    pub(crate) bucket: Path,
    pub(crate) path: String,
    pub(crate) use_authorization_token: bool,
    _route: std::marker::PhantomData<&'a ()>,
}

impl<'a> Request<'a> {
    #[must_use]
    pub fn from_route(route: Route<'a>) -> Self {
        let (method, bucket, path) = route.into_parts();

        Self {
            body: None,
            form: None,
            headers: None,
            method,
            bucket,
            path,
            use_authorization_token: true,
            _route: std::marker::PhantomData,
        }
    }

    #[must_use]
    pub fn builder(route: Route<'a>) -> RequestBuilder<'a> {
        RequestBuilder(Self::from_route(route))
    }
}

#[derive(Debug)]
pub struct RequestBuilder<'a>(Request<'a>);

impl<'a> RequestBuilder<'a> {
    #[must_use]
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.0.body = Some(body);
        self
    }

    /// # Errors
    ///
    /// Returns [`ErrorType::Json`] if `to` fails to serialize.
    pub fn json(self, to: &impl Serialize) -> Result<Self, Error> {
        let bytes = serde_json::to_vec(to).map_err(|source| Error::with_source(ErrorType::Json, source))?;
        Ok(self.body(bytes))
    }

    #[must_use]
    pub fn form(mut self, form: Form) -> Self {
        self.0.form = Some(form);
        self
    }

    #[must_use]
    pub fn headers(mut self, iter: impl Iterator<Item = (HeaderName, HeaderValue)>) -> Self {
        self.0.headers.get_or_insert_with(HeaderMap::new).extend(iter);
        self
    }

    /// Whether to attach the client's configured `Authorization` token to
    /// this request. Webhook execution is the one typed builder that turns
    /// this off, since webhook URLs already carry their own auth token.
    #[must_use]
    pub const fn use_authorization_token(mut self, use_authorization_token: bool) -> Self {
        self.0.use_authorization_token = use_authorization_token;
        self
    }

    #[must_use]
    pub fn build(self) -> Request<'a> {
        self.0
    }
}
