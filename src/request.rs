use reqwest::{Method, Url};
use serde_json::{json, Value as JsonValue};

use crate::{KaldraError, Result};

/// Request body carried by a [`RequestDescriptor`].
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Arbitrary JSON body.
    Json(JsonValue),
    /// `{"text": ...}` body whose text must be non-empty after trimming.
    Text(String),
}

impl Payload {
    fn validate(&self) -> Result<()> {
        match self {
            Self::Text(text) if text.trim().is_empty() => Err(KaldraError::InvalidInput(
                "input text must not be empty".to_owned(),
            )),
            _ => Ok(()),
        }
    }

    pub(crate) fn to_json(&self) -> JsonValue {
        match self {
            Self::Json(value) => value.clone(),
            Self::Text(text) => json!({ "text": text.trim() }),
        }
    }
}

/// Immutable description of one logical remote call.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    payload: Option<Payload>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            payload: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// Adds a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body.
    pub fn json(mut self, body: JsonValue) -> Self {
        self.payload = Some(Payload::Json(body));
        self
    }

    /// Sets a `{"text": ...}` body. Blank text fails at call time with
    /// [`KaldraError::InvalidInput`] before any attempt is made.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.payload = Some(Payload::Text(text.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match &self.payload {
            Some(payload) => payload.validate(),
            None => Ok(()),
        }
    }
}

/// Trims `id`, rejecting blank ids before any request is made.
pub(crate) fn non_empty_id(id: &str) -> Result<&str> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(KaldraError::InvalidInput(
            "signal id must not be empty".to_owned(),
        ));
    }
    Ok(trimmed)
}

/// Joins percent-encoded path segments onto `base_url`.
///
/// Example: `("http://host/api", ["signals", "a b"])` → `"http://host/api/signals/a%20b"`
pub fn endpoint_url<'a, I>(base_url: &str, segments: I) -> Result<Url>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut url = Url::parse(base_url)
        .map_err(|err| KaldraError::Config(format!("invalid base url '{base_url}': {err}")))?;
    url.path_segments_mut()
        .map_err(|_| KaldraError::Config(format!("base url '{base_url}' cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
