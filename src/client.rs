use std::fmt;
use std::time::Duration;

use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::{sleep, timeout};

use crate::{
    request::RequestDescriptor,
    retry::{self, RetryPolicy},
    ClientOptions, KaldraError, Result,
};

/// What a `404` means for a call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum NotFound {
    /// `404` is a failed attempt like any other status.
    Fail,
    /// `404` ends the call with an empty result.
    Empty,
}

#[derive(Clone)]
/// HTTP client that performs one logical call with bounded retries.
///
/// Each attempt is cancelled after the configured timeout. Failed attempts
/// are retried after `retry_backoff_ms * 2^attempt` ms; once every attempt
/// has failed the call returns [`KaldraError::MaxRetriesExceeded`].
pub struct ResilientClient {
    http: reqwest::Client,
    options: ClientOptions,
}

impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("options", &self.options)
            .finish()
    }
}

impl Default for ResilientClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ResilientClient {
    /// Creates a client with default options (15 s timeout, 3 retries, 1 s backoff base).
    pub fn new() -> Self {
        Self::with_http(reqwest::Client::new())
    }

    /// Creates a client around an existing `reqwest::Client`, sharing its pool.
    pub fn with_http(http: reqwest::Client) -> Self {
        Self {
            http,
            options: ClientOptions::default(),
        }
    }

    /// Applies client options such as timeout and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Performs `request` using the client's configured retry count and timeout.
    pub async fn call_default<T: DeserializeOwned>(&self, request: &RequestDescriptor) -> Result<T> {
        self.call(request, self.options.max_retries, self.options.timeout_ms)
            .await
    }

    /// Performs `request` with up to `max_retries + 1` attempts, each limited
    /// to `timeout_ms`.
    ///
    /// Fails with [`KaldraError::InvalidInput`] without touching the network
    /// when the request carries a blank text payload.
    pub async fn call<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
        max_retries: usize,
        timeout_ms: u64,
    ) -> Result<T> {
        self.call_with_policy(request, max_retries, timeout_ms, NotFound::Fail)
            .await?
            .ok_or_else(|| KaldraError::Decode("missing response payload".to_owned()))
    }

    /// Like [`ResilientClient::call_default`], but a `404` yields `Ok(None)`
    /// immediately instead of counting as a failed attempt.
    pub async fn call_optional<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
    ) -> Result<Option<T>> {
        self.call_with_policy(
            request,
            self.options.max_retries,
            self.options.timeout_ms,
            NotFound::Empty,
        )
        .await
    }

    async fn call_with_policy<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
        max_retries: usize,
        timeout_ms: u64,
        not_found: NotFound,
    ) -> Result<Option<T>> {
        request.validate()?;
        if timeout_ms == 0 {
            return Err(KaldraError::InvalidInput(
                "timeout must be greater than zero".to_owned(),
            ));
        }

        let policy = RetryPolicy::new(max_retries, self.options.retry_backoff_ms);
        let label = format!("{} {}", request.method(), request.url());
        let limit = Duration::from_millis(timeout_ms);

        retry::run(
            policy,
            &label,
            move |_| self.attempt_with_timeout(request, limit, not_found),
            sleep,
        )
        .await
    }

    async fn attempt_with_timeout<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
        limit: Duration,
        not_found: NotFound,
    ) -> Result<Option<T>> {
        // Dropping the in-flight future on expiry aborts the request.
        match timeout(limit, self.attempt(request, not_found)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(KaldraError::Timeout {
                timeout_ms: limit.as_millis() as u64,
            }),
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
        not_found: NotFound,
    ) -> Result<Option<T>> {
        let mut builder = self
            .http
            .request(request.method().clone(), request.url().clone())
            .header(header::ACCEPT, "application/json");
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(payload) = request.payload() {
            builder = builder.json(&payload.to_json());
        }

        let response = builder.send().await.map_err(KaldraError::Transport)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND && not_found == NotFound::Empty {
            tracing::debug!(url = %request.url(), "resource not found, returning empty result");
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KaldraError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(KaldraError::Transport)?;
        serde_json::from_str::<T>(&body).map(Some).map_err(|err| {
            KaldraError::Decode(format!("invalid response JSON: {err}; body: {body}"))
        })
    }
}
