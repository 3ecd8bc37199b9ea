use std::fmt;
use std::sync::Arc;

use crate::{
    client::ResilientClient,
    config::{ApiMode, KaldraConfig},
    fallback::{self, SignalFallback},
    mock::MockBackend,
    request::{endpoint_url, non_empty_id, RequestDescriptor},
    ClientOptions, KaldraError, KaldraSignal, Result, Signal, SignalDetails, SignalFilters,
    StoryEvent, SupabaseHealth,
};

#[derive(Clone)]
/// Backend variant that calls the KALDRA HTTP API through a [`ResilientClient`].
pub struct RemoteBackend {
    client: ResilientClient,
    base_url: String,
    signal_fallback: Option<SignalFallback>,
}

impl fmt::Debug for RemoteBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("base_url", &self.base_url)
            .field("client", &self.client)
            .field("signal_fallback", &self.signal_fallback.is_some())
            .finish()
    }
}

impl RemoteBackend {
    /// Creates a backend for `base_url`, e.g. `http://localhost:8000`.
    ///
    /// The URL is validated here so later calls cannot fail on it.
    pub fn new(base_url: impl Into<String>, client: ResilientClient) -> Result<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_owned();
        endpoint_url(&base_url, std::iter::empty())?;
        Ok(Self {
            client,
            base_url,
            signal_fallback: None,
        })
    }

    /// Installs a substitute used when signal generation exhausts its retries.
    pub fn with_signal_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&str) -> KaldraSignal + Send + Sync + 'static,
    {
        self.signal_fallback = Some(Arc::new(fallback));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    /// `POST /engine/kaldra/signal` with `{"text": ...}`.
    ///
    /// Blank text fails with [`KaldraError::InvalidInput`] and is never
    /// replaced by the fallback.
    pub async fn generate_signal(&self, text: &str) -> Result<KaldraSignal> {
        let url = endpoint_url(&self.base_url, ["engine", "kaldra", "signal"])?;
        let request = RequestDescriptor::post(url).text(text);
        let result = self.client.call_default(&request).await;

        match &self.signal_fallback {
            Some(substitute) => {
                let trimmed = text.trim();
                fallback::recover(result, |_| (**substitute)(trimmed))
            }
            None => result,
        }
    }

    /// `GET /signals?domain=&limit=`. A zero limit is not sent.
    pub async fn signals(&self, filters: &SignalFilters) -> Result<Vec<Signal>> {
        let mut url = endpoint_url(&self.base_url, ["signals"])?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(domain) = filters.domain.as_deref() {
                query.append_pair("domain", domain);
            }
            if let Some(limit) = filters.effective_limit() {
                query.append_pair("limit", &limit.to_string());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        self.client.call_default(&RequestDescriptor::get(url)).await
    }

    /// `GET /signals/{id}`; a `404` is `Ok(None)`.
    pub async fn signal_by_id(&self, id: &str) -> Result<Option<Signal>> {
        let id = non_empty_id(id)?;
        let url = endpoint_url(&self.base_url, ["signals", id])?;
        self.client.call_optional(&RequestDescriptor::get(url)).await
    }

    /// `GET /story-events/by-signal/{id}`.
    pub async fn story_events(&self, signal_id: &str) -> Result<Vec<StoryEvent>> {
        let signal_id = non_empty_id(signal_id)?;
        let url = endpoint_url(&self.base_url, ["story-events", "by-signal", signal_id])?;
        self.client.call_default(&RequestDescriptor::get(url)).await
    }

    /// Fetches a signal and its story events concurrently.
    pub async fn signal_with_events(&self, id: &str) -> Result<SignalDetails> {
        let (signal, events) = tokio::join!(self.signal_by_id(id), self.story_events(id));
        Ok(SignalDetails {
            signal: signal?,
            events: events?,
        })
    }

    /// `GET /health/supabase` with a single attempt; never fails.
    ///
    /// A health body returned with an error status is passed through; any
    /// other failure becomes [`SupabaseHealth::connection_failed`].
    pub async fn supabase_health(&self) -> SupabaseHealth {
        let url = match endpoint_url(&self.base_url, ["health", "supabase"]) {
            Ok(url) => url,
            Err(err) => {
                tracing::error!(error = %err, "cannot build supabase health url");
                return SupabaseHealth::connection_failed();
            }
        };
        let request = RequestDescriptor::get(url);
        let timeout_ms = self.client.options().timeout_ms;

        match self.client.call::<SupabaseHealth>(&request, 0, timeout_ms).await {
            Ok(health) => health,
            Err(err) => {
                if let KaldraError::MaxRetriesExceeded { last, .. } = &err {
                    if let KaldraError::Http { body, .. } = last.as_ref() {
                        if let Ok(health) = serde_json::from_str::<SupabaseHealth>(body) {
                            return health;
                        }
                    }
                }
                tracing::error!(error = %err, "supabase health check failed");
                SupabaseHealth::connection_failed()
            }
        }
    }
}

/// KALDRA API client, either served from local fixtures or from the HTTP API.
///
/// The variant is fixed at construction; call sites never branch on the mode.
///
/// # Example
///
/// ```no_run
/// use kaldra_http::{KaldraClient, KaldraConfig};
///
/// # async fn run() -> kaldra_http::Result<()> {
/// let client = KaldraClient::from_config(&KaldraConfig::from_env()?)?;
/// let signal = client.generate_signal("Central bank signals a pause").await?;
/// println!("{} {}", signal.archetype, signal.tw_regime);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub enum KaldraClient {
    Mock(MockBackend),
    Remote(RemoteBackend),
}

impl KaldraClient {
    /// Builds the variant selected by `config.mode`.
    pub fn from_config(config: &KaldraConfig) -> Result<Self> {
        match config.mode {
            ApiMode::Mock => {
                tracing::debug!("using mock KALDRA backend");
                Ok(Self::Mock(MockBackend::new()))
            }
            ApiMode::Real => {
                tracing::debug!(base_url = %config.base_url, "using KALDRA API");
                Self::remote(&config.base_url, config.options.clone())
            }
        }
    }

    pub fn mock() -> Self {
        Self::Mock(MockBackend::new())
    }

    /// Creates a remote client with its own connection pool.
    pub fn remote(base_url: impl Into<String>, options: ClientOptions) -> Result<Self> {
        let client = ResilientClient::new().with_options(options);
        Ok(Self::Remote(RemoteBackend::new(base_url, client)?))
    }

    /// Installs a signal fallback on the remote variant; no-op in mock mode.
    pub fn with_signal_fallback<F>(self, fallback: F) -> Self
    where
        F: Fn(&str) -> KaldraSignal + Send + Sync + 'static,
    {
        match self {
            Self::Remote(remote) => Self::Remote(remote.with_signal_fallback(fallback)),
            mock @ Self::Mock(_) => mock,
        }
    }

    pub fn mode(&self) -> ApiMode {
        match self {
            Self::Mock(_) => ApiMode::Mock,
            Self::Remote(_) => ApiMode::Real,
        }
    }

    pub async fn generate_signal(&self, text: &str) -> Result<KaldraSignal> {
        match self {
            Self::Mock(mock) => mock.generate_signal(text).await,
            Self::Remote(remote) => remote.generate_signal(text).await,
        }
    }

    pub async fn signals(&self, filters: &SignalFilters) -> Result<Vec<Signal>> {
        match self {
            Self::Mock(mock) => mock.signals(filters).await,
            Self::Remote(remote) => remote.signals(filters).await,
        }
    }

    pub async fn signal_by_id(&self, id: &str) -> Result<Option<Signal>> {
        match self {
            Self::Mock(mock) => mock.signal_by_id(id).await,
            Self::Remote(remote) => remote.signal_by_id(id).await,
        }
    }

    pub async fn story_events(&self, signal_id: &str) -> Result<Vec<StoryEvent>> {
        match self {
            Self::Mock(mock) => mock.story_events(signal_id).await,
            Self::Remote(remote) => remote.story_events(signal_id).await,
        }
    }

    pub async fn signal_with_events(&self, id: &str) -> Result<SignalDetails> {
        match self {
            Self::Mock(mock) => mock.signal_with_events(id).await,
            Self::Remote(remote) => remote.signal_with_events(id).await,
        }
    }

    pub async fn supabase_health(&self) -> SupabaseHealth {
        match self {
            Self::Mock(mock) => mock.supabase_health().await,
            Self::Remote(remote) => remote.supabase_health().await,
        }
    }
}
