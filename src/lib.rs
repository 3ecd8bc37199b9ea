//! `kaldra-http` is an async client for the KALDRA signal API.
//!
//! Every remote call goes through [`ResilientClient`]: a per-attempt timeout,
//! bounded retries with fixed exponential backoff, and a typed terminal
//! [`KaldraError::MaxRetriesExceeded`]. On top of it:
//! - [`KaldraClient`] picks the mock or the real backend from [`KaldraConfig`]
//! - [`KaldraClient::generate_signal`], [`KaldraClient::signals`],
//!   [`KaldraClient::signal_by_id`], [`KaldraClient::story_events`],
//!   [`KaldraClient::supabase_health`]
//! - [`explorer`] filters and aggregates signals for the explorer view

mod api;
mod client;
mod config;
mod error;
pub mod explorer;
pub mod fallback;
pub mod mock;
mod options;
mod request;
pub mod retry;
mod types;

pub use api::{KaldraClient, RemoteBackend};
pub use client::ResilientClient;
pub use config::{ApiMode, KaldraConfig, DEFAULT_BASE_URL};
pub use error::KaldraError;
pub use fallback::SignalFallback;
pub use mock::MockBackend;
pub use options::ClientOptions;
pub use request::{endpoint_url, Payload, RequestDescriptor};
pub use types::{
    Domain, KaldraSignal, KindraState, Signal, SignalDetails, SignalFilters, StoryEvent,
    SupabaseHealth, TwRegime,
};

pub type Result<T> = std::result::Result<T, KaldraError>;
