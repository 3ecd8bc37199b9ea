use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Volatility regime reported by the TW oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TwRegime {
    Stable,
    Turbulent,
    Critical,
    Anomaly,
    Unstable,
}

impl TwRegime {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "STABLE",
            Self::Turbulent => "TURBULENT",
            Self::Critical => "CRITICAL",
            Self::Anomaly => "ANOMALY",
            Self::Unstable => "UNSTABLE",
        }
    }
}

impl fmt::Display for TwRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TwRegime {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "STABLE" => Ok(Self::Stable),
            "TURBULENT" => Ok(Self::Turbulent),
            "CRITICAL" => Ok(Self::Critical),
            "ANOMALY" => Ok(Self::Anomaly),
            "UNSTABLE" => Ok(Self::Unstable),
            other => Err(format!("unknown regime '{other}'")),
        }
    }
}

/// KALDRA product line a signal belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Alpha,
    Geo,
    Product,
    Safeguard,
}

impl Domain {
    pub const ALL: [Domain; 4] = [Self::Alpha, Self::Geo, Self::Product, Self::Safeguard];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Geo => "geo",
            Self::Product => "product",
            Self::Safeguard => "safeguard",
        }
    }

    /// Human-readable product name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Alpha => "KALDRA Alpha",
            Self::Geo => "KALDRA GEO",
            Self::Product => "KALDRA Product",
            Self::Safeguard => "KALDRA Safeguard",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "alpha" => Ok(Self::Alpha),
            "geo" => Ok(Self::Geo),
            "product" => Ok(Self::Product),
            "safeguard" => Ok(Self::Safeguard),
            other => Err(format!("unknown domain '{other}'")),
        }
    }
}

/// One entry of the top-N Kindra state distribution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KindraState {
    pub state_index: u32,
    pub prob: f64,
}

/// Response of `POST /engine/kaldra/signal`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KaldraSignal {
    /// Archetype id, e.g. `A07_RULER`.
    pub archetype: String,
    /// Delta144 state id, e.g. `A07_05`.
    pub delta_state: String,
    pub tw_regime: TwRegime,
    #[serde(default)]
    pub kindra_distribution: Vec<KindraState>,
    /// 0.0 - 1.0
    pub bias_score: f64,
    #[serde(default)]
    pub bias_label: Option<String>,
    /// 0.0 - 1.0; the engine may omit it or send `null`.
    #[serde(default)]
    pub narrative_risk: Option<f64>,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub explanation: String,
    #[serde(default)]
    pub meta_modifiers: BTreeMap<String, Vec<f64>>,
}

/// Signal record as stored by the KALDRA API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub domain: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_anchor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta144_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_archetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_polarity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tw_regime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journey_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divergence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Signal {
    /// Parsed regime, `None` when absent or unrecognised.
    pub fn regime(&self) -> Option<TwRegime> {
        self.tw_regime.as_deref().and_then(|raw| raw.parse().ok())
    }
}

/// Story event attached to a signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoryEvent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta144_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polarities: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Response of `GET /health/supabase`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupabaseHealth {
    pub status: String,
    #[serde(default)]
    pub supabase_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signals_sample_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SupabaseHealth {
    /// Synthesized status used when the health endpoint cannot be reached.
    pub fn connection_failed() -> Self {
        Self {
            status: "error".to_owned(),
            supabase_connected: false,
            signals_sample_count: None,
            message: None,
            error: Some("Connection failed".to_owned()),
        }
    }
}

/// Query filters for `GET /signals`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignalFilters {
    pub domain: Option<String>,
    pub limit: Option<usize>,
}

impl SignalFilters {
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The limit to apply; `0` means no limit.
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|limit| *limit > 0)
    }
}

/// A signal together with its story timeline, as shown in the detail view.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalDetails {
    pub signal: Option<Signal>,
    pub events: Vec<StoryEvent>,
}
