//! Local backend used in mock mode and as a source of fallback values.

use std::collections::BTreeMap;

use crate::{
    request::non_empty_id, KaldraError, KaldraSignal, KindraState, Result, Signal, SignalDetails,
    SignalFilters, StoryEvent, SupabaseHealth, TwRegime,
};

/// Synthesizes a signal from `text` without calling the engine.
///
/// Scores scale with word count: `bias = min(words / 50, 1)`.
pub fn kaldra_signal(text: &str) -> KaldraSignal {
    let words = text.split_whitespace().count().max(1);
    let bias_score = (words as f64 / 50.0).min(1.0);

    let (bias_label, narrative_risk) = if bias_score > 0.7 {
        ("extreme", 0.9)
    } else if bias_score > 0.4 {
        ("negative", 0.5)
    } else {
        ("neutral", 0.1)
    };

    let mut meta_modifiers = BTreeMap::new();
    meta_modifiers.insert("strength".to_owned(), vec![1.0, 2.0, 3.0]);
    meta_modifiers.insert("journey".to_owned(), vec![2.0, 3.0, 4.0]);
    meta_modifiers.insert("discipline".to_owned(), vec![1.5, 1.5, 1.5]);

    KaldraSignal {
        archetype: "UNSPECIFIED".to_owned(),
        delta_state: "GENERIC".to_owned(),
        tw_regime: if bias_score > 0.5 {
            TwRegime::Unstable
        } else {
            TwRegime::Stable
        },
        kindra_distribution: vec![
            KindraState {
                state_index: 1,
                prob: 0.6,
            },
            KindraState {
                state_index: 2,
                prob: 0.2,
            },
            KindraState {
                state_index: 3,
                prob: 0.2,
            },
        ],
        bias_score,
        bias_label: Some(bias_label.to_owned()),
        narrative_risk: Some(narrative_risk),
        confidence: 0.8,
        explanation: "Mock KALDRA signal generated locally.".to_owned(),
        meta_modifiers,
    }
}

struct Fixture {
    id: &'static str,
    domain: &'static str,
    title: &'static str,
    summary: &'static str,
    archetype: &'static str,
    state: &'static str,
    regime: &'static str,
    confidence: f64,
    created_at: &'static str,
}

const FIXTURES: &[Fixture] = &[
    Fixture {
        id: "alpha-001",
        domain: "alpha",
        title: "Apple Q4 Earnings Beat Expectations",
        summary: "Revenue beat analyst estimates by 3.2%, driven by iPhone sales.",
        archetype: "A03",
        state: "42",
        regime: "STABLE",
        confidence: 0.92,
        created_at: "2025-01-15T10:00:00Z",
    },
    Fixture {
        id: "alpha-002",
        domain: "alpha",
        title: "Tesla Margin Compression Signals Shift",
        summary: "Gross margins declined to 17.9% from 25.1% year over year.",
        archetype: "A07",
        state: "89",
        regime: "TURBULENT",
        confidence: 0.87,
        created_at: "2025-01-15T07:00:00Z",
    },
    Fixture {
        id: "alpha-003",
        domain: "alpha",
        title: "Amazon AWS Growth Slows to 12%",
        summary: "Enterprise customers are optimizing cloud spend.",
        archetype: "A08",
        state: "103",
        regime: "TURBULENT",
        confidence: 0.91,
        created_at: "2025-01-14T16:00:00Z",
    },
    Fixture {
        id: "geo-001",
        domain: "geo",
        title: "China-Taiwan Tensions Escalate",
        summary: "Largest air drills in six months over the Taiwan Strait.",
        archetype: "A09",
        state: "118",
        regime: "TURBULENT",
        confidence: 0.88,
        created_at: "2025-01-15T11:00:00Z",
    },
    Fixture {
        id: "geo-002",
        domain: "geo",
        title: "EU Energy Security Improves",
        summary: "European gas storage reaches 95% capacity ahead of winter.",
        archetype: "A04",
        state: "52",
        regime: "STABLE",
        confidence: 0.91,
        created_at: "2025-01-14T12:00:00Z",
    },
    Fixture {
        id: "product-001",
        domain: "product",
        title: "ChatGPT Enterprise Adoption Surges",
        summary: "Enterprise revenue up 300% quarter over quarter.",
        archetype: "A05",
        state: "71",
        regime: "TURBULENT",
        confidence: 0.89,
        created_at: "2025-01-15T05:00:00Z",
    },
    Fixture {
        id: "safeguard-001",
        domain: "safeguard",
        title: "Coordinated Disinformation Campaign Detected",
        summary: "Network of 2,400 fake accounts spreading false climate narratives.",
        archetype: "A10",
        state: "127",
        regime: "CRITICAL",
        confidence: 0.93,
        created_at: "2025-01-15T11:30:00Z",
    },
    Fixture {
        id: "safeguard-002",
        domain: "safeguard",
        title: "Cybersecurity Threat Level Elevated",
        summary: "New ransomware variant targeting the healthcare sector.",
        archetype: "A12",
        state: "144",
        regime: "CRITICAL",
        confidence: 0.96,
        created_at: "2025-01-14T09:00:00Z",
    },
];

impl Fixture {
    fn to_signal(&self) -> Signal {
        Signal {
            id: self.id.to_owned(),
            domain: self.domain.to_owned(),
            title: self.title.to_owned(),
            summary: Some(self.summary.to_owned()),
            source_anchor: None,
            source_url: None,
            delta144_state: Some(self.state.to_owned()),
            dominant_archetype: Some(self.archetype.to_owned()),
            dominant_polarity: None,
            tw_regime: Some(self.regime.to_owned()),
            journey_stage: None,
            importance: None,
            confidence: Some(self.confidence),
            divergence: None,
            raw_payload: None,
            created_at: Some(self.created_at.to_owned()),
        }
    }
}

/// Backend variant that answers every call from static fixtures.
#[derive(Clone, Debug, Default)]
pub struct MockBackend;

impl MockBackend {
    pub fn new() -> Self {
        Self
    }

    pub async fn generate_signal(&self, text: &str) -> Result<KaldraSignal> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(KaldraError::InvalidInput(
                "input text must not be empty".to_owned(),
            ));
        }
        Ok(kaldra_signal(trimmed))
    }

    pub async fn signals(&self, filters: &SignalFilters) -> Result<Vec<Signal>> {
        let matching = FIXTURES
            .iter()
            .filter(|fixture| {
                filters
                    .domain
                    .as_deref()
                    .map_or(true, |domain| fixture.domain.eq_ignore_ascii_case(domain))
            })
            .map(Fixture::to_signal);

        Ok(match filters.effective_limit() {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    pub async fn signal_by_id(&self, id: &str) -> Result<Option<Signal>> {
        let id = non_empty_id(id)?;
        Ok(FIXTURES
            .iter()
            .find(|fixture| fixture.id == id)
            .map(Fixture::to_signal))
    }

    pub async fn story_events(&self, signal_id: &str) -> Result<Vec<StoryEvent>> {
        non_empty_id(signal_id)?;
        Ok(Vec::new())
    }

    pub async fn signal_with_events(&self, id: &str) -> Result<SignalDetails> {
        Ok(SignalDetails {
            signal: self.signal_by_id(id).await?,
            events: self.story_events(id).await?,
        })
    }

    pub async fn supabase_health(&self) -> SupabaseHealth {
        SupabaseHealth {
            status: "ok".to_owned(),
            supabase_connected: false,
            signals_sample_count: Some(FIXTURES.len() as u64),
            message: Some("mock mode".to_owned()),
            error: None,
        }
    }
}
