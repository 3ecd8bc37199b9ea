//! Filtering, ordering and aggregation over fetched signals for the explorer view.
//!
//! Timestamps are ISO 8601 strings and are compared lexically.

use std::collections::BTreeMap;

use crate::{Domain, Signal, TwRegime};

/// Signal normalised for display: every field present, enums parsed.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplorerSignal {
    pub id: String,
    pub source: Domain,
    pub title: String,
    pub summary: String,
    pub archetype_id: String,
    pub delta144_state: String,
    pub tw_regime: TwRegime,
    pub confidence: f64,
    pub timestamp: String,
}

impl From<&Signal> for ExplorerSignal {
    fn from(signal: &Signal) -> Self {
        Self {
            id: signal.id.clone(),
            source: signal.domain.parse().unwrap_or(Domain::Alpha),
            title: signal.title.clone(),
            summary: signal.summary.clone().unwrap_or_default(),
            archetype_id: signal
                .dominant_archetype
                .clone()
                .unwrap_or_else(|| "unknown".to_owned()),
            delta144_state: signal
                .delta144_state
                .clone()
                .unwrap_or_else(|| "unknown".to_owned()),
            tw_regime: signal.regime().unwrap_or(TwRegime::Stable),
            confidence: signal
                .confidence
                .filter(|confidence| *confidence != 0.0 && !confidence.is_nan())
                .unwrap_or(0.5),
            timestamp: signal.created_at.clone().unwrap_or_default(),
        }
    }
}

/// Converts API records for the explorer view.
pub fn convert_signals(signals: &[Signal]) -> Vec<ExplorerSignal> {
    signals.iter().map(ExplorerSignal::from).collect()
}

/// Explorer filter panel state. `None` means "all".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExplorerFilters {
    pub source: Option<Domain>,
    pub regime: Option<TwRegime>,
    /// Inclusive lower bound on the timestamp.
    pub date_from: Option<String>,
    /// Inclusive upper bound on the timestamp.
    pub date_to: Option<String>,
    pub min_confidence: Option<f64>,
}

/// Signals sharing one calendar day.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelinePoint {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub regime: TwRegime,
    pub count: usize,
    pub signals: Vec<ExplorerSignal>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExplorerStats {
    pub total_signals: usize,
    pub by_source: BTreeMap<Domain, usize>,
    pub by_regime: BTreeMap<TwRegime, usize>,
    pub avg_confidence: f64,
}

pub fn filter_signals(signals: &[ExplorerSignal], filters: &ExplorerFilters) -> Vec<ExplorerSignal> {
    signals
        .iter()
        .filter(|signal| filters.source.map_or(true, |source| signal.source == source))
        .filter(|signal| filters.regime.map_or(true, |regime| signal.tw_regime == regime))
        .filter(|signal| {
            filters
                .date_from
                .as_deref()
                .map_or(true, |from| signal.timestamp.as_str() >= from)
        })
        .filter(|signal| {
            filters
                .date_to
                .as_deref()
                .map_or(true, |to| signal.timestamp.as_str() <= to)
        })
        .filter(|signal| {
            filters
                .min_confidence
                .map_or(true, |min| signal.confidence >= min)
        })
        .cloned()
        .collect()
}

/// Newest first; equal timestamps keep their input order.
pub fn sort_by_time(signals: &[ExplorerSignal]) -> Vec<ExplorerSignal> {
    let mut sorted = signals.to_vec();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted
}

/// Groups signals by day, newest day first.
///
/// Each day's regime is the most frequent one; ties go to the regime seen
/// first that day.
pub fn generate_timeline(signals: &[ExplorerSignal]) -> Vec<TimelinePoint> {
    let mut days: BTreeMap<String, Vec<ExplorerSignal>> = BTreeMap::new();
    for signal in signals {
        let date = signal
            .timestamp
            .split('T')
            .next()
            .unwrap_or_default()
            .to_owned();
        days.entry(date).or_default().push(signal.clone());
    }

    days.into_iter()
        .rev()
        .map(|(date, day)| TimelinePoint {
            date,
            regime: dominant_regime(&day),
            count: day.len(),
            signals: day,
        })
        .collect()
}

fn dominant_regime(day: &[ExplorerSignal]) -> TwRegime {
    let mut counts: Vec<(TwRegime, usize)> = Vec::new();
    for signal in day {
        match counts.iter_mut().find(|(regime, _)| *regime == signal.tw_regime) {
            Some((_, count)) => *count += 1,
            None => counts.push((signal.tw_regime, 1)),
        }
    }

    let mut best: Option<(TwRegime, usize)> = None;
    for (regime, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((regime, count));
        }
    }
    best.map_or(TwRegime::Stable, |(regime, _)| regime)
}

pub fn calculate_stats(signals: &[ExplorerSignal]) -> ExplorerStats {
    let mut by_source: BTreeMap<Domain, usize> =
        Domain::ALL.iter().map(|domain| (*domain, 0)).collect();
    let mut by_regime: BTreeMap<TwRegime, usize> = [
        TwRegime::Stable,
        TwRegime::Turbulent,
        TwRegime::Critical,
    ]
    .into_iter()
    .map(|regime| (regime, 0))
    .collect();

    let mut total_confidence = 0.0;
    for signal in signals {
        *by_source.entry(signal.source).or_default() += 1;
        *by_regime.entry(signal.tw_regime).or_default() += 1;
        total_confidence += signal.confidence;
    }

    ExplorerStats {
        total_signals: signals.len(),
        by_source,
        by_regime,
        avg_confidence: if signals.is_empty() {
            0.0
        } else {
            total_confidence / signals.len() as f64
        },
    }
}
