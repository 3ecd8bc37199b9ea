use kaldra_http::{explorer, mock, KaldraClient, KaldraConfig, SignalFilters};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = KaldraConfig::from_env()?;
    let client = KaldraClient::from_config(&config)?.with_signal_fallback(mock::kaldra_signal);

    let text = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let text = if text.trim().is_empty() {
        "Central bank signals an extended pause".to_owned()
    } else {
        text
    };

    let signal = client.generate_signal(&text).await?;
    println!(
        "{} / {} [{}] bias={:.2} risk={} confidence={:.2}",
        signal.archetype,
        signal.delta_state,
        signal.tw_regime,
        signal.bias_score,
        signal
            .narrative_risk
            .map_or_else(|| "n/a".to_owned(), |risk| format!("{risk:.2}")),
        signal.confidence
    );

    let signals = client.signals(&SignalFilters::default().limit(20)).await?;
    let view = explorer::sort_by_time(&explorer::convert_signals(&signals));
    for point in explorer::generate_timeline(&view) {
        println!("{} {:>3} signals, dominant {}", point.date, point.count, point.regime);
    }

    let stats = explorer::calculate_stats(&view);
    println!(
        "{} signals, average confidence {:.2}",
        stats.total_signals, stats.avg_confidence
    );
    for (domain, count) in &stats.by_source {
        println!("  {:<18} {count}", domain.label());
    }

    println!("health: {:?}", client.supabase_health().await);
    Ok(())
}
