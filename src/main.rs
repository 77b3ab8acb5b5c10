use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_signals::report::render_report;
use comfy_signals::storage_utils::{AppConfig, AsyncStorageManager};
use comfy_signals::{PortfolioRanker, Ranking, SymbolAnalyzer, SymbolFailure, SymbolInput};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct AnalysisDocument<'a> {
    generated_at: DateTime<Utc>,
    policy_version: &'a str,
    ranking: &'a Ranking<'a>,
    failures: &'a [SymbolFailure],
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Step 1: Load configuration and market data
    let storage = AsyncStorageManager::new_relative("storage").await?;
    let config: AppConfig = storage.load_or_default("config").await?;
    let inputs: Vec<SymbolInput> = storage
        .load("market_data")
        .await
        .context("no market data; the acquisition step must write market_data.json first")?;

    // Step 2: Narrow the universe
    let received = inputs.len();
    let inputs = config.universe.apply(inputs);
    info!(received, kept = inputs.len(), "Filtered symbol universe");

    // Step 3: Analyze every symbol to completion, then rank
    let analyzer = SymbolAnalyzer::new(config.analyzer.clone(), config.interpretation.clone())
        .context("invalid analyzer configuration")?;
    let outcome = analyzer.analyze_batch(inputs);
    let ranker = PortfolioRanker::new(config.ranking.clone());
    let ranking = ranker.rank(&outcome.results);

    // Step 4: Persist and display
    let generated_at = Utc::now();
    let document = AnalysisDocument {
        generated_at,
        policy_version: &analyzer.policy().version,
        ranking: &ranking,
        failures: &outcome.failures,
    };
    storage.save("analysis", &document).await?;
    info!(path = ?storage.base_dir.join("analysis.json"), "Saved analysis");

    println!(
        "\n{}",
        render_report(&ranking, &outcome.failures, &config.report)
    );

    Ok(())
}
