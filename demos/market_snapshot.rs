//! Prints a market snapshot and the provider health report
//!
//! ```sh
//! RUST_LOG=market_data_core=debug cargo run --example market_snapshot
//! ```

use market_data_core::{FetchControl, MarketDataService, QueryParams};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let service = MarketDataService::from_env()?;
    let params = QueryParams::new().with_per_page(10);

    let snapshot = service.dashboard(&params).await;
    println!(
        "markets via {}",
        snapshot.markets.provider.as_deref().unwrap_or("-")
    );
    for coin in snapshot.markets.data.unwrap_or_default() {
        println!(
            "{:>3}. {:<10} ${:>12.2} {:>+7.2}%",
            coin.market_cap_rank, coin.symbol, coin.current_price, coin.price_change_percentage_24h
        );
    }
    if let Some(global) = snapshot.global.data {
        println!(
            "total cap ${:.0}, BTC dominance {:.1}%",
            global.total_market_cap, global.btc_dominance
        );
    }

    // bounded lookup, gives up after two seconds
    let control = FetchControl::none().with_timeout(Duration::from_secs(2));
    let prices = service
        .fetch_with_control(
            market_data_core::Endpoint::SimplePrice,
            &QueryParams::new().with_ids(["bitcoin", "ethereum", "solana"]),
            &control,
        )
        .await;
    println!("{}", serde_json::to_string_pretty(&prices)?);

    match service.spot_price("bitcoin", "usd").await {
        Ok(quote) => println!("BTC: ${:.2}", quote.price),
        Err(e) => println!("BTC unavailable: {}", e),
    }

    let health = service.health_check().await;
    println!("{:?}: {}", health.status, health.message.unwrap_or_default());
    for metrics in service.provider_metrics().await {
        println!(
            "{:<12} p50={:.0}ms p99={:.0}ms success={:.0}%",
            metrics.provider_name,
            metrics.latency_p50_ms,
            metrics.latency_p99_ms,
            metrics.success_rate * 100.0
        );
    }

    Ok(())
}
