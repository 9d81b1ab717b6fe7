mod config;
mod display;
mod engine;
mod errors;
mod feeds;
mod positions;
mod pricing;
mod state;
mod valuator;

use crate::display::TerminalSink;
use crate::feeds::yahoo::YahooFinanceProvider;
use crate::feeds::MarketDataProvider;
use crate::pricing::black_scholes::BlackScholes;

#[tokio::main]
async fn main() {
    // Structured logging on stderr; stdout belongs to the display surface.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("optionwatch starting");

    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    let positions = match positions::load_positions(&cfg.positions_csv, cfg.strict_positions) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("positions error: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        count = positions.len(),
        file = %cfg.positions_csv.display(),
        "positions loaded"
    );

    let provider = YahooFinanceProvider::new(&cfg.quote_base_url, cfg.fetch_timeout_secs);

    // ^IRX is read once per run; valuation falls back to R_DEFAULT without it.
    let risk_free_rate = match provider.risk_free_rate().await {
        Ok(r) => {
            tracing::info!(rate = r, "risk-free rate fetched");
            r
        }
        Err(e) => {
            tracing::warn!(error = %e, fallback = config::R_DEFAULT, "risk-free rate fetch failed");
            config::R_DEFAULT
        }
    };

    let pricer = BlackScholes::new();
    let mut sink = TerminalSink::new();

    if let Err(e) =
        engine::run_loop(&cfg, &positions, &provider, &pricer, &mut sink, risk_free_rate).await
    {
        tracing::error!("fatal: {e}");
        std::process::exit(1);
    }
}
