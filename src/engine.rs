use crate::config::{AppConfig, SIGMA_DEFAULT};
use crate::display::{DisplaySink, TableFrame};
use crate::errors::AppResult;
use crate::feeds::MarketDataProvider;
use crate::positions::Position;
use crate::pricing::OptionPricer;
use crate::state::{Counters, LoopPhase, MarketSnapshot};
use crate::valuator;
use portable_atomic::Ordering;
use std::collections::HashMap;
use tokio::time::{timeout, Duration, MissedTickBehavior};

/// Runs the refresh loop until an external interrupt:
/// Idle -> Fetching -> Computing -> Rendering -> Idle.
///
/// Tick N's render reflects tick N's fetch results only; snapshots are
/// merged into the per-tick map before any valuation runs. Compute and
/// render are synchronous and run to completion once started.
pub async fn run_loop<P, S>(
    config: &AppConfig,
    positions: &[Position],
    provider: &P,
    pricer: &dyn OptionPricer,
    sink: &mut S,
    risk_free_rate: f64,
) -> AppResult<()>
where
    P: MarketDataProvider,
    S: DisplaySink,
{
    let counters = Counters::default();
    let fetch_timeout = Duration::from_secs(config.fetch_timeout_secs);

    let mut interval = tokio::time::interval(Duration::from_secs(config.refresh_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut render_failures: u32 = 0;

    tracing::info!(
        positions = positions.len(),
        refresh_secs = config.refresh_secs,
        model = pricer.name(),
        "refresh loop started"
    );

    let mut phase = LoopPhase::Idle;

    loop {
        tracing::trace!(phase = %phase, "sleeping until next tick");
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        phase = LoopPhase::Fetching;
        tracing::debug!(phase = %phase, "fetching snapshots");
        let snapshots = tokio::select! {
            snaps = fetch_snapshots(provider, positions, risk_free_rate, fetch_timeout, &counters) => snaps,
            // In-flight fetches are dropped; nothing from this tick is rendered.
            _ = tokio::signal::ctrl_c() => break,
        };

        phase = LoopPhase::Computing;
        tracing::debug!(phase = %phase, snapshots = snapshots.len(), "valuing positions");
        let today = chrono::Local::now().date_naive();
        let rows = valuator::revalue(pricer, positions, &snapshots, today);
        let totals = valuator::totals(&rows);
        counters.ticks_processed.fetch_add(1, Ordering::Relaxed);

        phase = LoopPhase::Rendering;
        tracing::debug!(phase = %phase, valued = totals.valued_rows, "pushing frame");
        let frame = TableFrame::build(
            &rows,
            totals,
            risk_free_rate,
            config.refresh_secs,
            chrono::Local::now(),
        );
        match sink.render(&frame) {
            Ok(()) => {
                render_failures = 0;
                counters.frames_rendered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                render_failures += 1;
                tracing::error!(error = %e, consecutive = render_failures, "render failed");
                if render_failures >= 3 {
                    tracing::error!("display surface unusable, exiting");
                    break;
                }
            }
        }

        phase = LoopPhase::Idle;
    }

    sink.release();
    tracing::info!(
        ticks = counters.ticks_processed.load(Ordering::Relaxed),
        quotes = counters.quotes_received.load(Ordering::Relaxed),
        fetch_errors = counters.fetch_errors.load(Ordering::Relaxed),
        frames = counters.frames_rendered.load(Ordering::Relaxed),
        "refresh loop stopped"
    );
    Ok(())
}

/// Fetches one snapshot per distinct ticker, concurrently, each bounded by
/// the per-tick timeout. A failed or timed-out spot fetch leaves a gap for
/// that ticker; the other tickers are unaffected. Implied-vol failures fall
/// back to SIGMA_DEFAULT rather than producing a gap.
pub async fn fetch_snapshots<P: MarketDataProvider>(
    provider: &P,
    positions: &[Position],
    risk_free_rate: f64,
    per_fetch_timeout: Duration,
    counters: &Counters,
) -> HashMap<String, MarketSnapshot> {
    // One fetch per ticker; the first position on a ticker supplies the
    // option-chain selector (expiration, type, strike).
    let mut selectors: Vec<&Position> = Vec::new();
    for pos in positions {
        if !selectors.iter().any(|p| p.ticker == pos.ticker) {
            selectors.push(pos);
        }
    }

    let fetches = selectors.into_iter().map(|pos| async move {
        let spot = match timeout(per_fetch_timeout, provider.spot(&pos.ticker)).await {
            Ok(Ok(price)) => price,
            Ok(Err(e)) => {
                counters.fetch_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(ticker = %pos.ticker, error = %e, "spot fetch failed");
                return None;
            }
            Err(_) => {
                counters.fetch_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(ticker = %pos.ticker, "spot fetch timed out");
                return None;
            }
        };
        counters.quotes_received.fetch_add(1, Ordering::Relaxed);

        let iv = timeout(
            per_fetch_timeout,
            provider.implied_volatility(&pos.ticker, pos.expiration, pos.option_type, pos.strike),
        )
        .await;
        let implied_volatility = match iv {
            Ok(Ok(sigma)) if sigma.is_finite() && sigma >= 0.0 => sigma,
            Ok(Ok(sigma)) => {
                tracing::warn!(ticker = %pos.ticker, sigma, "unusable implied vol, using default");
                SIGMA_DEFAULT
            }
            Ok(Err(e)) => {
                tracing::debug!(ticker = %pos.ticker, error = %e, "implied vol fetch failed, using default");
                SIGMA_DEFAULT
            }
            Err(_) => {
                tracing::debug!(ticker = %pos.ticker, "implied vol fetch timed out, using default");
                SIGMA_DEFAULT
            }
        };

        Some((
            pos.ticker.clone(),
            MarketSnapshot {
                spot_price: spot,
                risk_free_rate,
                implied_volatility,
            },
        ))
    });

    futures_util::future::join_all(fetches)
        .await
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AppError, AppResult};
    use crate::positions::OptionType;
    use chrono::NaiveDate;
    use portable_atomic::AtomicU64;

    struct MockProvider {
        spots: HashMap<String, f64>,
        iv: Option<f64>,
        spot_calls: AtomicU64,
    }

    impl MockProvider {
        fn new(spots: &[(&str, f64)], iv: Option<f64>) -> Self {
            Self {
                spots: spots.iter().map(|(t, p)| (t.to_string(), *p)).collect(),
                iv,
                spot_calls: AtomicU64::new(0),
            }
        }
    }

    impl MarketDataProvider for MockProvider {
        async fn spot(&self, ticker: &str) -> AppResult<f64> {
            self.spot_calls.fetch_add(1, Ordering::Relaxed);
            self.spots
                .get(ticker)
                .copied()
                .ok_or_else(|| AppError::Quote(format!("unknown ticker {ticker}")))
        }

        async fn risk_free_rate(&self) -> AppResult<f64> {
            Ok(0.05)
        }

        async fn implied_volatility(
            &self,
            _ticker: &str,
            _expiration: NaiveDate,
            _option_type: OptionType,
            _strike: f64,
        ) -> AppResult<f64> {
            self.iv.ok_or_else(|| AppError::Quote("no chain".into()))
        }
    }

    fn position(ticker: &str) -> Position {
        Position {
            ticker: ticker.into(),
            expiration: NaiveDate::from_ymd_opt(2027, 1, 15).unwrap(),
            option_type: OptionType::Call,
            strike: 100.0,
            price_move: 0.0,
            purchase_price: 1.0,
            contracts: 1,
        }
    }

    #[tokio::test]
    async fn failed_ticker_leaves_a_gap_without_blocking_others() {
        let provider = MockProvider::new(&[("SPY", 500.0)], Some(0.3));
        let positions = vec![position("AAPL"), position("SPY")];
        let counters = Counters::default();

        let snaps = fetch_snapshots(
            &provider,
            &positions,
            0.05,
            Duration::from_secs(1),
            &counters,
        )
        .await;

        assert!(!snaps.contains_key("AAPL"));
        let spy = snaps.get("SPY").expect("SPY snapshot");
        assert_eq!(spy.spot_price, 500.0);
        assert_eq!(spy.implied_volatility, 0.3);
        assert_eq!(spy.risk_free_rate, 0.05);
        assert_eq!(counters.fetch_errors.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn tickers_are_fetched_once_per_tick() {
        let provider = MockProvider::new(&[("AAPL", 190.0)], Some(0.3));
        let positions = vec![position("AAPL"), position("AAPL"), position("AAPL")];
        let counters = Counters::default();

        let snaps = fetch_snapshots(
            &provider,
            &positions,
            0.05,
            Duration::from_secs(1),
            &counters,
        )
        .await;

        assert_eq!(snaps.len(), 1);
        assert_eq!(provider.spot_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn missing_chain_falls_back_to_default_vol() {
        let provider = MockProvider::new(&[("AAPL", 190.0)], None);
        let positions = vec![position("AAPL")];
        let counters = Counters::default();

        let snaps = fetch_snapshots(
            &provider,
            &positions,
            0.05,
            Duration::from_secs(1),
            &counters,
        )
        .await;

        assert_eq!(snaps.get("AAPL").unwrap().implied_volatility, SIGMA_DEFAULT);
    }
}
