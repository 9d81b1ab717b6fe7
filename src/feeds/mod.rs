pub mod yahoo;

use crate::errors::AppResult;
use crate::positions::OptionType;
use chrono::NaiveDate;
use std::future::Future;

/// Live market lookups. Each call may block on network I/O and may fail
/// independently; failures surface as typed errors and become per-ticker
/// gaps for the tick, never panics.
pub trait MarketDataProvider: Send + Sync {
    /// Current price of the underlying.
    fn spot(&self, ticker: &str) -> impl Future<Output = AppResult<f64>> + Send;

    /// Annualized risk-free rate, decimal form (0.05 = 5%).
    fn risk_free_rate(&self) -> impl Future<Output = AppResult<f64>> + Send;

    /// Implied volatility from the option chain for the given expiration,
    /// taken from the listed contract with the strike nearest `strike`.
    fn implied_volatility(
        &self,
        ticker: &str,
        expiration: NaiveDate,
        option_type: OptionType,
        strike: f64,
    ) -> impl Future<Output = AppResult<f64>> + Send;
}
