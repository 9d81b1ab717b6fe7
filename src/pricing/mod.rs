pub mod black_scholes;

use crate::errors::AppResult;
use crate::positions::OptionType;

/// Valuation seam. value() must be a pure function: deterministic output
/// from inputs only, no I/O, no mutable state. Send + Sync required for use
/// across tokio tasks.
pub trait OptionPricer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Theoretical per-share value of a European option.
    /// Returns a typed error for non-positive spot or strike; never NaN.
    fn value(
        &self,
        option_type: OptionType,
        applied_price: f64,
        strike: f64,
        rate: f64,
        sigma: f64,
        time_to_expiry: f64,
    ) -> AppResult<f64>;
}
