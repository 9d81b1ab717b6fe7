use super::OptionPricer;
use crate::errors::{AppError, AppResult};
use crate::positions::OptionType;
use statrs::distribution::{ContinuousCDF, Normal};

/// Black-Scholes European option pricing.
///
/// d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// d2 = d1 - sigma * sqrt(T)
///
/// call = S*Phi(d1) - K*e^(-rT)*Phi(d2)
/// put  = K*e^(-rT)*Phi(-d2) - S*Phi(-d1)
///
/// Expired (T <= 0) and zero-variance (sigma <= 0) inputs take guarded
/// branches; the logarithmic formula is never evaluated outside its domain.
pub struct BlackScholes {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl BlackScholes {
    pub fn new() -> Self {
        Self {
            normal: Normal::standard(),
        }
    }
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionPricer for BlackScholes {
    #[inline]
    fn name(&self) -> &'static str {
        "Black-Scholes"
    }

    fn value(
        &self,
        option_type: OptionType,
        applied_price: f64,
        strike: f64,
        rate: f64,
        sigma: f64,
        time_to_expiry: f64,
    ) -> AppResult<f64> {
        let s = applied_price;
        let k = strike;
        let t = time_to_expiry;

        if !(s.is_finite() && k.is_finite() && rate.is_finite() && sigma.is_finite() && t.is_finite())
        {
            return Err(AppError::Pricing("non-finite input".into()));
        }
        if k <= 0.0 {
            return Err(AppError::Pricing(format!("strike must be positive, got {k}")));
        }
        if s <= 0.0 {
            return Err(AppError::Pricing(format!(
                "applied price must be positive, got {s}"
            )));
        }

        // Expired or same-day: intrinsic value only.
        if t <= 0.0 {
            return Ok(match option_type {
                OptionType::Call => (s - k).max(0.0),
                OptionType::Put => (k - s).max(0.0),
            });
        }

        let discounted_strike = k * (-rate * t).exp();

        // Zero variance: forward degenerates to the discounted intrinsic.
        if sigma <= 0.0 {
            return Ok(match option_type {
                OptionType::Call => (s - discounted_strike).max(0.0),
                OptionType::Put => (discounted_strike - s).max(0.0),
            });
        }

        let sigma_sqrt_t = sigma * t.sqrt();
        let d1 = ((s / k).ln() + (rate + 0.5 * sigma * sigma) * t) / sigma_sqrt_t;
        let d2 = d1 - sigma_sqrt_t;

        let value = match option_type {
            OptionType::Call => s * self.normal.cdf(d1) - discounted_strike * self.normal.cdf(d2),
            OptionType::Put => discounted_strike * self.normal.cdf(-d2) - s * self.normal.cdf(-d1),
        };

        // Numeric error near zero must not render as a negative price.
        Ok(value.max(0.0))
    }
}
