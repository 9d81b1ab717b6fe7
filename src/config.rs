use crate::errors::{AppError, AppResult};
use std::path::PathBuf;

/// Each option contract covers this many shares of the underlying.
pub const SHARES_PER_CONTRACT: f64 = 100.0;

/// Fallback risk-free rate when the ^IRX quote is unavailable.
pub const R_DEFAULT: f64 = 0.05;

/// Fallback implied volatility when the option chain has no usable entry.
pub const SIGMA_DEFAULT: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub positions_csv: PathBuf,
    pub quote_base_url: String,
    pub refresh_secs: u64,
    pub fetch_timeout_secs: u64,
    pub strict_positions: bool,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let refresh_secs = env_var_or("REFRESH_SECS", "15")
            .parse::<u64>()
            .map_err(|e| AppError::Config(format!("REFRESH_SECS: {e}")))?;
        if refresh_secs == 0 {
            return Err(AppError::Config("REFRESH_SECS must be >= 1".into()));
        }

        let fetch_timeout_secs = env_var_or("FETCH_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|e| AppError::Config(format!("FETCH_TIMEOUT_SECS: {e}")))?;

        let strict_positions = env_var_or("STRICT_POSITIONS", "false")
            .parse::<bool>()
            .map_err(|e| AppError::Config(format!("STRICT_POSITIONS: {e}")))?;

        Ok(Self {
            positions_csv: PathBuf::from(env_var_or("POSITIONS_CSV", "positions.csv")),
            quote_base_url: env_var_or(
                "QUOTE_BASE_URL",
                "https://query1.finance.yahoo.com",
            ),
            refresh_secs,
            fetch_timeout_secs,
            strict_positions,
        })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
