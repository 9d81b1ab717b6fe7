use portable_atomic::AtomicU64;

// ── Refresh Loop State Machine ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Fetching,
    Computing,
    Rendering,
}

impl std::fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching => write!(f, "fetching"),
            Self::Computing => write!(f, "computing"),
            Self::Rendering => write!(f, "rendering"),
        }
    }
}

// ── Per-Tick Market Data ──

/// Market inputs for one ticker, valid for exactly one refresh tick.
/// A fetch failure produces no snapshot for that ticker on that tick.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MarketSnapshot {
    pub spot_price: f64,
    pub risk_free_rate: f64,
    pub implied_volatility: f64,
}

// ── Valuation Output ──

/// Theoretical valuation of one position against one snapshot.
/// Recomputed every tick, never merged across ticks.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ValuationResult {
    pub applied_price: f64,
    pub time_to_expiry: f64,
    pub value_per_share: f64,
    pub total_value: f64,
    pub profit: f64,
}

/// Per-position outcome for one tick.
#[derive(Debug, Clone)]
pub enum RowStatus {
    Valued(ValuationResult),
    /// No snapshot for the position's ticker this tick.
    NoData,
    /// Valuation rejected the inputs (bad strike, non-positive applied price).
    Invalid(String),
}

/// Portfolio aggregates over the tick's successfully valued rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct Totals {
    pub total_value: f64,
    pub total_profit: f64,
    pub valued_rows: usize,
}

// ── Diagnostics ──

/// Monotonic counters, logged at shutdown.
#[derive(Debug, Default)]
pub struct Counters {
    pub ticks_processed: AtomicU64,
    pub quotes_received: AtomicU64,
    pub fetch_errors: AtomicU64,
    pub frames_rendered: AtomicU64,
}
