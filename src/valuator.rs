use crate::config::SHARES_PER_CONTRACT;
use crate::positions::Position;
use crate::pricing::OptionPricer;
use crate::state::{MarketSnapshot, RowStatus, Totals, ValuationResult};
use chrono::NaiveDate;
use std::collections::HashMap;

/// One position's valuation state for a single tick.
pub struct PositionRow<'a> {
    pub position: &'a Position,
    /// The snapshot the row was valued against; None when the tick had a
    /// fetch gap for this ticker.
    pub snapshot: Option<MarketSnapshot>,
    pub status: RowStatus,
}

/// Values every position against this tick's snapshots.
///
/// Output order matches input order so the display never reshuffles between
/// ticks. A missing snapshot yields a NoData row; a per-position pricing
/// failure yields an Invalid row. Neither stops the remaining positions.
pub fn revalue<'a>(
    pricer: &dyn OptionPricer,
    positions: &'a [Position],
    snapshots: &HashMap<String, MarketSnapshot>,
    today: NaiveDate,
) -> Vec<PositionRow<'a>> {
    positions
        .iter()
        .map(|pos| {
            let Some(snap) = snapshots.get(&pos.ticker) else {
                return PositionRow {
                    position: pos,
                    snapshot: None,
                    status: RowStatus::NoData,
                };
            };

            let applied_price = snap.spot_price + pos.price_move;
            let time_to_expiry = years_to_expiry(pos.expiration, today);

            let status = match pricer.value(
                pos.option_type,
                applied_price,
                pos.strike,
                snap.risk_free_rate,
                snap.implied_volatility,
                time_to_expiry,
            ) {
                Ok(value_per_share) => {
                    let shares = SHARES_PER_CONTRACT * pos.contracts as f64;
                    let total_value = value_per_share * shares;
                    RowStatus::Valued(ValuationResult {
                        applied_price,
                        time_to_expiry,
                        value_per_share,
                        total_value,
                        profit: total_value - pos.purchase_price * shares,
                    })
                }
                Err(e) => RowStatus::Invalid(e.to_string()),
            };

            PositionRow {
                position: pos,
                snapshot: Some(*snap),
                status,
            }
        })
        .collect()
}

/// Whole days until expiration over a 365-day year. Same-day expiries are
/// treated as expired (T = 0).
pub fn years_to_expiry(expiration: NaiveDate, today: NaiveDate) -> f64 {
    (expiration - today).num_days() as f64 / 365.0
}

/// Aggregates over the tick's valued rows only; gap and error rows are
/// excluded.
pub fn totals(rows: &[PositionRow<'_>]) -> Totals {
    rows.iter().fold(Totals::default(), |mut acc, row| {
        if let RowStatus::Valued(v) = &row.status {
            acc.total_value += v.total_value;
            acc.total_profit += v.profit;
            acc.valued_rows += 1;
        }
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppResult;
    use crate::positions::OptionType;
    use crate::pricing::black_scholes::BlackScholes;

    /// Fixed-value pricer so arithmetic checks are exact.
    struct FlatPricer(f64);

    impl OptionPricer for FlatPricer {
        fn name(&self) -> &'static str {
            "flat"
        }

        fn value(
            &self,
            _option_type: OptionType,
            applied_price: f64,
            strike: f64,
            _rate: f64,
            _sigma: f64,
            _time_to_expiry: f64,
        ) -> AppResult<f64> {
            if applied_price <= 0.0 || strike <= 0.0 {
                return Err(crate::errors::AppError::Pricing("bad input".into()));
            }
            Ok(self.0)
        }
    }

    fn position(ticker: &str, price_move: f64, purchase_price: f64, contracts: i64) -> Position {
        Position {
            ticker: ticker.into(),
            expiration: NaiveDate::from_ymd_opt(2027, 1, 15).unwrap(),
            option_type: OptionType::Call,
            strike: 100.0,
            price_move,
            purchase_price,
            contracts,
        }
    }

    fn snapshot(spot: f64) -> MarketSnapshot {
        MarketSnapshot {
            spot_price: spot,
            risk_free_rate: 0.05,
            implied_volatility: 0.2,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    #[test]
    fn gap_for_one_ticker_does_not_block_others() {
        let positions = vec![position("AAPL", 0.0, 1.0, 1), position("SPY", 0.0, 1.0, 1)];
        let mut snapshots = HashMap::new();
        snapshots.insert("SPY".to_string(), snapshot(500.0));

        let rows = revalue(&FlatPricer(2.0), &positions, &snapshots, today());
        assert_eq!(rows.len(), 2);
        assert!(matches!(rows[0].status, RowStatus::NoData));
        assert!(matches!(rows[1].status, RowStatus::Valued(_)));
        // Input order preserved
        assert_eq!(rows[0].position.ticker, "AAPL");
        assert_eq!(rows[1].position.ticker, "SPY");
    }

    #[test]
    fn profit_arithmetic_is_exact() {
        let positions = vec![position("AAPL", 0.0, 1.0, 3)];
        let mut snapshots = HashMap::new();
        snapshots.insert("AAPL".to_string(), snapshot(100.0));

        let rows = revalue(&FlatPricer(2.5), &positions, &snapshots, today());
        let RowStatus::Valued(v) = &rows[0].status else {
            panic!("expected valued row");
        };
        // A zero move leaves the spot untouched.
        assert_eq!(v.applied_price, 100.0);
        assert_eq!(v.total_value, 2.5 * 100.0 * 3.0);
        assert_eq!(v.profit, 2.5 * 100.0 * 3.0 - 1.0 * 100.0 * 3.0);
    }

    #[test]
    fn zero_contracts_profit_is_zero() {
        let positions = vec![position("AAPL", 0.0, 1.0, 0)];
        let mut snapshots = HashMap::new();
        snapshots.insert("AAPL".to_string(), snapshot(100.0));

        let rows = revalue(&FlatPricer(2.5), &positions, &snapshots, today());
        let RowStatus::Valued(v) = &rows[0].status else {
            panic!("expected valued row");
        };
        assert_eq!(v.total_value, 0.0);
        assert_eq!(v.profit, 0.0);
    }

    #[test]
    fn price_move_shifts_applied_price() {
        let positions = vec![position("AAPL", 5.0, 1.0, 1)];
        let mut snapshots = HashMap::new();
        snapshots.insert("AAPL".to_string(), snapshot(95.0));

        let rows = revalue(&FlatPricer(1.0), &positions, &snapshots, today());
        let RowStatus::Valued(v) = &rows[0].status else {
            panic!("expected valued row");
        };
        assert_eq!(v.applied_price, 100.0);
    }

    #[test]
    fn negative_move_past_zero_is_invalid_not_clamped() {
        let positions = vec![position("AAPL", -120.0, 1.0, 1)];
        let mut snapshots = HashMap::new();
        snapshots.insert("AAPL".to_string(), snapshot(95.0));

        let rows = revalue(&BlackScholes::new(), &positions, &snapshots, today());
        assert!(
            matches!(&rows[0].status, RowStatus::Invalid(_)),
            "applied price -25 must be rejected"
        );
    }

    #[test]
    fn expired_position_values_at_intrinsic() {
        let mut pos = position("AAPL", 0.0, 0.1, 1);
        pos.expiration = today();
        let mut snapshots = HashMap::new();
        snapshots.insert("AAPL".to_string(), snapshot(105.0));

        let positions = vec![pos];
        let rows = revalue(&BlackScholes::new(), &positions, &snapshots, today());
        let RowStatus::Valued(v) = &rows[0].status else {
            panic!("expected valued row");
        };
        assert_eq!(v.time_to_expiry, 0.0);
        assert_eq!(v.value_per_share, 5.0);
    }

    #[test]
    fn totals_skip_gap_and_error_rows() {
        let positions = vec![
            position("AAPL", 0.0, 1.0, 1),
            position("MISSING", 0.0, 1.0, 1),
            position("BAD", -999.0, 1.0, 1),
        ];
        let mut snapshots = HashMap::new();
        snapshots.insert("AAPL".to_string(), snapshot(100.0));
        snapshots.insert("BAD".to_string(), snapshot(100.0));

        let rows = revalue(&FlatPricer(2.0), &positions, &snapshots, today());
        let t = totals(&rows);
        assert_eq!(t.valued_rows, 1);
        assert_eq!(t.total_value, 200.0);
        assert_eq!(t.total_profit, 100.0);
    }
}
