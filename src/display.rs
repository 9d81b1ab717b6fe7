use crate::errors::{AppError, AppResult};
use crate::state::{RowStatus, Totals};
use crate::valuator::PositionRow;
use chrono::{DateTime, Local};
use smallvec::SmallVec;
use std::io::Write;

/// A full replacement table for one tick. The surface renders the whole
/// frame or nothing; there are no partial updates.
pub struct TableFrame {
    pub refreshed_at: DateTime<Local>,
    pub risk_free_rate: f64,
    pub refresh_secs: u64,
    pub rows: SmallVec<[String; 16]>,
    pub totals: Totals,
    pub position_count: usize,
}

impl TableFrame {
    pub fn build(
        rows: &[PositionRow<'_>],
        totals: Totals,
        risk_free_rate: f64,
        refresh_secs: u64,
        refreshed_at: DateTime<Local>,
    ) -> Self {
        Self {
            refreshed_at,
            risk_free_rate,
            refresh_secs,
            rows: rows.iter().map(format_row).collect(),
            totals,
            position_count: rows.len(),
        }
    }
}

pub fn header_line() -> String {
    format!(
        "{:<6} | {:<4} | {:<11} | {:>8} | {:>9} | {:>6} | {:>13} | {:>11} | {:>9} | {:>9} | {:>10} | {:>10}",
        "TICKER",
        "TYPE",
        "EXPIRATION",
        "STRIKE",
        "CUR_PRICE",
        "MOVE",
        "APPLIED_PRICE",
        "TIME_TO_EXP",
        "VALUE/SH",
        "CONTRACTS",
        "TOTAL_VAL",
        "PROFIT",
    )
}

fn format_row(row: &PositionRow<'_>) -> String {
    let p = row.position;
    let prefix = format!(
        "{:<6} | {:<4} | {:<11} | {:>8.2}",
        p.ticker,
        p.option_type,
        p.expiration.format("%d-%b-%Y"),
        p.strike,
    );

    match &row.status {
        RowStatus::Valued(v) => {
            let spot = row.snapshot.map(|s| s.spot_price).unwrap_or_default();
            format!(
                "{prefix} | {:>9.2} | {:>+6.2} | {:>13.2} | {:>11.3} | {:>9.2} | {:>9} | {:>10.2} | {:>10.2}",
                spot, p.price_move, v.applied_price, v.time_to_expiry, v.value_per_share,
                p.contracts, v.total_value, v.profit,
            )
        }
        RowStatus::NoData => format!("{prefix} | (no data)"),
        RowStatus::Invalid(reason) => format!("{prefix} | invalid: {reason}"),
    }
}

/// The external rendering surface. Accepts a full table each tick; release
/// must leave the terminal usable.
pub trait DisplaySink {
    fn render(&mut self, frame: &TableFrame) -> AppResult<()>;
    fn release(&mut self);
}

/// ANSI full-screen sink on stdout. Logging goes to stderr so the surface
/// stays clean.
pub struct TerminalSink {
    out: std::io::Stdout,
    active: bool,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self {
            out: std::io::stdout(),
            active: false,
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for TerminalSink {
    fn render(&mut self, frame: &TableFrame) -> AppResult<()> {
        let mut buf = String::with_capacity(4096);

        if !self.active {
            // Hide cursor and clear once; later frames overwrite in place.
            buf.push_str("\x1b[?25l\x1b[2J");
            self.active = true;
        }
        buf.push_str("\x1b[H");

        let mut line = |text: &str| {
            buf.push_str(text);
            buf.push_str("\x1b[K\r\n");
        };

        line("=== Option Valuation Stream ===");
        line(&format!(
            "Last refresh: {}",
            frame.refreshed_at.format("%Y-%m-%d %H:%M:%S")
        ));
        line(&format!(
            "Risk-free rate (^IRX): {:.2}%",
            frame.risk_free_rate * 100.0
        ));
        line(&format!(
            "Data refreshes every {}s. (Press Ctrl+C to quit)",
            frame.refresh_secs
        ));
        line("");
        line(&header_line());
        for row in &frame.rows {
            line(row);
        }
        line("");
        line(&format!(
            "TOTALS ({}/{} valued): value={:.2} profit={:+.2}",
            frame.totals.valued_rows,
            frame.position_count,
            frame.totals.total_value,
            frame.totals.total_profit,
        ));

        // Clear anything left over from a taller previous frame.
        buf.push_str("\x1b[J");

        self.out
            .write_all(buf.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| AppError::Render(e.to_string()))
    }

    fn release(&mut self) {
        if self.active {
            // Restore cursor and attributes; leave the last frame visible.
            let _ = self.out.write_all(b"\x1b[0m\x1b[?25h\n");
            let _ = self.out.flush();
            self.active = false;
        }
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        self.release();
    }
}
