use crate::errors::{AppError, AppResult};
use chrono::NaiveDate;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("call") {
            Some(Self::Call)
        } else if s.eq_ignore_ascii_case("put") {
            Some(Self::Put)
        } else {
            None
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

/// One option holding. Loaded once at startup, never mutated afterwards.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Position {
    pub ticker: String,
    pub expiration: NaiveDate,
    pub option_type: OptionType,
    pub strike: f64,
    /// Simulated offset added to the live spot price. May be negative or zero.
    pub price_move: f64,
    /// Per-share price originally paid.
    pub purchase_price: f64,
    pub contracts: i64,
}

/// Loads positions from a 7-column CSV:
/// `ticker,expiration_date,option_type,strike,price_move,purchase_price,contracts`
///
/// Blank lines and `#`-comment lines are ignored. An optional header row is
/// detected by its first field. Malformed rows are skipped with a warning
/// unless `strict` is set, in which case the first bad row fails the load.
pub fn load_positions(path: &Path, strict: bool) -> AppResult<Vec<Position>> {
    let file = std::fs::File::open(path)
        .map_err(|e| AppError::Positions(format!("{}: {e}", path.display())))?;
    read_positions(file, strict)
}

pub fn read_positions<R: Read>(reader: R, strict: bool) -> AppResult<Vec<Position>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut positions = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(idx as u64 + 1);

        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        // Optional header row
        if record.get(0).is_some_and(|f| f.eq_ignore_ascii_case("ticker")) {
            continue;
        }

        match parse_record(&record) {
            Ok(pos) => positions.push(pos),
            Err(reason) if strict => {
                return Err(AppError::Positions(format!("line {line}: {reason}")));
            }
            Err(reason) => {
                tracing::warn!(line, reason = %reason, "skipping malformed position row");
            }
        }
    }

    if positions.is_empty() {
        return Err(AppError::Positions("no valid positions loaded".into()));
    }
    Ok(positions)
}

fn parse_record(record: &csv::StringRecord) -> Result<Position, String> {
    if record.len() < 7 {
        return Err(format!("expected 7 fields, got {}", record.len()));
    }

    let ticker = record[0].to_string();
    if ticker.is_empty() {
        return Err("empty ticker".into());
    }

    let expiration =
        parse_expiration(&record[1]).ok_or_else(|| format!("bad date: {:?}", &record[1]))?;

    let option_type = OptionType::parse(&record[2])
        .ok_or_else(|| format!("bad option type: {:?}", &record[2]))?;

    let strike: f64 = record[3]
        .parse()
        .map_err(|_| format!("bad strike: {:?}", &record[3]))?;
    if !(strike > 0.0) {
        return Err(format!("strike must be positive, got {strike}"));
    }

    // The move column may carry an explicit leading '+'.
    let price_move: f64 = record[4]
        .trim_start_matches('+')
        .parse()
        .map_err(|_| format!("bad price move: {:?}", &record[4]))?;

    let purchase_price: f64 = record[5]
        .parse()
        .map_err(|_| format!("bad purchase price: {:?}", &record[5]))?;

    let contracts: i64 = record[6]
        .parse()
        .map_err(|_| format!("bad contract count: {:?}", &record[6]))?;

    Ok(Position {
        ticker,
        expiration,
        option_type,
        strike,
        price_move,
        purchase_price,
        contracts,
    })
}

/// Accepts the date formats humans actually put in position lists.
/// Tried in order; first match wins.
fn parse_expiration(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%y"))
        .or_else(|_| NaiveDate::parse_from_str(s, "%d-%b-%Y"))
        .or_else(|_| NaiveDate::parse_from_str(s, "%d %b %Y"))
        .or_else(|_| NaiveDate::parse_from_str(s, "%b %d, %Y"))
        .or_else(|_| NaiveDate::parse_from_str(s, "%B %d, %Y"))
        .ok()
}
