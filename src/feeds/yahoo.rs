use super::MarketDataProvider;
use crate::errors::{AppError, AppResult};
use crate::positions::OptionType;
use chrono::NaiveDate;
use reqwest::Client;

/// Yahoo Finance quote adapter. All methods return Result, never panic.
///
/// Spot prices come from the chart endpoint, the risk-free rate from the
/// 13-week T-bill index (^IRX), implied volatility from the option chain
/// for the position's expiration.
#[derive(Clone)]
pub struct YahooFinanceProvider {
    client: Client,
    base_url: String,
}

const IRX_TICKER: &str = "^IRX";

impl YahooFinanceProvider {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .user_agent("Mozilla/5.0 (compatible; optionwatch/0.1)")
                .pool_max_idle_per_host(4)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Quote(format!("HTTP {status}: {body}")));
        }

        resp.json::<T>()
            .await
            .map_err(|e| AppError::Parse(format!("GET {path}: {e}")))
    }

    async fn chart_price(&self, ticker: &str) -> AppResult<f64> {
        let encoded = ticker.replace('^', "%5E");
        let resp: ChartResponse = self
            .get_json(&format!("/v8/finance/chart/{encoded}?range=1d&interval=1m"))
            .await?;

        let price = resp
            .chart
            .and_then(|c| c.result)
            .and_then(|r| r.into_iter().next())
            .and_then(|r| r.meta)
            .and_then(|m| m.regular_market_price)
            .ok_or_else(|| AppError::Quote(format!("no market price for {ticker}")))?;

        if price <= 0.0 || !price.is_finite() {
            return Err(AppError::Quote(format!("invalid price for {ticker}: {price}")));
        }
        Ok(price)
    }
}

impl MarketDataProvider for YahooFinanceProvider {
    async fn spot(&self, ticker: &str) -> AppResult<f64> {
        self.chart_price(ticker).await
    }

    /// ^IRX quotes the 13-week T-bill yield as a percentage.
    async fn risk_free_rate(&self) -> AppResult<f64> {
        let percent = self.chart_price(IRX_TICKER).await?;
        Ok(percent / 100.0)
    }

    async fn implied_volatility(
        &self,
        ticker: &str,
        expiration: NaiveDate,
        option_type: OptionType,
        strike: f64,
    ) -> AppResult<f64> {
        let date = expiration
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_default();

        let resp: OptionsResponse = self
            .get_json(&format!("/v7/finance/options/{ticker}?date={date}"))
            .await?;

        let quotes = resp
            .option_chain
            .and_then(|c| c.result)
            .and_then(|r| r.into_iter().next())
            .and_then(|r| r.options)
            .and_then(|o| o.into_iter().next())
            .map(|set| match option_type {
                OptionType::Call => set.calls.unwrap_or_default(),
                OptionType::Put => set.puts.unwrap_or_default(),
            })
            .unwrap_or_default();

        nearest_strike_iv(&quotes, strike).ok_or_else(|| {
            AppError::Quote(format!("no chain entry for {ticker} near strike {strike}"))
        })
    }
}

/// Picks the implied volatility of the listed contract whose strike is
/// closest to the target. Entries without a usable IV are ignored.
fn nearest_strike_iv(quotes: &[OptionQuote], target: f64) -> Option<f64> {
    quotes
        .iter()
        .filter_map(|q| match (q.strike, q.implied_volatility) {
            (Some(strike), Some(iv)) if iv.is_finite() && iv >= 0.0 => Some((strike, iv)),
            _ => None,
        })
        .min_by(|(a, _), (b, _)| {
            let da = (a - target).abs();
            let db = (b - target).abs();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(_, iv)| iv)
}

// Response shapes (fields we don't read are omitted; serde ignores the rest)

#[derive(serde::Deserialize)]
struct ChartResponse {
    chart: Option<Chart>,
}

#[derive(serde::Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(serde::Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(serde::Deserialize)]
struct OptionsResponse {
    #[serde(rename = "optionChain")]
    option_chain: Option<OptionChain>,
}

#[derive(serde::Deserialize)]
struct OptionChain {
    result: Option<Vec<OptionChainResult>>,
}

#[derive(serde::Deserialize)]
struct OptionChainResult {
    options: Option<Vec<OptionQuoteSet>>,
}

#[derive(serde::Deserialize)]
struct OptionQuoteSet {
    calls: Option<Vec<OptionQuote>>,
    puts: Option<Vec<OptionQuote>>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionQuote {
    strike: Option<f64>,
    implied_volatility: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(strike: f64, iv: Option<f64>) -> OptionQuote {
        OptionQuote {
            strike: Some(strike),
            implied_volatility: iv,
        }
    }

    #[test]
    fn nearest_strike_wins() {
        let quotes = vec![
            quote(90.0, Some(0.31)),
            quote(100.0, Some(0.28)),
            quote(110.0, Some(0.26)),
        ];
        assert_eq!(nearest_strike_iv(&quotes, 98.0), Some(0.28));
        assert_eq!(nearest_strike_iv(&quotes, 112.0), Some(0.26));
    }

    #[test]
    fn entries_without_iv_are_skipped() {
        let quotes = vec![quote(100.0, None), quote(105.0, Some(0.3))];
        assert_eq!(nearest_strike_iv(&quotes, 100.0), Some(0.3));
        assert_eq!(nearest_strike_iv(&[quote(100.0, None)], 100.0), None);
        assert_eq!(nearest_strike_iv(&[], 100.0), None);
    }

    #[test]
    fn chain_response_parses() {
        let body = r#"{
            "optionChain": {
                "result": [{
                    "options": [{
                        "calls": [{"strike": 100.0, "impliedVolatility": 0.27}],
                        "puts": []
                    }]
                }]
            }
        }"#;
        let resp: OptionsResponse = serde_json::from_str(body).unwrap();
        let calls = resp
            .option_chain
            .unwrap()
            .result
            .unwrap()
            .remove(0)
            .options
            .unwrap()
            .remove(0)
            .calls
            .unwrap();
        assert_eq!(nearest_strike_iv(&calls, 99.0), Some(0.27));
    }
}
