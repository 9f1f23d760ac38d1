use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use crate::business_logic::entry::PriceLookup;
use crate::models::candle::{Candle, RawKline};

const BINANCE_API_URL: &str = "https://api.binance.com/api/v3";
const KLINE_PAGE_LIMIT: usize = 1000;

const LEVERAGED_SUFFIXES: [&str; 8] = ["UP", "DOWN", "BULL", "BEAR", "3L", "3S", "5L", "5S"];
const LEVERAGED_MARKERS: [&str; 2] = ["LEVERAGED", "INVERSE"];

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    quote_asset: String,
}

#[derive(Clone)]
pub struct BinanceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    page_delay: Duration,
}

impl BinanceClient {
    pub fn new(api_key: Option<String>, page_delay: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: BINANCE_API_URL.to_string(),
            api_key,
            page_delay,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.header("X-MBX-APIKEY", key),
            None => request,
        }
    }

    /// Fetch one page of klines from `start_time`, optionally bounded by `end_time`
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_time: u64,
        end_time: Option<u64>,
    ) -> anyhow::Result<Vec<Candle>> {
        let query = kline_query(symbol, interval, start_time, end_time);

        let raw = self
            .get("/klines")
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<RawKline>>()
            .await
            .with_context(|| format!("failed to decode klines for {}", symbol))?;

        raw.into_iter()
            .map(|kline| Candle::try_from(kline).context("invalid kline price"))
            .collect()
    }

    /// Fetch every closed candle from `start_time` until now, page by page
    pub async fn fetch_historical(
        &self,
        symbol: &str,
        interval: &str,
        start_time: u64,
    ) -> anyhow::Result<Vec<Candle>> {
        let now = chrono::Utc::now().timestamp_millis() as u64;
        let mut candles: Vec<Candle> = Vec::new();
        let mut cursor = start_time;

        while cursor < now {
            let page = self.fetch_klines(symbol, interval, cursor, Some(now)).await?;
            let Some(last) = page.last() else {
                break;
            };

            cursor = last.close_time + 1;
            let short_page = page.len() < KLINE_PAGE_LIMIT;
            candles.extend(page);

            if short_page {
                break;
            }
            tokio::time::sleep(self.page_delay).await;
        }

        candles.retain(|candle| candle.close_time <= now);
        Ok(candles)
    }

    pub async fn fetch_current_price(&self, symbol: &str) -> anyhow::Result<f64> {
        let ticker = self
            .get("/ticker/price")
            .query(&[("symbol", symbol)])
            .send()
            .await?
            .error_for_status()?
            .json::<TickerPrice>()
            .await?;

        ticker
            .price
            .parse::<f64>()
            .with_context(|| format!("invalid ticker price {:?}", ticker.price))
    }

    /// All trading USDT-quoted spot pairs, leveraged tokens excluded
    pub async fn fetch_usdt_pairs(&self) -> anyhow::Result<Vec<String>> {
        let info = self
            .get("/exchangeInfo")
            .send()
            .await?
            .error_for_status()?
            .json::<ExchangeInfo>()
            .await
            .context("failed to decode exchange info")?;

        let symbols: Vec<String> = info
            .symbols
            .into_iter()
            .filter(|s| s.quote_asset == "USDT" && s.status == "TRADING")
            .map(|s| s.symbol)
            .filter(|symbol| !is_leveraged_token(symbol))
            .collect();

        tracing::info!("Found {} USDT trading pairs", symbols.len());
        Ok(symbols)
    }
}

#[async_trait]
impl PriceLookup for BinanceClient {
    async fn current_price(&self, symbol: &str) -> anyhow::Result<f64> {
        self.fetch_current_price(symbol).await
    }
}

fn kline_query(
    symbol: &str,
    interval: &str,
    start_time: u64,
    end_time: Option<u64>,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("symbol", symbol.to_string()),
        ("interval", interval.to_string()),
        ("limit", KLINE_PAGE_LIMIT.to_string()),
        ("startTime", start_time.to_string()),
    ];
    if let Some(end) = end_time {
        query.push(("endTime", end.to_string()));
    }
    query
}

/// Matches on the full symbol, so `JUPUSDT` is kept
fn is_leveraged_token(symbol: &str) -> bool {
    LEVERAGED_SUFFIXES.iter().any(|suffix| symbol.ends_with(suffix))
        || LEVERAGED_MARKERS.iter().any(|marker| symbol.contains(marker))
}
