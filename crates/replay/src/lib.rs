use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    Error, Interval, MarketDataClient, Period, PriceBar, PriceSeries, Result, TickerInfo,
};

/// Offline market data client.
///
/// Serves price history and reference info from memory, either inserted
/// directly or loaded from `<TICKER>.json` fixture files. No request ever
/// leaves the process.
#[derive(Clone, Default)]
pub struct ReplayClient {
    /// Daily bars per ticker, ascending by date.
    histories: Arc<RwLock<HashMap<String, Vec<PriceBar>>>>,
    infos: Arc<RwLock<HashMap<String, TickerInfo>>>,
}

/// On-disk shape of one fixture file.
#[derive(Deserialize)]
struct Fixture {
    bars: Vec<PriceBar>,
    #[serde(default)]
    info: Option<TickerInfo>,
}

impl ReplayClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in `dir`; the file stem is the ticker.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut histories = HashMap::new();
        let mut infos = HashMap::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(ticker) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let ticker = ticker.to_uppercase();

            let content = std::fs::read_to_string(&path)?;
            let fixture: Fixture = serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("bad fixture '{}': {e}", path.display()))
            })?;

            debug!(ticker = %ticker, bars = fixture.bars.len(), "Loaded replay fixture");
            if let Some(info) = fixture.info {
                infos.insert(ticker.clone(), info);
            }
            histories.insert(ticker, normalize(fixture.bars));
        }

        info!(dir = %dir.display(), tickers = histories.len(), "ReplayClient initialized");
        Ok(Self {
            histories: Arc::new(RwLock::new(histories)),
            infos: Arc::new(RwLock::new(infos)),
        })
    }

    /// Replace the stored daily history for `ticker`.
    pub async fn insert_history(&self, ticker: &str, bars: Vec<PriceBar>) {
        self.histories
            .write()
            .await
            .insert(ticker.to_uppercase(), normalize(bars));
    }

    /// Replace the stored reference info for `ticker`.
    pub async fn insert_info(&self, ticker: &str, info: TickerInfo) {
        self.infos.write().await.insert(ticker.to_uppercase(), info);
    }

    /// Tickers with stored history, sorted.
    pub async fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.histories.read().await.keys().cloned().collect();
        tickers.sort();
        tickers
    }
}

#[async_trait]
impl MarketDataClient for ReplayClient {
    async fn get_history(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> Result<PriceSeries> {
        let histories = self.histories.read().await;
        let bars = histories
            .get(&ticker.to_uppercase())
            .ok_or_else(|| Error::unavailable(ticker, "no replay data for ticker"))?;

        let bars = resample(trim_to_period(bars, period), interval);
        Ok(PriceSeries::new(ticker, bars))
    }

    async fn get_info(&self, ticker: &str) -> Result<TickerInfo> {
        let key = ticker.to_uppercase();
        if let Some(info) = self.infos.read().await.get(&key) {
            return Ok(info.clone());
        }
        // A ticker with history but no recorded info gets an all-absent info.
        if self.histories.read().await.contains_key(&key) {
            return Ok(TickerInfo::default());
        }
        Err(Error::unavailable(ticker, "no replay data for ticker"))
    }
}

/// Ascending by date; of several bars on one date the last one wins.
fn normalize(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    bars.sort_by_key(|b| b.date);
    bars.reverse();
    bars.dedup_by_key(|b| b.date);
    bars.reverse();
    bars
}

/// Keep the trailing bars the period covers.
fn trim_to_period(bars: &[PriceBar], period: Period) -> Vec<PriceBar> {
    match (period, period.trading_days()) {
        (_, Some(days)) => bars[bars.len().saturating_sub(days)..].to_vec(),
        (Period::YearToDate, None) => match bars.last() {
            Some(last) => bars
                .iter()
                .filter(|b| b.date.year() == last.date.year())
                .cloned()
                .collect(),
            None => Vec::new(),
        },
        _ => bars.to_vec(),
    }
}

/// Aggregate daily bars into weekly or monthly bars dated by their first session.
fn resample(bars: Vec<PriceBar>, interval: Interval) -> Vec<PriceBar> {
    if interval == Interval::Daily {
        return bars;
    }
    let bucket = |bar: &PriceBar| -> (i32, u32) {
        match interval {
            Interval::Daily => (bar.date.year(), bar.date.ordinal()),
            Interval::Weekly => {
                let week = bar.date.iso_week();
                (week.year(), week.week())
            }
            Interval::Monthly => (bar.date.year(), bar.date.month()),
        }
    };

    let mut out: Vec<PriceBar> = Vec::new();
    let mut current: Option<(i32, u32)> = None;
    for bar in bars {
        let key = bucket(&bar);
        match out.last_mut() {
            Some(agg) if current == Some(key) => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
            }
            _ => {
                current = Some(key);
                out.push(bar);
            }
        }
    }
    out
}
