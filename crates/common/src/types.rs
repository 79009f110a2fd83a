use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// One trading session of one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Session date in the exchange's local calendar, timezone dropped.
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: u64,
}

/// Ordered price history for one ticker plus its moving-average columns.
///
/// The SMA columns always have the same length as `bars`. A freshly fetched
/// series has every entry set to `None` until indicators are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub bars: Vec<PriceBar>,
    pub sma_30: Vec<Option<f64>>,
    pub sma_50: Vec<Option<f64>>,
    pub sma_200: Vec<Option<f64>>,
}

/// The four values the crossover rules read from a single bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorRow {
    pub close: f64,
    pub sma_30: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        let len = bars.len();
        Self {
            ticker: ticker.into(),
            bars,
            sma_30: vec![None; len],
            sma_50: vec![None; len],
            sma_200: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Close of the second-to-last bar.
    pub fn prior_close(&self) -> Option<f64> {
        self.bars.iter().rev().nth(1).map(|b| b.close)
    }

    pub fn row(&self, index: usize) -> Option<IndicatorRow> {
        let bar = self.bars.get(index)?;
        Some(IndicatorRow {
            close: bar.close,
            sma_30: self.sma_30.get(index).copied().flatten(),
            sma_50: self.sma_50.get(index).copied().flatten(),
            sma_200: self.sma_200.get(index).copied().flatten(),
        })
    }

    /// Keep only the trailing `n` rows of every column.
    pub fn tail(mut self, n: usize) -> Self {
        let skip = self.bars.len().saturating_sub(n);
        self.bars = self.bars.split_off(skip);
        for column in [&mut self.sma_30, &mut self.sma_50, &mut self.sma_200] {
            let skip = column.len().saturating_sub(n);
            *column = column.split_off(skip);
        }
        self
    }
}

/// History range accepted by `MarketDataClient::get_history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "ytd")]
    YearToDate,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "max")]
    Max,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::YearToDate => "ytd",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
            Period::Max => "max",
        }
    }

    /// Approximate number of daily sessions the period spans.
    /// `None` for `Max` and for `YearToDate`, which depends on the calendar.
    pub fn trading_days(&self) -> Option<usize> {
        match self {
            Period::ThreeMonths => Some(63),
            Period::SixMonths => Some(126),
            Period::OneYear => Some(252),
            Period::TwoYears => Some(504),
            Period::FiveYears => Some(1260),
            Period::YearToDate | Period::Max => None,
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "3mo" => Ok(Period::ThreeMonths),
            "6mo" => Ok(Period::SixMonths),
            "ytd" => Ok(Period::YearToDate),
            "1y" => Ok(Period::OneYear),
            "2y" => Ok(Period::TwoYears),
            "5y" => Ok(Period::FiveYears),
            "max" => Ok(Period::Max),
            other => Err(Error::InvalidArgument(format!("unknown period '{other}'"))),
        }
    }
}

/// Bar size accepted by `MarketDataClient::get_history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1wk")]
    Weekly,
    #[serde(rename = "1mo")]
    Monthly,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1d" => Ok(Interval::Daily),
            "1wk" => Ok(Interval::Weekly),
            "1mo" => Ok(Interval::Monthly),
            other => Err(Error::InvalidArgument(format!("unknown interval '{other}'"))),
        }
    }
}

/// Reference attributes of an instrument. Display-only, except
/// `previous_close` which feeds the signal's percent change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerInfo {
    pub long_name: Option<String>,
    pub currency: Option<String>,
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub open: Option<f64>,
    pub bid: Option<f64>,
    pub bid_size: Option<u64>,
    pub ask: Option<f64>,
    pub ask_size: Option<u64>,
    pub market_cap: Option<f64>,
    pub beta: Option<f64>,
    pub dividend_rate: Option<f64>,
    /// Fraction, e.g. 0.0052 for 0.52 %.
    pub dividend_yield: Option<f64>,
    pub ex_dividend_date: Option<NaiveDate>,
    /// Next earnings date, or the announced window as two dates.
    pub earnings_dates: Vec<NaiveDate>,
    pub target_mean_price: Option<f64>,
}

/// Crossover signals, in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    #[serde(rename = "30 cross 50 above")]
    Sma30CrossAbove50,
    #[serde(rename = "30 cross 50 below")]
    Sma30CrossBelow50,
    #[serde(rename = "30 cross 200 below")]
    Sma30CrossBelow200,
    #[serde(rename = "30 cross 200 above")]
    Sma30CrossAbove200,
    #[serde(rename = "Last below 200")]
    CloseCrossBelow200,
    #[serde(rename = "Last above 200")]
    CloseCrossAbove200,
}

impl SignalKind {
    pub fn name(&self) -> &'static str {
        match self {
            SignalKind::Sma30CrossAbove50 => "30 cross 50 above",
            SignalKind::Sma30CrossBelow50 => "30 cross 50 below",
            SignalKind::Sma30CrossBelow200 => "30 cross 200 below",
            SignalKind::Sma30CrossAbove200 => "30 cross 200 above",
            SignalKind::CloseCrossBelow200 => "Last below 200",
            SignalKind::CloseCrossAbove200 => "Last above 200",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A crossover that fired on a ticker's most recent bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub ticker: String,
    pub signal: SignalKind,
    pub detected_at: DateTime<Utc>,
    /// Latest close against the reference previous close, in percent, 2 dp.
    pub percent_change: f64,
    pub last_close: f64,
    pub name: Option<String>,
    pub current_price: Option<f64>,
}

/// Output of one screening run. Each run replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenResult {
    /// Fired tickers, in universe order.
    pub events: Vec<SignalEvent>,
    pub attempted: usize,
    /// Tickers excluded because of a failed fetch or short history.
    pub dropped: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScreenResult {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn ranked(&self, order: RankOrder) -> Vec<&SignalEvent> {
        let mut events: Vec<&SignalEvent> = self.events.iter().collect();
        match order {
            RankOrder::Universe => {}
            RankOrder::ChangeDesc => {
                events.sort_by(|a, b| b.percent_change.total_cmp(&a.percent_change))
            }
            RankOrder::ChangeAsc => {
                events.sort_by(|a, b| a.percent_change.total_cmp(&b.percent_change))
            }
            RankOrder::Ticker => events.sort_by(|a, b| a.ticker.cmp(&b.ticker)),
        }
        events
    }

    pub fn display_records(&self, order: RankOrder) -> Vec<DisplayRecord> {
        self.ranked(order).into_iter().map(DisplayRecord::from).collect()
    }
}

/// Sort order for presenting a `ScreenResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankOrder {
    #[default]
    Universe,
    ChangeDesc,
    ChangeAsc,
    Ticker,
}

/// Flat table row handed to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayRecord {
    #[serde(rename = "Stock Ticker")]
    pub ticker: String,
    #[serde(rename = "Signal Name")]
    pub signal_name: String,
    #[serde(rename = "% Change")]
    pub percent_change: f64,
}

impl From<&SignalEvent> for DisplayRecord {
    fn from(event: &SignalEvent) -> Self {
        Self {
            ticker: event.ticker.clone(),
            signal_name: event.signal.name().to_string(),
            percent_change: event.percent_change,
        }
    }
}

/// Where the screener gets its price history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Yahoo,
    Replay,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Yahoo => write!(f, "yahoo"),
            DataSource::Replay => write!(f, "replay"),
        }
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000,
        }
    }

    fn event(ticker: &str, change: f64) -> SignalEvent {
        SignalEvent {
            ticker: ticker.into(),
            signal: SignalKind::CloseCrossAbove200,
            detected_at: Utc::now(),
            percent_change: change,
            last_close: 10.0,
            name: None,
            current_price: None,
        }
    }

    #[test]
    fn new_series_has_unset_indicator_columns() {
        let series = PriceSeries::new("AAPL", vec![bar(2, 1.0), bar(3, 2.0)]);
        assert_eq!(series.sma_30, vec![None, None]);
        assert_eq!(series.sma_200.len(), 2);
        assert_eq!(series.prior_close(), Some(1.0));
        assert_eq!(series.last_close(), Some(2.0));
    }

    #[test]
    fn tail_trims_every_column() {
        let mut series = PriceSeries::new("AAPL", (1..=5).map(|d| bar(d, d as f64)).collect());
        series.sma_30 = vec![None, None, Some(2.0), Some(3.0), Some(4.0)];
        let tail = series.tail(2);
        assert_eq!(tail.closes(), vec![4.0, 5.0]);
        assert_eq!(tail.sma_30, vec![Some(3.0), Some(4.0)]);
        assert_eq!(tail.sma_50, vec![None, None]);
    }

    #[test]
    fn signal_names_serialize_as_display_text() {
        let json = serde_json::to_string(&SignalKind::Sma30CrossAbove50).unwrap();
        assert_eq!(json, "\"30 cross 50 above\"");
        assert_eq!(SignalKind::CloseCrossBelow200.to_string(), "Last below 200");
    }

    #[test]
    fn display_record_uses_dashboard_column_names() {
        let record = DisplayRecord::from(&event("MSFT", -1.25));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["Stock Ticker"], "MSFT");
        assert_eq!(value["Signal Name"], "Last above 200");
        assert_eq!(value["% Change"], -1.25);
    }

    #[test]
    fn ranking_orders_by_change() {
        let now = Utc::now();
        let result = ScreenResult {
            events: vec![event("B", 1.0), event("A", -3.0), event("C", 2.5)],
            attempted: 3,
            dropped: Vec::new(),
            started_at: now,
            finished_at: now,
        };
        let tickers = |order| -> Vec<String> {
            result.ranked(order).iter().map(|e| e.ticker.clone()).collect()
        };

        assert_eq!(tickers(RankOrder::ChangeDesc), vec!["C", "B", "A"]);
        assert_eq!(tickers(RankOrder::ChangeAsc), vec!["A", "B", "C"]);
        assert_eq!(tickers(RankOrder::Ticker), vec!["A", "B", "C"]);

        let universe = result.display_records(RankOrder::Universe);
        assert_eq!(universe[0].ticker, "B");
    }

    #[test]
    fn period_round_trips_through_text() {
        for token in ["3mo", "6mo", "ytd", "1y", "2y", "5y", "max"] {
            let period: Period = token.parse().unwrap();
            assert_eq!(period.to_string(), token);
        }
        assert!("10y".parse::<Period>().is_err());
    }

    #[test]
    fn round_to_two_places() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(-0.0049, 2), -0.0);
        assert_eq!(round_to(2.0000000001, 2), 2.0);
    }
}
