use async_trait::async_trait;

use crate::{Interval, Period, PriceSeries, Result, TickerInfo};

/// Abstraction over the market-data provider.
///
/// `YahooClient` implements this against the live provider.
/// `ReplayClient` implements this over in-memory or on-disk fixtures.
///
/// The screener holds an `Arc<dyn MarketDataClient>` and never caches what it
/// returns; every screening run fetches fresh.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Daily (or coarser) OHLCV history, ascending by date, with every SMA
    /// column present but unset.
    ///
    /// Fails with `Error::DataUnavailable` on network errors, unknown tickers
    /// and empty responses.
    async fn get_history(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> Result<PriceSeries>;

    /// Reference attributes used for display and for the percent change.
    async fn get_info(&self, ticker: &str) -> Result<TickerInfo>;
}
