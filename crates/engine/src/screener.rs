use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use common::{
    round_to, Error, Interval, MarketDataClient, Period, Result, ScreenResult, SignalEvent,
};
use signals::{detect, with_moving_averages, SMA_SLOW};

/// Tuning for a screening run.
#[derive(Debug, Clone)]
pub struct ScreenerConfig {
    /// Size of the worker pool; also the cap on in-flight provider requests.
    pub max_concurrency: usize,
    /// Applies to each provider call separately.
    pub fetch_timeout: Duration,
    pub lookback: Period,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            fetch_timeout: Duration::from_secs(30),
            lookback: Period::OneYear,
        }
    }
}

/// Runs the crossover screen over a universe of tickers.
///
/// Stateless between runs: every call fetches fresh data through the
/// injected client and builds a new `ScreenResult`.
#[derive(Clone)]
pub struct Screener {
    client: Arc<dyn MarketDataClient>,
    config: ScreenerConfig,
}

/// What a worker hands back to the orchestrator.
type TickerOutcome = (usize, String, Result<Option<SignalEvent>>);

impl Screener {
    pub fn new(client: Arc<dyn MarketDataClient>, config: ScreenerConfig) -> Self {
        Self { client, config }
    }

    /// Screen every ticker and return once all of them are resolved.
    ///
    /// Per-ticker failures are logged and reported in `dropped`; they never
    /// fail the run.
    pub async fn run_screen(&self, universe: &[String]) -> ScreenResult {
        self.run(universe, None).await
    }

    /// Like `run_screen`, but gives up on tickers still outstanding when
    /// `deadline` elapses and reports them as dropped.
    pub async fn run_screen_with_deadline(
        &self,
        universe: &[String],
        deadline: Duration,
    ) -> ScreenResult {
        self.run(universe, Some(deadline)).await
    }

    async fn run(&self, universe: &[String], deadline: Option<Duration>) -> ScreenResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        let deadline_at = deadline.map(|d| tokio::time::Instant::now() + d);

        let pool = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut workers: JoinSet<TickerOutcome> = JoinSet::new();

        for (index, ticker) in universe.iter().enumerate() {
            let client = self.client.clone();
            let pool = pool.clone();
            let ticker = ticker.clone();
            let lookback = self.config.lookback;
            let fetch_timeout = self.config.fetch_timeout;

            workers.spawn(async move {
                let outcome = match pool.acquire_owned().await {
                    Ok(_permit) => {
                        screen_ticker(client.as_ref(), &ticker, lookback, fetch_timeout).await
                    }
                    Err(_) => Err(Error::Other("worker pool closed".into())),
                };
                (index, ticker, outcome)
            });
        }

        let mut resolved = vec![false; universe.len()];
        let mut fired: Vec<(usize, SignalEvent)> = Vec::new();
        let mut dropped: Vec<(usize, String)> = Vec::new();

        loop {
            let next = match deadline_at {
                Some(at) => {
                    let waited = tokio::time::timeout_at(at, workers.join_next()).await;
                    match waited {
                        Ok(next) => next,
                        Err(_) => {
                            warn!(
                                outstanding = workers.len(),
                                "Screen deadline reached, abandoning outstanding tickers"
                            );
                            workers.abort_all();
                            break;
                        }
                    }
                }
                None => workers.join_next().await,
            };

            let Some(joined) = next else { break };
            match joined {
                Ok((index, ticker, outcome)) => {
                    resolved[index] = true;
                    match outcome {
                        Ok(Some(event)) => {
                            info!(
                                ticker = %ticker,
                                signal = %event.signal,
                                change = event.percent_change,
                                "Ticker passed the screen"
                            );
                            fired.push((index, event));
                        }
                        Ok(None) => debug!(ticker = %ticker, "No crossover"),
                        Err(e) if e.is_expected_drop() => {
                            debug!(ticker = %ticker, reason = %e, "Ticker dropped");
                            dropped.push((index, ticker));
                        }
                        Err(e) => {
                            warn!(
                                ticker = %ticker,
                                error = %e,
                                "Ticker failed, excluded from result"
                            );
                            dropped.push((index, ticker));
                        }
                    }
                }
                // The ticker is recovered below from the unresolved slots.
                Err(e) => warn!(error = %e, "Screen worker panicked"),
            }
        }

        for (index, done) in resolved.iter().enumerate() {
            if !done {
                dropped.push((index, universe[index].clone()));
            }
        }

        fired.sort_by_key(|(index, _)| *index);
        dropped.sort_by_key(|(index, _)| *index);

        let result = ScreenResult {
            events: fired.into_iter().map(|(_, event)| event).collect(),
            attempted: universe.len(),
            dropped: dropped.into_iter().map(|(_, ticker)| ticker).collect(),
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            attempted = result.attempted,
            fired = result.events.len(),
            dropped = result.dropped.len(),
            elapsed_ms = clock.elapsed().as_millis() as u64,
            "Screen complete"
        );
        result
    }
}

/// Fetch, compute and detect for one ticker. No logging here; the
/// orchestrator reports the outcome.
async fn screen_ticker(
    client: &dyn MarketDataClient,
    ticker: &str,
    lookback: Period,
    fetch_timeout: Duration,
) -> Result<Option<SignalEvent>> {
    let series = with_timeout(
        ticker,
        fetch_timeout,
        client.get_history(ticker, lookback, Interval::Daily),
    )
    .await?;

    if series.is_empty() {
        return Err(Error::unavailable(ticker, "empty price history"));
    }
    // Two consecutive bars with a defined 200-day average.
    if series.len() < SMA_SLOW + 1 {
        return Err(Error::InsufficientHistory {
            ticker: ticker.to_string(),
            bars: series.len(),
            required: SMA_SLOW + 1,
        });
    }

    let series = with_moving_averages(series)?;
    let Some(signal) = detect(&series) else {
        return Ok(None);
    };
    let detected_at = Utc::now();

    let info = with_timeout(ticker, fetch_timeout, client.get_info(ticker)).await?;

    let last_close = series
        .last_close()
        .ok_or_else(|| Error::unavailable(ticker, "empty price history"))?;
    // Reference previous close first; the prior bar only when the info has none.
    let previous_close = info
        .previous_close
        .filter(|p| p.is_finite() && *p > 0.0)
        .or_else(|| series.prior_close());
    let percent_change = previous_close
        .and_then(|prev| percent_change(last_close, prev))
        .ok_or_else(|| Error::unavailable(ticker, "no usable previous close"))?;

    Ok(Some(SignalEvent {
        ticker: ticker.to_string(),
        signal,
        detected_at,
        percent_change,
        last_close,
        name: info.long_name,
        current_price: info.current_price,
    }))
}

/// `(latest / previous - 1) * 100`, rounded to two decimals.
/// `None` when the previous close is zero or the result is not finite.
pub fn percent_change(latest: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    let change = (latest / previous - 1.0) * 100.0;
    change.is_finite().then(|| round_to(change, 2))
}

async fn with_timeout<T>(
    ticker: &str,
    limit: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(format!("{ticker}: provider call exceeded {limit:?}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_change_two_decimals() {
        assert_eq!(percent_change(102.0, 100.0), Some(2.0));
        assert_eq!(percent_change(99.0, 100.0), Some(-1.0));
        assert_eq!(percent_change(10.0, 3.0), Some(233.33));
    }

    #[test]
    fn percent_change_rejects_zero_base() {
        assert_eq!(percent_change(10.0, 0.0), None);
        assert_eq!(percent_change(f64::NAN, 10.0), None);
    }
}
