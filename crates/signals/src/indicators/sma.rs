use common::{Error, PriceSeries, Result};

/// Window of the fast moving average.
pub const SMA_FAST: usize = 30;
/// Window of the medium moving average.
pub const SMA_MID: usize = 50;
/// Window of the slow moving average. Also the minimum history the
/// crossover rules need.
pub const SMA_SLOW: usize = 200;

/// Simple moving average over `series` (oldest first).
///
/// The output has the same length as the input. Element `i` is the mean of
/// `series[i + 1 - window..=i]`, or `None` while fewer than `window` values
/// are available. A zero window is a programming error.
pub fn simple_moving_average(series: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    if window == 0 {
        return Err(Error::InvalidArgument(
            "moving average window must be positive".to_string(),
        ));
    }

    let mut out = Vec::with_capacity(series.len());
    let mut sum = 0.0;

    for (i, &value) in series.iter().enumerate() {
        sum += value;
        if i >= window {
            sum -= series[i - window];
        }

        if i + 1 < window {
            out.push(None);
            continue;
        }

        // A NaN or inf leaving the window cannot be subtracted back out.
        if !sum.is_finite() {
            sum = series[i + 1 - window..=i].iter().sum();
        }
        out.push(Some(sum / window as f64));
    }

    Ok(out)
}

/// Fill the SMA_30, SMA_50 and SMA_200 columns from the series' closes.
pub fn with_moving_averages(mut series: PriceSeries) -> Result<PriceSeries> {
    let closes = series.closes();
    series.sma_30 = simple_moving_average(&closes, SMA_FAST)?;
    series.sma_50 = simple_moving_average(&closes, SMA_MID)?;
    series.sma_200 = simple_moving_average(&closes, SMA_SLOW)?;
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_rejects_zero_window() {
        let err = simple_moving_average(&[1.0, 2.0], 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn sma_absent_until_window_filled() {
        let out = simple_moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3).unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert!((out[2].unwrap() - 2.0).abs() < 1e-12);
        assert!((out[3].unwrap() - 3.0).abs() < 1e-12);
        assert!((out[4].unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn sma_window_one_is_identity() {
        let prices = [3.5, 1.25, 8.0];
        let out = simple_moving_average(&prices, 1).unwrap();
        assert_eq!(out, vec![Some(3.5), Some(1.25), Some(8.0)]);
    }

    #[test]
    fn sma_empty_input_gives_empty_output() {
        assert!(simple_moving_average(&[], 30).unwrap().is_empty());
    }

    #[test]
    fn sma_recovers_after_nan_leaves_window() {
        let prices = [1.0, f64::NAN, 3.0, 4.0, 5.0];
        let out = simple_moving_average(&prices, 2).unwrap();
        assert!(out[1].unwrap().is_nan());
        assert!(out[2].unwrap().is_nan());
        assert!((out[3].unwrap() - 3.5).abs() < 1e-12);
        assert!((out[4].unwrap() - 4.5).abs() < 1e-12);
    }

    #[test]
    fn with_moving_averages_fills_all_columns() {
        use chrono::NaiveDate;
        use common::PriceBar;

        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let bars: Vec<PriceBar> = (0..210)
            .map(|i| PriceBar {
                date: start + chrono::Duration::days(i),
                open: 100.0,
                high: 100.0,
                low: 100.0,
                close: 100.0 + i as f64,
                volume: 10,
            })
            .collect();

        let series = with_moving_averages(PriceSeries::new("TEST", bars)).unwrap();
        assert_eq!(series.sma_30.iter().filter(|v| v.is_some()).count(), 181);
        assert_eq!(series.sma_50.iter().filter(|v| v.is_some()).count(), 161);
        assert_eq!(series.sma_200.iter().filter(|v| v.is_some()).count(), 11);
        // mean of 100..=129
        assert!((series.sma_30[29].unwrap() - 114.5).abs() < 1e-9);
    }
}
