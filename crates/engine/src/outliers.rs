use common::PriceBar;

/// Bars whose open, high, low or close sits further than this many standard
/// deviations from the column mean are treated as bad prints.
pub const Z_SCORE_LIMIT: f64 = 6.0;

/// Drop bars with an extreme z-score in any price column.
///
/// Z-scores use the column mean and the sample standard deviation over the
/// whole series. A column with zero or undefined deviation flags nothing.
pub fn remove_outliers(bars: Vec<PriceBar>) -> Vec<PriceBar> {
    if bars.len() < 2 {
        return bars;
    }

    let columns: [fn(&PriceBar) -> f64; 4] = [|b| b.open, |b| b.high, |b| b.low, |b| b.close];
    let stats: Vec<Option<(f64, f64)>> = columns
        .iter()
        .map(|column| mean_and_std(bars.iter().map(column)))
        .collect();

    bars.into_iter()
        .filter(|bar| {
            !columns.iter().zip(&stats).any(|(column, stat)| match stat {
                Some((mean, std)) => ((column(bar) - mean) / std).abs() > Z_SCORE_LIMIT,
                None => false,
            })
        })
        .collect()
}

/// Mean and sample standard deviation, or `None` when the deviation is zero
/// or not finite.
fn mean_and_std(values: impl Iterator<Item = f64> + Clone) -> Option<(f64, f64)> {
    let n = values.clone().count();
    if n < 2 {
        return None;
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    let var = values.map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = var.sqrt();
    (std.is_finite() && std > 0.0).then_some((mean, std))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(n: usize) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        (0..n)
            .map(|i| {
                let p = 100.0 + (i % 5) as f64;
                PriceBar {
                    date: start + chrono::Duration::days(i as i64),
                    open: p,
                    high: p + 1.0,
                    low: p - 1.0,
                    close: p,
                    volume: 1_000,
                }
            })
            .collect()
    }

    #[test]
    fn spike_in_one_column_removes_the_bar() {
        let mut input = bars(100);
        input[40].high = 1_000.0;
        let spike_date = input[40].date;

        let out = remove_outliers(input);
        assert_eq!(out.len(), 99);
        assert!(out.iter().all(|b| b.date != spike_date));
    }

    #[test]
    fn normal_series_is_untouched() {
        let input = bars(250);
        assert_eq!(remove_outliers(input.clone()), input);
    }

    #[test]
    fn flat_series_is_untouched() {
        let mut input = bars(50);
        for b in &mut input {
            b.open = 10.0;
            b.high = 10.0;
            b.low = 10.0;
            b.close = 10.0;
        }
        assert_eq!(remove_outliers(input.clone()).len(), 50);
    }

    #[test]
    fn tiny_series_is_untouched() {
        assert_eq!(remove_outliers(bars(1)).len(), 1);
        assert!(remove_outliers(Vec::new()).is_empty());
    }
}
