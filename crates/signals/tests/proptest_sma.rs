use proptest::prelude::*;
use signals::simple_moving_average;

proptest! {
    /// Output length always matches input length.
    #[test]
    fn sma_preserves_length(
        prices in prop::collection::vec(0.01f64..10_000.0f64, 0..400),
        window in 1usize..250,
    ) {
        let out = simple_moving_average(&prices, window).unwrap();
        prop_assert_eq!(out.len(), prices.len());
    }

    /// A series shorter than the window never yields a value.
    #[test]
    fn sma_all_absent_when_series_shorter_than_window(
        window in 2usize..250,
        seed in prop::collection::vec(0.01f64..10_000.0f64, 250),
        len_frac in 0.0f64..1.0f64,
    ) {
        let len = ((window - 1) as f64 * len_frac) as usize;
        let prices = &seed[..len];
        let out = simple_moving_average(prices, window).unwrap();
        prop_assert!(out.iter().all(|v| v.is_none()));
    }

    /// Every defined value matches the directly computed window mean.
    #[test]
    fn sma_matches_naive_mean(
        prices in prop::collection::vec(0.01f64..10_000.0f64, 1..300),
        window in 1usize..60,
    ) {
        let out = simple_moving_average(&prices, window).unwrap();
        for (i, value) in out.iter().enumerate() {
            if i + 1 < window {
                prop_assert!(value.is_none());
            } else {
                let naive: f64 = prices[i + 1 - window..=i].iter().sum::<f64>() / window as f64;
                let got = value.unwrap();
                prop_assert!((got - naive).abs() <= 1e-6 * naive.abs().max(1.0),
                    "index {}: got {}, expected {}", i, got, naive);
            }
        }
    }
}
