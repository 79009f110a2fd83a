use chrono::NaiveDate;

use common::{round_to, TickerInfo};

const MISSING: &str = "N/A";

/// Label/value rows for the dashboard's reference table, in display order.
pub fn info_table(info: &TickerInfo) -> Vec<(String, String)> {
    let rows = [
        ("Previous close", num(info.previous_close)),
        ("Open", num(info.open)),
        ("Bid", quote_side(info.bid, info.bid_size)),
        ("Ask", quote_side(info.ask, info.ask_size)),
        ("Market cap", market_cap(info)),
        ("Beta (5Y monthly)", num(info.beta)),
        ("Earnings date", earnings(&info.earnings_dates)),
        ("Forward dividend & yield", dividend(info)),
        ("Ex-dividend date", info.ex_dividend_date.map(date).unwrap_or_else(|| MISSING.into())),
        ("1y target est", num(info.target_mean_price)),
    ];
    rows.into_iter()
        .map(|(label, value)| (label.to_string(), value))
        .collect()
}

fn num(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| MISSING.into())
}

fn quote_side(price: Option<f64>, size: Option<u64>) -> String {
    match price {
        Some(price) => format!(
            "{price} x {}",
            size.map(|s| s.to_string()).unwrap_or_else(|| MISSING.into())
        ),
        None => MISSING.into(),
    }
}

fn market_cap(info: &TickerInfo) -> String {
    match (info.market_cap, info.currency.as_deref()) {
        (Some(cap), Some(currency)) => format!("{cap}, {currency}"),
        (Some(cap), None) => cap.to_string(),
        (None, _) => MISSING.into(),
    }
}

fn earnings(dates: &[NaiveDate]) -> String {
    if dates.is_empty() {
        return "-".into();
    }
    dates.iter().map(|d| date(*d)).collect::<Vec<_>>().join(" - ")
}

fn dividend(info: &TickerInfo) -> String {
    match (info.dividend_rate, info.dividend_yield) {
        (Some(rate), Some(yld)) => format!("{rate} ({} %)", round_to(yld * 100.0, 2)),
        (Some(rate), None) => format!("{rate} ({MISSING})"),
        _ => MISSING.into(),
    }
}

fn date(d: NaiveDate) -> String {
    d.format("%b %d, %Y").to_string()
}
