mod client;

pub use client::{parse_chart, parse_quote_summary, YahooClient};
