use chrono::{Duration, NaiveDate};
use serde::Serialize;

use common::{Period, PriceSeries, TickerInfo};

/// Height share of the price row; volume gets the rest.
const PRICE_ROW_HEIGHT: f64 = 0.85;
/// Headroom added above and below the close range.
const Y_PADDING: f64 = 25.0;
const CLOSE_COLOR: &str = "white";
const CLOSE_FILL: &str = "rgba(0, 100, 80, 0.2)";
const VOLUME_COLOR: &str = "#8C127C";

/// Renderer-agnostic description of the dashboard's price chart.
/// Serialized as JSON for the frontend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub subtitle: Option<String>,
    pub link: String,
    /// Relative heights of the price row and the volume row.
    pub row_heights: [f64; 2],
    pub traces: Vec<Trace>,
    pub x_range: Option<(NaiveDate, NaiveDate)>,
    pub y_range: Option<(f64, f64)>,
    /// Date spans with no sessions, hidden from the x axis.
    pub range_breaks: Vec<RangeBreak>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceKind {
    Line,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    pub name: String,
    pub kind: TraceKind,
    /// 1 = price row, 2 = volume row.
    pub row: u8,
    pub color: String,
    /// Area fill below a line trace.
    pub fill: Option<String>,
    pub x: Vec<NaiveDate>,
    pub y: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeBreak {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Build the chart for one ticker: filled close line, the moving averages
/// that have values, and volume bars underneath.
pub fn render_chart(series: &PriceSeries, ticker: &str, info: &TickerInfo) -> ChartSpec {
    let dates: Vec<NaiveDate> = series.bars.iter().map(|b| b.date).collect();

    let mut traces = Vec::new();
    if !series.is_empty() {
        traces.push(Trace {
            name: ticker.to_string(),
            kind: TraceKind::Line,
            row: 1,
            color: CLOSE_COLOR.to_string(),
            fill: Some(CLOSE_FILL.to_string()),
            x: dates.clone(),
            y: series.bars.iter().map(|b| Some(b.close)).collect(),
        });

        let averages = [
            (30, "magenta", &series.sma_30),
            (50, "green", &series.sma_50),
            (200, "yellow", &series.sma_200),
        ];
        for (window, color, column) in averages {
            if column.iter().any(|v| v.is_some()) {
                traces.push(Trace {
                    name: format!("{window}-day SMA"),
                    kind: TraceKind::Line,
                    row: 1,
                    color: color.to_string(),
                    fill: None,
                    x: dates.clone(),
                    y: column.clone(),
                });
            }
        }

        traces.push(Trace {
            name: "Volume".to_string(),
            kind: TraceKind::Bar,
            row: 2,
            color: VOLUME_COLOR.to_string(),
            fill: None,
            x: dates.clone(),
            y: series.bars.iter().map(|b| Some(b.volume as f64)).collect(),
        });
    }

    ChartSpec {
        title: ticker.to_string(),
        subtitle: info.long_name.clone(),
        link: format!("https://finance.yahoo.com/quote/{ticker}/"),
        row_heights: [PRICE_ROW_HEIGHT, 1.0 - PRICE_ROW_HEIGHT],
        traces,
        x_range: x_range(&dates),
        y_range: y_range(series),
        range_breaks: range_breaks(&dates),
    }
}

/// Period to fetch and number of trailing rows to display for a chart of
/// `period`. The fetch is wider so the 200-day average is defined across
/// the displayed rows.
pub fn chart_window(period: Period) -> (Period, usize) {
    match period {
        Period::ThreeMonths => (Period::TwoYears, 65),
        Period::SixMonths => (Period::TwoYears, 120),
        Period::YearToDate => (Period::TwoYears, 200),
        Period::OneYear => (Period::TwoYears, 250),
        Period::TwoYears => (Period::Max, 500),
        Period::FiveYears => (Period::Max, 1265),
        Period::Max => (Period::Max, 20_000),
    }
}

/// First and last date padded by a twentieth of the span, at least one day.
fn x_range(dates: &[NaiveDate]) -> Option<(NaiveDate, NaiveDate)> {
    let (first, last) = (*dates.first()?, *dates.last()?);
    let mut pad = (last - first).num_days() / 20;
    if pad <= 2 {
        pad = 1;
    }
    let pad = Duration::days(pad);
    Some((first - pad, last + pad))
}

fn y_range(series: &PriceSeries) -> Option<(f64, f64)> {
    let closes = series.bars.iter().map(|b| b.close).filter(|c| c.is_finite());
    let (min, max) = closes.fold(None, |acc: Option<(f64, f64)>, c| match acc {
        Some((lo, hi)) => Some((lo.min(c), hi.max(c))),
        None => Some((c, c)),
    })?;
    Some((min - Y_PADDING, max + Y_PADDING))
}

/// One break per gap of more than a day, from the day after the earlier
/// session up to the later session.
fn range_breaks(dates: &[NaiveDate]) -> Vec<RangeBreak> {
    dates
        .windows(2)
        .filter(|w| (w[1] - w[0]).num_days() > 1)
        .map(|w| RangeBreak {
            start: w[0] + Duration::days(1),
            end: w[1],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PriceBar;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn series(dates: &[NaiveDate], closes: &[f64]) -> PriceSeries {
        let bars = dates
            .iter()
            .zip(closes)
            .map(|(&date, &close)| PriceBar {
                date,
                open: close,
                high: close,
                low: close,
                close,
                volume: 500,
            })
            .collect();
        PriceSeries::new("AAPL", bars)
    }

    #[test]
    fn weekend_gap_becomes_a_range_break() {
        // Thu, Fri, Mon, Tue
        let dates = [d(2024, 6, 6), d(2024, 6, 7), d(2024, 6, 10), d(2024, 6, 11)];
        let s = series(&dates, &[1.0, 2.0, 3.0, 4.0]);
        let chart = render_chart(&s, "AAPL", &TickerInfo::default());
        assert_eq!(
            chart.range_breaks,
            vec![RangeBreak { start: d(2024, 6, 8), end: d(2024, 6, 10) }]
        );
    }

    #[test]
    fn ranges_are_padded() {
        let dates: Vec<NaiveDate> = (0..100).map(|i| d(2024, 1, 1) + Duration::days(i)).collect();
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + i as f64).collect();
        let chart = render_chart(&series(&dates, &closes), "AAPL", &TickerInfo::default());

        // 99-day span / 20 = 4 days of padding
        assert_eq!(chart.x_range, Some((d(2023, 12, 28), d(2024, 4, 13))));
        assert_eq!(chart.y_range, Some((75.0, 224.0)));
    }

    #[test]
    fn short_span_pads_one_day() {
        let dates = [d(2024, 3, 1), d(2024, 3, 4)];
        let chart = render_chart(&series(&dates, &[5.0, 6.0]), "X", &TickerInfo::default());
        assert_eq!(chart.x_range, Some((d(2024, 2, 29), d(2024, 3, 5))));
    }

    #[test]
    fn only_computed_averages_are_drawn() {
        let dates = [d(2024, 3, 1), d(2024, 3, 4)];
        let mut s = series(&dates, &[5.0, 6.0]);
        s.sma_30 = vec![None, Some(5.5)];
        let info = TickerInfo {
            long_name: Some("Apple Inc.".into()),
            ..TickerInfo::default()
        };
        let chart = render_chart(&s, "AAPL", &info);

        let names: Vec<&str> = chart.traces.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["AAPL", "30-day SMA", "Volume"]);
        assert_eq!(chart.traces[2].kind, TraceKind::Bar);
        assert_eq!(chart.traces[2].row, 2);
        assert_eq!(chart.subtitle.as_deref(), Some("Apple Inc."));
        assert_eq!(chart.link, "https://finance.yahoo.com/quote/AAPL/");
    }

    #[test]
    fn empty_series_renders_empty_chart() {
        let empty = PriceSeries::new("AAPL", Vec::new());
        let chart = render_chart(&empty, "AAPL", &TickerInfo::default());
        assert!(chart.traces.is_empty());
        assert_eq!(chart.x_range, None);
        assert_eq!(chart.y_range, None);
        assert!(chart.range_breaks.is_empty());
    }

    #[test]
    fn chart_json_shape() {
        let dates = [d(2024, 3, 1)];
        let chart = render_chart(&series(&dates, &[5.0]), "AAPL", &TickerInfo::default());
        let json = serde_json::to_value(&chart).unwrap();
        assert_eq!(json["traces"][0]["kind"], "line");
        assert_eq!(json["traces"][0]["x"][0], "2024-03-01");
    }

    #[test]
    fn chart_fetches_wider_than_it_shows() {
        assert_eq!(chart_window(Period::OneYear), (Period::TwoYears, 250));
        assert_eq!(chart_window(Period::FiveYears), (Period::Max, 1265));
    }
}
