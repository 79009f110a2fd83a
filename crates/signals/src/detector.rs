//! Crossover detection on the last two bars of an indicator-augmented series.

use common::{IndicatorRow, PriceSeries, SignalKind};

#[derive(Debug, Clone, Copy)]
enum Line {
    Close,
    Sma30,
    Sma50,
    Sma200,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Above,
    Below,
}

struct Rule {
    kind: SignalKind,
    line: Line,
    reference: Line,
    direction: Direction,
}

/// Evaluated top to bottom; the first rule that matches names the signal.
const RULES: [Rule; 6] = [
    Rule {
        kind: SignalKind::Sma30CrossAbove50,
        line: Line::Sma30,
        reference: Line::Sma50,
        direction: Direction::Above,
    },
    Rule {
        kind: SignalKind::Sma30CrossBelow50,
        line: Line::Sma30,
        reference: Line::Sma50,
        direction: Direction::Below,
    },
    Rule {
        kind: SignalKind::Sma30CrossBelow200,
        line: Line::Sma30,
        reference: Line::Sma200,
        direction: Direction::Below,
    },
    Rule {
        kind: SignalKind::Sma30CrossAbove200,
        line: Line::Sma30,
        reference: Line::Sma200,
        direction: Direction::Above,
    },
    Rule {
        kind: SignalKind::CloseCrossBelow200,
        line: Line::Close,
        reference: Line::Sma200,
        direction: Direction::Below,
    },
    Rule {
        kind: SignalKind::CloseCrossAbove200,
        line: Line::Close,
        reference: Line::Sma200,
        direction: Direction::Above,
    },
];

/// One bar with every value the rules read present and finite.
#[derive(Debug, Clone, Copy)]
struct Snapshot {
    close: f64,
    sma_30: f64,
    sma_50: f64,
    sma_200: f64,
}

impl Snapshot {
    fn from_row(row: IndicatorRow) -> Option<Self> {
        let snapshot = Snapshot {
            close: row.close,
            sma_30: row.sma_30?,
            sma_50: row.sma_50?,
            sma_200: row.sma_200?,
        };
        let all_finite = [
            snapshot.close,
            snapshot.sma_30,
            snapshot.sma_50,
            snapshot.sma_200,
        ]
        .iter()
        .all(|v| v.is_finite());
        all_finite.then_some(snapshot)
    }

    fn get(&self, line: Line) -> f64 {
        match line {
            Line::Close => self.close,
            Line::Sma30 => self.sma_30,
            Line::Sma50 => self.sma_50,
            Line::Sma200 => self.sma_200,
        }
    }
}

impl Rule {
    /// Strict on both days: equality today or yesterday is not a cross.
    fn fires(&self, today: &Snapshot, yesterday: &Snapshot) -> bool {
        let (t_line, t_ref) = (today.get(self.line), today.get(self.reference));
        let (y_line, y_ref) = (yesterday.get(self.line), yesterday.get(self.reference));
        match self.direction {
            Direction::Above => t_line > t_ref && y_line < y_ref,
            Direction::Below => t_line < t_ref && y_line > y_ref,
        }
    }
}

/// Decide whether a crossover happened on the latest bar.
///
/// Returns `None` when nothing crossed, and also when the series has fewer
/// than two bars or the last two bars are missing an indicator value.
pub fn detect(series: &PriceSeries) -> Option<SignalKind> {
    let n = series.len();
    if n < 2 {
        return None;
    }

    let today = Snapshot::from_row(series.row(n - 1)?)?;
    let yesterday = Snapshot::from_row(series.row(n - 2)?)?;

    RULES
        .iter()
        .find(|rule| rule.fires(&today, &yesterday))
        .map(|rule| rule.kind)
}
