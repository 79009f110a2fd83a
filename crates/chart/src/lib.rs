pub mod info;
pub mod render;

pub use info::info_table;
pub use render::{chart_window, render_chart, ChartSpec, RangeBreak, Trace, TraceKind};
