pub mod config;
pub mod lifecycle;
pub mod outliers;
pub mod screener;
pub mod yahoo;

pub use config::{EngineConfig, ScreenFileConfig};
pub use lifecycle::{ScreenCommand, ScreenerHandle, Scheduler};
pub use screener::{percent_change, Screener, ScreenerConfig};
pub use yahoo::YahooClient;
