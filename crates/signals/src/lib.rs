pub mod detector;
pub mod indicators;

pub use detector::detect;
pub use indicators::{simple_moving_average, with_moving_averages, SMA_FAST, SMA_MID, SMA_SLOW};
