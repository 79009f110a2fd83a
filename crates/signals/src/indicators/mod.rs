pub mod sma;

pub use sma::{simple_moving_average, with_moving_averages, SMA_FAST, SMA_MID, SMA_SLOW};
