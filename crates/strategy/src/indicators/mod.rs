pub mod sma;

pub use sma::{latest_mean, rolling_mean};
