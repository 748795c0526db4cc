pub mod hours;
pub mod runner;
pub mod yahoo;

pub use hours::{is_market_open, is_market_open_at};
pub use runner::{AlertRunner, CheckOptions, CheckSummary};
pub use yahoo::YahooClient;
