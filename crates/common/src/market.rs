use async_trait::async_trait;

use crate::{HistoryRequest, PriceSeries, Result};

/// Abstraction over the market data provider.
///
/// `YahooClient` implements this against the live chart API.
/// `ReplayMarketData` implements this from in-memory or CSV data.
///
/// `Ok(None)` means the provider has nothing for the ticker. Callers that only
/// care about "data or no data" collapse `Err` into the same path.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch the closing-price history for a ticker, oldest first.
    async fn history(&self, request: &HistoryRequest) -> Result<Option<PriceSeries>>;

    /// Get the last traded price for a ticker.
    async fn last_price(&self, ticker: &str) -> Result<Option<f64>>;
}
