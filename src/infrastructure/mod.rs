//! Infrastructure layer - upstream price service adapters

pub mod price_client;

pub use price_client::{PriceClientFactory, PriceHistoryClient, PriceHistoryQuery};
