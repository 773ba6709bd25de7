//! Price history client adapter - the boundary to the upstream price service

pub mod credentials;
pub mod http_client;

pub use credentials::{ApiCredentials, CredentialsProvider, EnvCredentials, StaticCredentials};
pub use http_client::{HttpClientFactory, HttpPriceClient};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::policy::PolicyFilter;
use crate::domain::price::SpotPriceRecord;
use crate::shared::errors::PriceClientError;

/// One "describe price history" request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceHistoryQuery {
    pub region: String,
    pub availability_zone: Option<String>,
    pub instance_type: Option<String>,
    pub product_description: Option<String>,
    /// Inclusive lower bound, `None` for the full available history
    pub start_time: Option<DateTime<Utc>>,
}

impl PriceHistoryQuery {
    pub fn from_filter(filter: &PolicyFilter) -> Self {
        Self {
            region: filter.region.clone(),
            availability_zone: filter.availability_zone.clone(),
            instance_type: filter.instance_type.clone(),
            product_description: filter.product_description.clone(),
            start_time: None,
        }
    }

    pub fn starting_at(mut self, start_time: Option<DateTime<Utc>>) -> Self {
        self.start_time = start_time;
        self
    }
}

/// Queries spot price history. Results may come back in any order.
#[async_trait]
pub trait PriceHistoryClient: Send + Sync {
    async fn fetch_history(
        &self,
        query: &PriceHistoryQuery,
    ) -> Result<Vec<SpotPriceRecord>, PriceClientError>;
}

/// Builds a region-scoped client from shared credentials.
/// Callers must not invoke `build` concurrently.
pub trait PriceClientFactory: Send + Sync {
    fn build(&self, region: &str) -> Result<Arc<dyn PriceHistoryClient>, PriceClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_carries_every_filter() {
        let filter = PolicyFilter::new("ap-south-1")
            .with_availability_zone("ap-south-1b")
            .with_instance_type("r5.large")
            .with_product_description("Windows");
        let query = PriceHistoryQuery::from_filter(&filter);

        assert_eq!(query.region, "ap-south-1");
        assert_eq!(query.availability_zone.as_deref(), Some("ap-south-1b"));
        assert_eq!(query.instance_type.as_deref(), Some("r5.large"));
        assert_eq!(query.product_description.as_deref(), Some("Windows"));
        assert_eq!(query.start_time, None);
    }
}
