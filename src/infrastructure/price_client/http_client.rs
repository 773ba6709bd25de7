//! HTTP/JSON price history client

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{ApiCredentials, CredentialsProvider, PriceClientFactory, PriceHistoryClient, PriceHistoryQuery};
use crate::domain::price::SpotPriceRecord;
use crate::shared::errors::PriceClientError;

/// Upper bound on pages followed for one query
const MAX_PAGES: usize = 100;

/// One page of the price history response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PriceHistoryPage {
    #[serde(default)]
    spot_price_history: Vec<SpotPriceEntry>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpotPriceEntry {
    availability_zone: String,
    instance_type: String,
    product_description: String,
    spot_price: String,
    timestamp: DateTime<Utc>,
}

impl From<SpotPriceEntry> for SpotPriceRecord {
    fn from(entry: SpotPriceEntry) -> Self {
        Self {
            availability_zone: entry.availability_zone,
            instance_type: entry.instance_type,
            product_description: entry.product_description,
            spot_price: entry.spot_price,
            timestamp: entry.timestamp,
        }
    }
}

/// Region-scoped client for a `/spot-price-history` endpoint
pub struct HttpPriceClient {
    http_client: Client,
    base_url: String,
    region: String,
    credentials: ApiCredentials,
}

impl HttpPriceClient {
    pub fn new(
        http_client: Client,
        base_url: impl Into<String>,
        region: impl Into<String>,
        credentials: ApiCredentials,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            region: region.into(),
            credentials,
        }
    }

    async fn fetch_page(
        &self,
        query: &PriceHistoryQuery,
        next_token: Option<&str>,
    ) -> Result<PriceHistoryPage, PriceClientError> {
        let url = format!("{}/spot-price-history", self.base_url);
        let params = query_params(query, next_token);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.credentials.api_key)
            .query(&params)
            .send()
            .await?;

        if let Some(err) = classify_status(response.status()) {
            return Err(err);
        }

        let body = response.text().await?;
        decode_page(&body)
    }
}

#[async_trait]
impl PriceHistoryClient for HttpPriceClient {
    async fn fetch_history(
        &self,
        query: &PriceHistoryQuery,
    ) -> Result<Vec<SpotPriceRecord>, PriceClientError> {
        let client = self;
        let records = collect_pages(move |next_token| async move {
            client.fetch_page(query, next_token.as_deref()).await
        })
        .await?;

        debug!(region = %self.region, records = records.len(), "price history fetched");
        Ok(records)
    }
}

/// Follow `NextToken` until a page comes back without one
async fn collect_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<SpotPriceRecord>, PriceClientError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<PriceHistoryPage, PriceClientError>>,
{
    let mut records = Vec::new();
    let mut next_token: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let page = fetch_page(next_token.take()).await?;
        records.extend(page.spot_price_history.into_iter().map(SpotPriceRecord::from));

        match page.next_token.filter(|token| !token.is_empty()) {
            Some(token) => next_token = Some(token),
            None => return Ok(records),
        }
    }

    Err(PriceClientError::MalformedResponse(format!(
        "pagination did not terminate after {} pages",
        MAX_PAGES
    )))
}

/// Builds [`HttpPriceClient`]s that share one endpoint and credentials source
pub struct HttpClientFactory {
    base_url: String,
    request_timeout: Duration,
    credentials: Arc<dyn CredentialsProvider>,
}

impl HttpClientFactory {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout,
            credentials,
        }
    }
}

impl PriceClientFactory for HttpClientFactory {
    fn build(&self, region: &str) -> Result<Arc<dyn PriceHistoryClient>, PriceClientError> {
        let credentials = self.credentials.credentials()?;
        let http_client = Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| PriceClientError::Transport(e.to_string()))?;

        Ok(Arc::new(HttpPriceClient::new(
            http_client,
            self.base_url.clone(),
            region,
            credentials,
        )))
    }
}

fn query_params(query: &PriceHistoryQuery, next_token: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![("Region", query.region.clone())];
    if let Some(zone) = &query.availability_zone {
        params.push(("AvailabilityZone", zone.clone()));
    }
    if let Some(instance_type) = &query.instance_type {
        params.push(("InstanceType", instance_type.clone()));
    }
    if let Some(description) = &query.product_description {
        params.push(("ProductDescription", description.clone()));
    }
    if let Some(start_time) = query.start_time {
        params.push(("StartTime", start_time.to_rfc3339_opts(SecondsFormat::Millis, true)));
    }
    if let Some(token) = next_token {
        params.push(("NextToken", token.to_string()));
    }
    params
}

fn classify_status(status: StatusCode) -> Option<PriceClientError> {
    if status.is_success() {
        None
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Some(PriceClientError::Auth(format!("price service returned {}", status)))
    } else {
        Some(PriceClientError::Transport(format!("price service returned {}", status)))
    }
}

fn decode_page(body: &str) -> Result<PriceHistoryPage, PriceClientError> {
    Ok(serde_json::from_str(body)?)
}
