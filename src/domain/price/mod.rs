//! Price domain - spot price points, the per-policy cache and dedup

mod price_cache;
mod dedup;

pub use price_cache::{PriceCache, CacheUpdate};
pub use dedup::{select_new_points, DedupOutcome};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::errors::PollError;

/// One observed spot price. Equality is full-field and drives dedup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub availability_zone: String,
    pub instance_type: String,
    pub product_description: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Raw price observation as returned by a price history client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotPriceRecord {
    pub availability_zone: String,
    pub instance_type: String,
    pub product_description: String,
    pub spot_price: String,
    pub timestamp: DateTime<Utc>,
}

impl PricePoint {
    /// Convert a raw record, parsing its price as a 64-bit float.
    /// Non-finite prices are rejected since they never compare equal.
    pub fn from_record(record: SpotPriceRecord) -> Result<Self, PollError> {
        let price = record
            .spot_price
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|price| price.is_finite())
            .ok_or_else(|| PollError::InvalidPrice {
                raw: record.spot_price.clone(),
            })?;

        Ok(Self {
            availability_zone: record.availability_zone,
            instance_type: record.instance_type,
            product_description: record.product_description,
            price,
            timestamp: record.timestamp,
        })
    }
}

/// Convert a batch of raw records, failing on the first bad price
pub fn parse_records(records: Vec<SpotPriceRecord>) -> Result<Vec<PricePoint>, PollError> {
    records.into_iter().map(PricePoint::from_record).collect()
}

/// Sort ascending by timestamp. Stable, so equal timestamps keep provider order.
pub fn sort_by_timestamp(points: &mut [PricePoint]) {
    points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_record_conversion_parses_price() {
        let point = PricePoint::from_record(record(10, "0.0421")).unwrap();
        assert_eq!(point.price, 0.0421);
        assert_eq!(point.timestamp, at(10));
        assert_eq!(point.instance_type, "m5.large");
    }

    #[test]
    fn test_record_conversion_rejects_garbage_price() {
        let err = PricePoint::from_record(record(10, "cheap")).unwrap_err();
        assert_eq!(err, PollError::InvalidPrice { raw: "cheap".to_string() });
    }

    #[test]
    fn test_record_conversion_rejects_nan() {
        assert!(PricePoint::from_record(record(10, "NaN")).is_err());
    }

    #[test]
    fn test_parse_records_stops_on_first_bad_price() {
        let records = vec![record(1, "0.1"), record(2, ""), record(3, "0.3")];
        assert_eq!(
            parse_records(records),
            Err(PollError::InvalidPrice { raw: String::new() })
        );
    }

    #[test]
    fn test_sort_is_stable_for_equal_timestamps() {
        let mut points = vec![point(5, 0.5), point(1, 0.1), point(5, 0.6), point(3, 0.3)];
        sort_by_timestamp(&mut points);
        let prices: Vec<f64> = points.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![0.1, 0.3, 0.5, 0.6]);
    }
}
