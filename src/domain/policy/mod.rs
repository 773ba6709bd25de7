//! Policy domain - subscription filters and their identity

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::errors::MonitorError;

/// Opaque identity of a registered policy.
///
/// Two policies with identical filters get distinct handles and are
/// tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolicyHandle(Uuid);

impl PolicyHandle {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PolicyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which price observations to track. Region is required, the rest are
/// optional server-side filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFilter {
    pub region: String,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub product_description: Option<String>,
}

impl PolicyFilter {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    pub fn with_availability_zone(mut self, zone: impl Into<String>) -> Self {
        self.availability_zone = Some(zone.into());
        self
    }

    pub fn with_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = Some(instance_type.into());
        self
    }

    pub fn with_product_description(mut self, description: impl Into<String>) -> Self {
        self.product_description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.region.trim().is_empty() {
            return Err(MonitorError::MissingRegion);
        }
        Ok(())
    }
}

impl fmt::Display for PolicyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.region,
            self.availability_zone.as_deref().unwrap_or("*"),
            self.instance_type.as_deref().unwrap_or("*"),
            self.product_description.as_deref().unwrap_or("*"),
        )
    }
}

/// A registered subscription: immutable filter plus identity
#[derive(Debug, Clone)]
pub struct Policy {
    handle: PolicyHandle,
    filter: PolicyFilter,
}

impl Policy {
    pub(crate) fn new(filter: PolicyFilter) -> Self {
        Self {
            handle: PolicyHandle::new(),
            filter,
        }
    }

    pub fn handle(&self) -> PolicyHandle {
        self.handle
    }

    pub fn filter(&self) -> &PolicyFilter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_region_is_rejected() {
        assert_eq!(PolicyFilter::default().validate(), Err(MonitorError::MissingRegion));
        assert_eq!(PolicyFilter::new("  ").validate(), Err(MonitorError::MissingRegion));
    }

    #[test]
    fn test_region_only_filter_is_valid() {
        assert!(PolicyFilter::new("us-west-2").validate().is_ok());
    }

    #[test]
    fn test_identical_filters_get_distinct_handles() {
        let filter = PolicyFilter::new("eu-west-1").with_instance_type("c5.xlarge");
        let a = Policy::new(filter.clone());
        let b = Policy::new(filter);
        assert_eq!(a.filter(), b.filter());
        assert_ne!(a.handle(), b.handle());
    }

    #[test]
    fn test_filter_display_marks_wildcards() {
        let filter = PolicyFilter::new("us-east-1").with_product_description("Linux/UNIX");
        assert_eq!(filter.to_string(), "us-east-1/*/*/Linux/UNIX");
    }
}
