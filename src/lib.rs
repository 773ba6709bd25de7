//! Spotwatch - spot instance price history monitor
//!
//! Each registered policy gets its own poller that backfills the price
//! history once, then polls for newer points every interval and streams
//! them to the subscriber.

pub mod domain;
pub mod infrastructure;
pub mod application;
pub mod shared;

// Re-export main types for convenience
pub use application::{CloseReason, Monitor, PriceStream, Subscription};
pub use domain::policy::{PolicyFilter, PolicyHandle};
pub use domain::price::PricePoint;
pub use shared::config::{FailurePolicy, PollerConfig};
pub use shared::errors::{MonitorError, PollError, PriceClientError};
