//! Application layer - the monitor, its pollers and their streams

pub mod monitor;
pub mod stream;
mod poller;

pub use monitor::{Monitor, Subscription};
pub use stream::{CloseReason, PriceStream, StreamItem};
