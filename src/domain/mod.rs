//! Domain layer - price points, caches and policies

pub mod price;
pub mod policy;
