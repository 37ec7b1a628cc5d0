//! Delivery sinks for finished digests.
//!
//! # Submodules
//!
//! - [`discord`]: formats a [`DeliveryBatch`](crate::models::DeliveryBatch) as a
//!   Discord webhook message and posts it with rate-limit aware retries

pub mod discord;
