//! Upstream provider abstraction and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - The Yahoo Finance provider
//!
//! Providers only fetch. The service layer owns caching and resilience, so a
//! provider can be swapped for a scripted one in tests.

mod traits;

pub mod yahoo;

pub use traits::MarketDataProvider;
