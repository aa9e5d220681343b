//! Quote sources for the price landing collector.
//!
//! [`models`] holds the records the providers produce; [`providers`] holds the
//! provider traits, the Yahoo chart and CoinGecko implementations and the
//! rate-limit retry policy.

pub mod models;
pub mod providers;
