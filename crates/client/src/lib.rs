//! Network client for instasearch.
//!
//! This crate provides the HTTP implementation of the core `Fetcher`
//! trait, with timeouts, a response size cap, and in-flight throttling.

pub mod fetch;

pub use fetch::{HttpFetcher, HttpFetcherConfig};
