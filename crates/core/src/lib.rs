//! Core engine for instasearch.
//!
//! This crate provides:
//! - The search prefetch service and its live entry store
//! - The durable URL-to-URL alias cache with JSON prefs persistence
//! - Eligibility and serving decision types
//! - Unified error types and configuration structures

pub mod alias;
pub mod config;
pub mod coordinator;
pub mod eligibility;
pub mod engine;
pub mod entry;
pub mod error;
pub mod fetcher;
pub mod prefs;
pub mod service;
pub mod serving;
pub mod settings;
pub mod store;
pub mod urls;

pub use alias::{AliasCache, PersistedAliasMap};
pub use config::{ConfigError, PrefetchConfig};
pub use coordinator::Candidate;
pub use eligibility::PrefetchIneligibility;
pub use engine::{SearchEngine, SearchTerms};
pub use entry::{PrefetchEntry, PrefetchStatus};
pub use error::Error;
pub use fetcher::{FetchError, FetchOutcome, FetchedResponse, Fetcher};
pub use prefs::PrefsFile;
pub use service::SearchPrefetchService;
pub use serving::{CacheFlags, NavigationTransition, NotServed, ResponseHandle, ServeRequest};
pub use settings::ProfileSettings;
pub use store::{PrefetchStore, StoreError};
