// src/lib.rs
//! Scraper for the housing-condition report API: territory summaries, the
//! paged house listing, and optional per-house detail enrichment, written
//! out as flat tables.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod core;
pub mod error;

pub mod csv;
pub mod dataset;
pub mod enrich;
pub mod fetch;
pub mod file;
pub mod filter;
pub mod logging;
pub mod normalize;
pub mod progress;
pub mod runner;
pub mod session;
pub mod store;

pub use config::{AppOptions, EnrichScope, PagePolicy};
pub use dataset::{Cell, Dataset, Missingness, Record};
pub use enrich::{CancelToken, DetailEnricher, DetailSource, EnrichReport};
pub use error::{Error, Result};
pub use fetch::PaginatedFetcher;
pub use normalize::Normalizer;
pub use session::{SessionClient, with_session};
