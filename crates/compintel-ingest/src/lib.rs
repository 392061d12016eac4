//! Ingestion for the competitor intelligence tracker.
//!
//! Fetches each competitor's feed, scrapes the linked pages, annotates every
//! entry through a pluggable [`Classifier`], commits unseen entries through an
//! [`compintel_core::store::IntelStore`] and derives insights from the result.
//! Failures of the network-facing stages are contained per entry or per
//! competitor; only storage failures abort a run.

pub mod classify;
pub mod derive;
pub mod error;
pub mod pipeline;
pub mod scrape;
pub mod source;

pub use classify::{Classifier, ClassifierBackend, KeywordClassifier, OllamaClassifier};
pub use error::{Error, Result};
pub use pipeline::{BatchReport, Ingestor, Pipeline, PipelineConfig, RunReport, spawn_poller};
pub use scrape::{HttpScraper, PageScraper};
pub use source::{FeedSource, HttpFeedSource};

/// `User-Agent` sent with every outbound request.
pub const USER_AGENT: &str = concat!("compintel/", env!("CARGO_PKG_VERSION"));
