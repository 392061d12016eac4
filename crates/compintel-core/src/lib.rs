//! Core types and trait definitions for the competitor intelligence tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends, the ingestion pipeline and the API all depend on it.

pub mod competitor;
pub mod derive;
pub mod digest;
pub mod error;
pub mod feed_item;
pub mod insight;
pub mod kpi;
pub mod schedule;
pub mod store;

pub use error::{Error, Result};
