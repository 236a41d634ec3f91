//! # Scrape API Library
//!
//! Composes JSON endpoints out of values scraped from remote HTML pages.
//!
//! Modules:
//! - `config`: service configuration, loading and validation
//! - `fetch`: document retrieval with retries and body decoding
//! - `content`: HTML documents, XPath selection, typed extraction
//! - `cache`: time-to-live value cell
//! - `source`: one configured page and its extraction rules
//! - `client`: endpoint lookup and aggregation over sources
//! - `server`: axum front-end with API keys and metrics

pub mod cache;
pub mod client;
pub mod config;
pub mod content;
pub mod fetch;
pub mod observability;
pub mod resilience;
pub mod server;
pub mod source;
pub mod utils;

#[cfg(test)]
pub mod tests;

pub use crate::client::{ApiClient, ClientError};
pub use crate::config::sources::*;
pub use crate::content::{HtmlDocument, Value, ValueType};
