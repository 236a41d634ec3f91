//! Endpoint resolution and concurrent aggregation over sources.

pub mod client;
pub mod lookup;

pub use client::{ApiClient, ClientError};
pub use lookup::{EndpointLookup, LookupError};
