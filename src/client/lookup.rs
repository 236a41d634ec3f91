use std::collections::HashMap;

use thiserror::Error;

use crate::config::sources::EndpointConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("lookup: unknown endpoint '{0}'")]
    UnknownEndpoint(String),
    #[error("lookup: no endpoint exposes value '{source_value}' of source '{source_name}'")]
    NoMatchingEndpointValue {
        source_name: String,
        source_value: String,
    },
}

type SourceValue = (String, String);

/// Read-only indexes over the endpoint definitions.
#[derive(Debug, Default)]
pub struct EndpointLookup {
    /// endpoint -> source -> source values, in definition order
    sources: HashMap<String, HashMap<String, Vec<String>>>,
    /// endpoint -> (source, source value) -> exposed name
    renames: HashMap<String, HashMap<SourceValue, String>>,
    /// (source, source value) -> exposed name, the last endpoint defining it wins
    global_renames: HashMap<SourceValue, String>,
}

impl EndpointLookup {
    pub fn new(endpoints: &[EndpointConfig]) -> Self {
        let mut lookup = Self::default();

        for endpoint in endpoints {
            let sources = lookup.sources.entry(endpoint.name.clone()).or_default();
            let renames = lookup.renames.entry(endpoint.name.clone()).or_default();

            for value in &endpoint.values {
                sources
                    .entry(value.source.clone())
                    .or_default()
                    .push(value.source_value.clone());

                let key = (value.source.clone(), value.source_value.clone());
                renames.insert(key.clone(), value.name.clone());
                lookup.global_renames.insert(key, value.name.clone());
            }
        }

        lookup
    }

    /// Source name to the source values the endpoint needs from it.
    pub fn sources_for(&self, endpoint: &str) -> Result<&HashMap<String, Vec<String>>, LookupError> {
        self.sources
            .get(endpoint)
            .ok_or_else(|| LookupError::UnknownEndpoint(endpoint.to_owned()))
    }

    /// Exposed name of a source value across all endpoints.
    pub fn rename_of(&self, source: &str, source_value: &str) -> Result<&str, LookupError> {
        self.global_renames
            .get(&(source.to_owned(), source_value.to_owned()))
            .map(String::as_str)
            .ok_or_else(|| no_match(source, source_value))
    }

    /// Exposed name of a source value within one endpoint.
    pub fn endpoint_rename_of(
        &self,
        endpoint: &str,
        source: &str,
        source_value: &str,
    ) -> Result<&str, LookupError> {
        let renames = self
            .renames
            .get(endpoint)
            .ok_or_else(|| LookupError::UnknownEndpoint(endpoint.to_owned()))?;
        renames
            .get(&(source.to_owned(), source_value.to_owned()))
            .map(String::as_str)
            .ok_or_else(|| no_match(source, source_value))
    }
}

fn no_match(source: &str, source_value: &str) -> LookupError {
    LookupError::NoMatchingEndpointValue {
        source_name: source.to_owned(),
        source_value: source_value.to_owned(),
    }
}
