use std::collections::HashSet;

use axum::http::{uri::InvalidUri, Uri};

use super::path_pattern::PathPattern;
use crate::core::error::ConfigError;

/// Route as it appears in configuration, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDefinition {
    pub id: String,
    pub path_pattern: String,
    pub target_base_uri: String,
}

impl RouteDefinition {
    pub fn new(
        id: impl Into<String>,
        path_pattern: impl Into<String>,
        target_base_uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            path_pattern: path_pattern.into(),
            target_base_uri: target_base_uri.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub id: String,
    pub pattern: PathPattern,
    target_base: String,
}

impl RouteEntry {
    pub fn target_base(&self) -> &str {
        &self.target_base
    }

    /// Destination for a request: the base address followed by the original
    /// path and query.
    pub fn target_uri(&self, path_and_query: &str) -> Result<Uri, InvalidUri> {
        format!("{}{}", self.target_base, path_and_query).parse()
    }
}

/// Immutable table of backend routes.
///
/// Resolution picks the matching entry with the longest literal prefix; among
/// equally specific entries the one declared first wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new(definitions: Vec<RouteDefinition>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(definitions.len());

        for definition in definitions {
            if definition.id.trim().is_empty() {
                return Err(ConfigError::invalid("route id", "must not be empty"));
            }
            if !seen.insert(definition.id.clone()) {
                return Err(ConfigError::invalid(
                    format!("route {}", definition.id),
                    "duplicate route id",
                ));
            }

            let pattern = PathPattern::parse(&definition.path_pattern)
                .map_err(|err| ConfigError::invalid(format!("route {}", definition.id), err))?;
            let target_base = normalize_base_uri(&definition.target_base_uri)
                .map_err(|reason| ConfigError::invalid(format!("route {}", definition.id), reason))?;

            entries.push(RouteEntry {
                id: definition.id,
                pattern,
                target_base,
            });
        }

        Ok(Self { entries })
    }

    pub fn resolve(&self, path: &str) -> Option<&RouteEntry> {
        let mut best: Option<&RouteEntry> = None;
        for entry in self.entries.iter().filter(|entry| entry.pattern.matches(path)) {
            match best {
                Some(current)
                    if current.pattern.literal_prefix_len()
                        >= entry.pattern.literal_prefix_len() => {}
                _ => best = Some(entry),
            }
        }
        best
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }
}

fn normalize_base_uri(raw: &str) -> Result<String, String> {
    let uri: Uri = raw
        .trim()
        .parse()
        .map_err(|err: InvalidUri| format!("invalid target uri {raw:?}: {err}"))?;

    // Backends sit on the internal network; the forwarder speaks plain HTTP/1.1.
    if uri.scheme_str() != Some("http") {
        return Err(format!("target uri {raw:?} must use http"));
    }
    if uri.authority().is_none() {
        return Err(format!("target uri {raw:?} has no host"));
    }
    if uri.query().is_some() {
        return Err(format!("target uri {raw:?} must not carry a query"));
    }

    Ok(raw.trim().trim_end_matches('/').to_string())
}
