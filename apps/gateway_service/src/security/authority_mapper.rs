use std::collections::BTreeSet;

use serde_json::{Map, Value};

pub const DEFAULT_AUTHORITIES_CLAIM: &str = "scope";
pub const DEFAULT_AUTHORITY_PREFIX: &str = "ROLE_";

/// Turns the authorities claim of a verified token into prefixed labels.
///
/// The claim may be a space-delimited string (`"ADMIN USER"`) or an array of
/// strings; any other shape yields no authorities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityMapper {
    claim: String,
    prefix: String,
}

impl Default for AuthorityMapper {
    fn default() -> Self {
        Self::new(DEFAULT_AUTHORITIES_CLAIM, DEFAULT_AUTHORITY_PREFIX)
    }
}

impl AuthorityMapper {
    pub fn new(claim: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
            prefix: prefix.into(),
        }
    }

    pub fn authorities(&self, claims: &Map<String, Value>) -> BTreeSet<String> {
        let raw: Vec<&str> = match claims.get(&self.claim) {
            Some(Value::String(scopes)) => scopes.split_whitespace().collect(),
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };

        raw.into_iter()
            .map(str::trim)
            .filter(|scope| !scope.is_empty())
            .map(|scope| format!("{}{}", self.prefix, scope))
            .collect()
    }

    pub fn authority_for_role(&self, role: &str) -> String {
        format!("{}{}", self.prefix, role)
    }
}
