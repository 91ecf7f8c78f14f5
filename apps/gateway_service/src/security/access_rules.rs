use std::fmt;

use crate::routing::{PathPattern, PatternError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRequirement {
    Public,
    Authenticated,
    /// Role name without the authority prefix, e.g. `ADMIN`.
    Role(String),
}

impl fmt::Display for AccessRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessRequirement::Public => f.write_str("public"),
            AccessRequirement::Authenticated => f.write_str("authenticated"),
            AccessRequirement::Role(role) => write!(f, "role:{role}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccessRule {
    pub pattern: PathPattern,
    pub requirement: AccessRequirement,
}

impl AccessRule {
    pub fn new(pattern: &str, requirement: AccessRequirement) -> Result<Self, PatternError> {
        Ok(Self {
            pattern: PathPattern::parse(pattern)?,
            requirement,
        })
    }
}

/// Result of evaluating the rule set for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision<'a> {
    pub requirement: &'a AccessRequirement,
    /// Pattern of the rule that decided, `None` when the fallback applied.
    pub rule: Option<&'a str>,
}

static FALLBACK: AccessRequirement = AccessRequirement::Authenticated;

/// Ordered access rules; the first matching rule decides and unmatched paths
/// require authentication.
#[derive(Debug, Clone)]
pub struct AccessRuleSet {
    rules: Vec<AccessRule>,
}

impl AccessRuleSet {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    pub fn storefront_defaults() -> Result<Self, PatternError> {
        use AccessRequirement::*;

        let table = [
            ("/api/products/**", Public),
            ("/api/cart/**", Public),
            ("/actuator/health", Public),
            ("/api/auth/**", Public),
            ("/api/purchases/**", Authenticated),
            ("/api/orders/**", Authenticated),
            ("/api/profile/**", Authenticated),
            ("/api/admin/**", Role("ADMIN".to_string())),
        ];

        let rules = table
            .into_iter()
            .map(|(pattern, requirement)| AccessRule::new(pattern, requirement))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    pub fn evaluate(&self, path: &str) -> AccessDecision<'_> {
        match self.rules.iter().find(|rule| rule.pattern.matches(path)) {
            Some(rule) => AccessDecision {
                requirement: &rule.requirement,
                rule: Some(rule.pattern.as_str()),
            },
            None => AccessDecision {
                requirement: &FALLBACK,
                rule: None,
            },
        }
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }
}
