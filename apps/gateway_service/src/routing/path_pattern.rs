//! Segment-based glob patterns shared by the route table and the access rules.
//!
//! `*` matches exactly one non-empty segment, `**` matches any number of
//! trailing segments (including none) and may only appear last. A single
//! trailing slash on the request path is ignored.
use std::{fmt, str::FromStr};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Single,
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern must start with '/': {0:?}")]
    MissingLeadingSlash(String),

    #[error("pattern contains an empty segment: {0:?}")]
    EmptySegment(String),

    #[error("'**' is only allowed as the last segment: {0:?}")]
    MisplacedRest(String),

    #[error("wildcards must cover a whole segment: {0:?}")]
    PartialWildcard(String),
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let body = raw
            .strip_prefix('/')
            .ok_or_else(|| PatternError::MissingLeadingSlash(raw.to_string()))?;

        let mut segments = Vec::new();
        if !body.is_empty() {
            let parts: Vec<&str> = body.split('/').collect();
            let last = parts.len() - 1;
            for (index, part) in parts.into_iter().enumerate() {
                let segment = match part {
                    "" => return Err(PatternError::EmptySegment(raw.to_string())),
                    "**" if index != last => {
                        return Err(PatternError::MisplacedRest(raw.to_string()))
                    }
                    "**" => Segment::Rest,
                    "*" => Segment::Single,
                    other if other.contains('*') => {
                        return Err(PatternError::PartialWildcard(raw.to_string()))
                    }
                    other => Segment::Literal(other.to_string()),
                };
                segments.push(segment);
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let Some(body) = path.strip_prefix('/') else {
            return false;
        };
        let body = body.strip_suffix('/').unwrap_or(body);
        let mut parts = body.split('/').filter(|_| !body.is_empty());

        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Single => match parts.next() {
                    Some(part) if !part.is_empty() => {}
                    _ => return false,
                },
                Segment::Literal(literal) => match parts.next() {
                    Some(part) if part == literal => {}
                    _ => return false,
                },
            }
        }

        parts.next().is_none()
    }

    /// Length of the path text fixed before the first wildcard; higher means
    /// more specific.
    pub fn literal_prefix_len(&self) -> usize {
        self.segments
            .iter()
            .map_while(|segment| match segment {
                Segment::Literal(literal) => Some(literal.len() + 1),
                Segment::Single | Segment::Rest => None,
            })
            .sum()
    }
}

impl FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
