use std::{collections::BTreeSet, sync::Arc};

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, decode_header, Validation};
use serde_json::{Map, Value};

use super::{authority_mapper::AuthorityMapper, key_source::KeySource};
use crate::core::error::TokenError;

pub const DEFAULT_CLOCK_SKEW_SECS: u64 = 60;

/// Identity extracted from one validated token. Lives only as long as the
/// request that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject: String,
    pub authorities: BTreeSet<String>,
    pub expiry: DateTime<Utc>,
}

impl TokenClaims {
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, TokenError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(TokenError::MissingToken)?
        .to_str()
        .map_err(|_| TokenError::MalformedHeader)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(TokenError::MalformedHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return Err(TokenError::MalformedHeader);
    }
    Ok(token)
}

pub struct TokenValidator {
    key_source: Arc<dyn KeySource>,
    mapper: AuthorityMapper,
    issuer: Option<String>,
    audience: Vec<String>,
    leeway_secs: u64,
}

impl TokenValidator {
    pub fn new(key_source: Arc<dyn KeySource>, mapper: AuthorityMapper) -> Self {
        Self {
            key_source,
            mapper,
            issuer: None,
            audience: Vec::new(),
            leeway_secs: DEFAULT_CLOCK_SKEW_SECS,
        }
    }

    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer;
        self
    }

    pub fn with_audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }

    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    pub fn mapper(&self) -> &AuthorityMapper {
        &self.mapper
    }

    /// Verifies signature, expiry and the configured issuer/audience, then maps
    /// the claims. Every failure, including an unreachable key source, is a
    /// `TokenError`.
    pub async fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let header = decode_header(token)?;
        if !self.key_source.accepts(header.alg) {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }
        let key = self.key_source.decoding_key(&header).await?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway_secs;
        validation.validate_nbf = true;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        if self.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&self.audience);
        }

        let data = decode::<Map<String, Value>>(token, &key, &validation)?;
        Ok(self.claims_from(&data.claims))
    }

    fn claims_from(&self, claims: &Map<String, Value>) -> TokenClaims {
        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let expiry = claims
            .get("exp")
            .and_then(|exp| exp.as_i64().or_else(|| exp.as_f64().map(|secs| secs as i64)))
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        TokenClaims {
            subject,
            authorities: self.mapper.authorities(claims),
            expiry,
        }
    }
}
