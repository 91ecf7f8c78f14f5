//! Trusted key sources for bearer token verification.
//!
//! The JWKS source keeps the identity provider's key set as an immutable
//! snapshot behind a read-mostly lock. Validations clone the current `Arc` and
//! keep using an expired snapshot while another task refreshes it; refreshes
//! themselves are serialized so a burst of unknown `kid`s produces one fetch,
//! and a failed fetch is not retried by waiters until the cooldown passes.
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use jsonwebtoken::{
    jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm},
    Algorithm, DecodingKey, Header,
};
use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};

use crate::core::error::TokenError;

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
const JWKS_ALGORITHMS: [Algorithm; 12] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
    Algorithm::HS256,
    Algorithm::HS384,
    Algorithm::HS512,
];
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_JWKS_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

#[async_trait]
pub trait KeySource: Send + Sync {
    /// Whether tokens signed with `alg` may be verified by this source at all.
    fn accepts(&self, alg: Algorithm) -> bool;

    async fn decoding_key(&self, header: &Header) -> Result<DecodingKey, TokenError>;
}

/// Static shared secret for HMAC-signed tokens.
pub struct SharedSecretKeySource {
    key: DecodingKey,
}

impl SharedSecretKeySource {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
        }
    }
}

#[async_trait]
impl KeySource for SharedSecretKeySource {
    fn accepts(&self, alg: Algorithm) -> bool {
        HMAC_ALGORITHMS.contains(&alg)
    }

    async fn decoding_key(&self, _header: &Header) -> Result<DecodingKey, TokenError> {
        Ok(self.key.clone())
    }
}

struct CachedJwks {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Remote JSON Web Key Set with TTL-based caching.
pub struct JwksKeySource {
    client: reqwest::Client,
    jwks_uri: String,
    algorithms: Vec<Algorithm>,
    ttl: Duration,
    refresh_cooldown: Duration,
    snapshot: RwLock<Option<Arc<CachedJwks>>>,
    /// Held while fetching; remembers when the last fetch failed.
    refresh_lock: Mutex<Option<Instant>>,
}

impl JwksKeySource {
    pub fn new(jwks_uri: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            jwks_uri: jwks_uri.into(),
            algorithms: JWKS_ALGORITHMS.to_vec(),
            ttl: DEFAULT_JWKS_TTL,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            snapshot: RwLock::new(None),
            refresh_lock: Mutex::new(None),
        }
    }

    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Minimum age of the cached set before an unknown `kid` may trigger a
    /// refetch, and the minimum wait after a failed fetch.
    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    fn current(&self) -> Option<Arc<CachedJwks>> {
        self.snapshot.read().clone()
    }

    async fn fresh_snapshot(&self) -> Result<Arc<CachedJwks>, TokenError> {
        match self.current() {
            Some(cached) if cached.fetched_at.elapsed() < self.ttl => Ok(cached),
            Some(stale) => match self.refresh_lock.try_lock() {
                Ok(guard) => self.refresh_locked(guard, Some(&stale)).await,
                // Someone else is refreshing; the expired keys still verify.
                Err(_) => Ok(stale),
            },
            None => self.refresh(None).await,
        }
    }

    /// Refetches the key set unless another task already replaced `seen`.
    async fn refresh(&self, seen: Option<&Arc<CachedJwks>>) -> Result<Arc<CachedJwks>, TokenError> {
        let guard = self.refresh_lock.lock().await;
        self.refresh_locked(guard, seen).await
    }

    async fn refresh_locked(
        &self,
        mut last_failure: MutexGuard<'_, Option<Instant>>,
        seen: Option<&Arc<CachedJwks>>,
    ) -> Result<Arc<CachedJwks>, TokenError> {
        if let Some(current) = self.current() {
            let replaced = seen.map_or(true, |seen| !Arc::ptr_eq(seen, &current));
            if replaced && current.fetched_at.elapsed() < self.ttl {
                return Ok(current);
            }
        }

        if let Some(failed_at) = *last_failure {
            if failed_at.elapsed() < self.refresh_cooldown {
                return Err(TokenError::KeySource(format!(
                    "{} failed {:?} ago",
                    self.jwks_uri,
                    failed_at.elapsed()
                )));
            }
        }

        let keys = match self.fetch().await {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!(uri = %self.jwks_uri, error = %err, "signing key refresh failed");
                *last_failure = Some(Instant::now());
                return Err(err);
            }
        };
        tracing::info!(uri = %self.jwks_uri, keys = keys.keys.len(), "refreshed signing keys");

        let cached = Arc::new(CachedJwks {
            keys,
            fetched_at: Instant::now(),
        });
        *self.snapshot.write() = Some(cached.clone());
        *last_failure = None;
        Ok(cached)
    }

    async fn fetch(&self) -> Result<JwkSet, TokenError> {
        Ok(self
            .client
            .get(&self.jwks_uri)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await?)
    }
}

#[async_trait]
impl KeySource for JwksKeySource {
    fn accepts(&self, alg: Algorithm) -> bool {
        self.algorithms.contains(&alg)
    }

    async fn decoding_key(&self, header: &Header) -> Result<DecodingKey, TokenError> {
        let kid = header.kid.as_deref();
        let mut cached = self.fresh_snapshot().await?;

        if select_key(&cached.keys, kid).is_none()
            && cached.fetched_at.elapsed() >= self.refresh_cooldown
        {
            let refreshed = self.refresh(Some(&cached)).await?;
            cached = refreshed;
        }

        let jwk = select_key(&cached.keys, kid)
            .ok_or_else(|| TokenError::KeyNotFound(kid.map(str::to_string)))?;
        if !jwk_matches_algorithm(jwk, header.alg) {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }
        Ok(DecodingKey::from_jwk(jwk)?)
    }
}

fn select_key<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => keys.find(kid),
        None if keys.keys.len() == 1 => keys.keys.first(),
        None => None,
    }
}

/// Both the key type and any `alg` published with the key must agree with the
/// token header.
fn jwk_matches_algorithm(jwk: &Jwk, alg: Algorithm) -> bool {
    let family_matches = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => matches!(
            alg,
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ),
        AlgorithmParameters::EllipticCurve(params) => matches!(
            (&params.curve, alg),
            (EllipticCurve::P256, Algorithm::ES256) | (EllipticCurve::P384, Algorithm::ES384)
        ),
        AlgorithmParameters::OctetKey(_) => HMAC_ALGORITHMS.contains(&alg),
        AlgorithmParameters::OctetKeyPair(_) => alg == Algorithm::EdDSA,
    };

    let published_matches = match &jwk.common.key_algorithm {
        None => true,
        Some(key_alg) => matches!(
            (key_alg, alg),
            (KeyAlgorithm::HS256, Algorithm::HS256)
                | (KeyAlgorithm::HS384, Algorithm::HS384)
                | (KeyAlgorithm::HS512, Algorithm::HS512)
                | (KeyAlgorithm::RS256, Algorithm::RS256)
                | (KeyAlgorithm::RS384, Algorithm::RS384)
                | (KeyAlgorithm::RS512, Algorithm::RS512)
                | (KeyAlgorithm::PS256, Algorithm::PS256)
                | (KeyAlgorithm::PS384, Algorithm::PS384)
                | (KeyAlgorithm::PS512, Algorithm::PS512)
                | (KeyAlgorithm::ES256, Algorithm::ES256)
                | (KeyAlgorithm::ES384, Algorithm::ES384)
                | (KeyAlgorithm::EdDSA, Algorithm::EdDSA)
        ),
    };

    family_matches && published_matches
}
