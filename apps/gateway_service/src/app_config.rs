use std::{env, fmt, net::SocketAddr, str::FromStr, time::Duration};

use crate::{
    core::error::ConfigError,
    routing::RouteDefinition,
    security::{
        authority_mapper::{DEFAULT_AUTHORITIES_CLAIM, DEFAULT_AUTHORITY_PREFIX},
        key_source::DEFAULT_JWKS_TTL,
        token_validator::DEFAULT_CLOCK_SKEW_SECS,
    },
};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ALLOWED_ORIGINS: &str = "*";

/// (route id, base uri variable, path pattern variable)
const ROUTE_VARIABLES: [(&str, &str, &str); 3] = [
    ("auth", "AUTH_SERVICE_URL", "AUTH_ROUTE"),
    ("products", "PRODUCT_SERVICE_URL", "PRODUCTS_ROUTE"),
    ("purchases", "PURCHASE_SERVICE_URL", "PURCHASES_ROUTE"),
];

#[derive(Clone, PartialEq, Eq)]
pub enum KeySourceConfig {
    JwkSetUri(String),
    SharedSecret(String),
}

impl fmt::Debug for KeySourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySourceConfig::JwkSetUri(uri) => f.debug_tuple("JwkSetUri").field(uri).finish(),
            KeySourceConfig::SharedSecret(_) => f.write_str("SharedSecret(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtConfig {
    pub key_source: KeySourceConfig,
    pub issuer: Option<String>,
    pub audience: Vec<String>,
    pub clock_skew_secs: u64,
    pub jwks_ttl: Duration,
    pub authorities_claim: String,
    pub authority_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub routes: Vec<RouteDefinition>,
    pub backend_timeout: Duration,
    pub jwt: JwtConfig,
    pub cors_allowed_origins: Vec<String>,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads every setting through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Settings { lookup };

        let routes = ROUTE_VARIABLES
            .iter()
            .map(|(id, uri_key, pattern_key)| {
                Ok(RouteDefinition::new(
                    *id,
                    settings.required(pattern_key)?,
                    settings.required(uri_key)?,
                ))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let backend_timeout_secs =
            settings.parse_or("GATEWAY_BACKEND_TIMEOUT_SECS", DEFAULT_BACKEND_TIMEOUT_SECS)?;
        if backend_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "GATEWAY_BACKEND_TIMEOUT_SECS",
                "must be greater than zero",
            ));
        }

        let default_bind = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT));

        Ok(Self {
            bind_addr: settings.parse_or("GATEWAY_BIND", default_bind)?,
            routes,
            backend_timeout: Duration::from_secs(backend_timeout_secs),
            jwt: JwtConfig::from_settings(&settings)?,
            cors_allowed_origins: split_list(
                &settings
                    .optional("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string()),
            ),
        })
    }
}

impl JwtConfig {
    fn from_settings<F>(settings: &Settings<F>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key_source = match (
            settings.optional("JWT_JWK_SET_URI"),
            settings.optional("JWT_HMAC_SECRET"),
        ) {
            (Some(uri), None) => KeySourceConfig::JwkSetUri(uri),
            (None, Some(secret)) => KeySourceConfig::SharedSecret(secret),
            (Some(_), Some(_)) => {
                return Err(ConfigError::invalid(
                    "JWT_JWK_SET_URI",
                    "set either JWT_JWK_SET_URI or JWT_HMAC_SECRET, not both",
                ))
            }
            (None, None) => {
                return Err(ConfigError::Missing(
                    "JWT_JWK_SET_URI or JWT_HMAC_SECRET".to_string(),
                ))
            }
        };

        Ok(Self {
            key_source,
            issuer: settings.optional("JWT_ISSUER"),
            audience: settings
                .optional("JWT_AUDIENCE")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            clock_skew_secs: settings.parse_or("JWT_CLOCK_SKEW_SECS", DEFAULT_CLOCK_SKEW_SECS)?,
            jwks_ttl: Duration::from_secs(
                settings.parse_or("JWT_JWKS_TTL_SECS", DEFAULT_JWKS_TTL.as_secs())?,
            ),
            authorities_claim: settings
                .optional("JWT_AUTHORITIES_CLAIM")
                .unwrap_or_else(|| DEFAULT_AUTHORITIES_CLAIM.to_string()),
            // An explicitly empty prefix is allowed, so read it raw.
            authority_prefix: settings
                .raw("JWT_AUTHORITY_PREFIX")
                .map(|prefix| prefix.trim().to_string())
                .unwrap_or_else(|| DEFAULT_AUTHORITY_PREFIX.to_string()),
        })
    }
}

struct Settings<F> {
    lookup: F,
}

impl<F> Settings<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn optional(&self, key: &str) -> Option<String> {
        self.raw(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(key) {
            Some(value) => value.parse().map_err(|err| ConfigError::invalid(key, err)),
            None => Ok(default),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("AUTH_SERVICE_URL", "http://auth-svc:8081"),
            ("PRODUCT_SERVICE_URL", "http://product-svc:8082"),
            ("PURCHASE_SERVICE_URL", "http://purchase-svc:8083"),
            ("AUTH_ROUTE", "/api/auth/**"),
            ("PRODUCTS_ROUTE", "/api/products/**"),
            ("PURCHASES_ROUTE", "/api/purchases/**"),
            ("JWT_HMAC_SECRET", "test-secret"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<GatewayConfig, ConfigError> {
        GatewayConfig::from_lookup(|key| vars.get(key).map(|value| value.to_string()))
    }

    #[test]
    fn minimal_environment_uses_defaults() {
        let config = load(&base()).expect("config");
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.backend_timeout, Duration::from_secs(30));
        assert_eq!(config.cors_allowed_origins, vec!["*"]);
        assert_eq!(config.jwt.clock_skew_secs, 60);
        assert_eq!(config.jwt.jwks_ttl, Duration::from_secs(300));
        assert_eq!(config.jwt.authorities_claim, "scope");
        assert_eq!(config.jwt.authority_prefix, "ROLE_");
        assert_eq!(
            config.jwt.key_source,
            KeySourceConfig::SharedSecret("test-secret".to_string())
        );

        let ids: Vec<&str> = config.routes.iter().map(|route| route.id.as_str()).collect();
        assert_eq!(ids, vec!["auth", "products", "purchases"]);
        assert_eq!(config.routes[1].target_base_uri, "http://product-svc:8082");
        assert_eq!(config.routes[1].path_pattern, "/api/products/**");
    }

    #[test]
    fn missing_backend_is_fatal() {
        let mut vars = base();
        vars.remove("PRODUCT_SERVICE_URL");
        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing("PRODUCT_SERVICE_URL".to_string())
        );

        let mut vars = base();
        vars.insert("PURCHASES_ROUTE", "   ");
        assert_eq!(
            load(&vars).unwrap_err(),
            ConfigError::Missing("PURCHASES_ROUTE".to_string())
        );
    }

    #[test]
    fn exactly_one_key_source_is_required() {
        let mut vars = base();
        vars.remove("JWT_HMAC_SECRET");
        assert!(matches!(load(&vars), Err(ConfigError::Missing(_))));

        vars.insert("JWT_JWK_SET_URI", "http://idp/.well-known/jwks.json");
        let config = load(&vars).expect("jwks config");
        assert!(matches!(config.jwt.key_source, KeySourceConfig::JwkSetUri(_)));

        vars.insert("JWT_HMAC_SECRET", "secret");
        assert!(matches!(load(&vars), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn malformed_numbers_are_fatal() {
        for (key, value) in [
            ("GATEWAY_BACKEND_TIMEOUT_SECS", "soon"),
            ("GATEWAY_BACKEND_TIMEOUT_SECS", "0"),
            ("GATEWAY_BIND", "localhost"),
            ("JWT_CLOCK_SKEW_SECS", "-1"),
        ] {
            let mut vars = base();
            vars.insert(key, value);
            assert!(
                matches!(load(&vars), Err(ConfigError::Invalid { key: ref k, .. }) if k == key),
                "{key}={value}"
            );
        }
    }

    #[test]
    fn lists_and_optional_claims_are_parsed() {
        let mut vars = base();
        vars.insert("CORS_ALLOWED_ORIGINS", "https://shop.example.com, http://localhost:*,");
        vars.insert("JWT_AUDIENCE", "storefront,admin-console");
        vars.insert("JWT_ISSUER", "https://idp.example.com");
        vars.insert("JWT_AUTHORITY_PREFIX", "");

        let config = load(&vars).expect("config");
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://shop.example.com", "http://localhost:*"]
        );
        assert_eq!(config.jwt.audience, vec!["storefront", "admin-console"]);
        assert_eq!(config.jwt.issuer.as_deref(), Some("https://idp.example.com"));
        assert_eq!(config.jwt.authority_prefix, "");
    }

    #[test]
    fn shared_secret_is_not_printed() {
        let printed = format!("{:?}", KeySourceConfig::SharedSecret("hunter2".to_string()));
        assert!(!printed.contains("hunter2"));
    }
}
