use std::sync::Arc;

use crate::{
    app_config::{GatewayConfig, JwtConfig, KeySourceConfig},
    core::error::ConfigError,
    routing::{build_client, Forwarder, RouteTable},
    security::{
        AccessRuleSet, AuthorityMapper, CorsPolicy, JwksKeySource, KeySource,
        SharedSecretKeySource, TokenValidator,
    },
};

/// Everything a request needs, built once at startup and shared read-only.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub access_rules: Arc<AccessRuleSet>,
    pub token_validator: Arc<TokenValidator>,
    pub forwarder: Forwarder,
    pub cors_policy: Arc<CorsPolicy>,
}

impl AppState {
    pub fn new(
        routes: RouteTable,
        access_rules: AccessRuleSet,
        token_validator: TokenValidator,
        forwarder: Forwarder,
        cors_policy: CorsPolicy,
    ) -> Self {
        Self {
            routes: Arc::new(routes),
            access_rules: Arc::new(access_rules),
            token_validator: Arc::new(token_validator),
            forwarder,
            cors_policy: Arc::new(cors_policy),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let routes = RouteTable::new(config.routes.clone())?;
        let access_rules = AccessRuleSet::storefront_defaults()
            .map_err(|err| ConfigError::invalid("access rules", err))?;

        for entry in routes.entries() {
            tracing::info!(
                route = %entry.id,
                pattern = %entry.pattern,
                target = entry.target_base(),
                "route registered"
            );
        }
        tracing::info!(
            routes = routes.entries().len(),
            access_rules = access_rules.rules().len(),
            backend_timeout = ?config.backend_timeout,
            "gateway tables built"
        );

        Ok(Self::new(
            routes,
            access_rules,
            token_validator(&config.jwt),
            Forwarder::new(build_client(), config.backend_timeout),
            CorsPolicy::storefront(config.cors_allowed_origins.clone()),
        ))
    }
}

fn token_validator(jwt: &JwtConfig) -> TokenValidator {
    let key_source: Arc<dyn KeySource> = match &jwt.key_source {
        KeySourceConfig::JwkSetUri(uri) => {
            Arc::new(JwksKeySource::new(uri.as_str()).with_ttl(jwt.jwks_ttl))
        }
        KeySourceConfig::SharedSecret(secret) => {
            Arc::new(SharedSecretKeySource::new(secret.as_bytes()))
        }
    };

    TokenValidator::new(
        key_source,
        AuthorityMapper::new(jwt.authorities_claim.as_str(), jwt.authority_prefix.as_str()),
    )
    .with_issuer(jwt.issuer.clone())
    .with_audience(jwt.audience.clone())
    .with_leeway(jwt.clock_skew_secs)
}
