use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::request_guard::check_path;
use crate::{
    app_module::AppState,
    core::error::GatewayError,
    security::{bearer_token, AccessRequirement},
};

/// Decides whether a request may continue to the router.
///
/// Public paths pass straight through. Everything else needs a valid bearer
/// token, and role-gated paths additionally need the mapped authority. The
/// validated claims ride along in the request extensions for the rest of this
/// request only.
pub async fn authorize(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let path = request.uri().path().to_owned();
    check_path(&path)?;

    let decision = state.access_rules.evaluate(&path);
    let rule = decision.rule.unwrap_or("<default>");
    tracing::Span::current().record("rule", rule);

    let required_authority = match decision.requirement {
        AccessRequirement::Public => {
            tracing::debug!(rule, "public path");
            return Ok(next.run(request).await);
        }
        AccessRequirement::Authenticated => None,
        AccessRequirement::Role(role) => {
            Some(state.token_validator.mapper().authority_for_role(role))
        }
    };

    let token = bearer_token(request.headers())?;
    let claims = state.token_validator.validate(token).await?;

    if let Some(required) = required_authority {
        if !claims.has_authority(&required) {
            return Err(GatewayError::Forbidden { required });
        }
    }

    tracing::debug!(subject = %claims.subject, rule, "request authorized");
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
