use super::*;

impl From<reqwest::Error> for TokenError {
    fn from(err: reqwest::Error) -> Self {
        TokenError::KeySource(err.to_string())
    }
}

impl From<axum::http::uri::InvalidUri> for GatewayError {
    fn from(_: axum::http::uri::InvalidUri) -> Self {
        GatewayError::validation("Invalid request target")
    }
}
