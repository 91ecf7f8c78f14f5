use std::{sync::Arc, time::Duration};

use axum::http::{request::Parts, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Cross-origin policy shared by every response the gateway produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    pub allowed_origin_patterns: Vec<String>,
    pub allowed_methods: Vec<Method>,
    pub allow_credentials: bool,
    pub max_age: Duration,
}

impl CorsPolicy {
    pub fn storefront(allowed_origin_patterns: Vec<String>) -> Self {
        Self {
            allowed_origin_patterns,
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allow_credentials: true,
            max_age: DEFAULT_MAX_AGE,
        }
    }

    pub fn allows_origin(&self, origin: &str) -> bool {
        self.allowed_origin_patterns
            .iter()
            .any(|pattern| wildcard_match(pattern, origin))
    }

    /// Builds the tower-http layer. The origin is always echoed back rather
    /// than answered with `*`, and requested headers are mirrored, since
    /// browsers reject wildcards alongside credentials.
    pub fn layer(&self) -> CorsLayer {
        let policy = Arc::new(self.clone());
        let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| {
            origin
                .to_str()
                .map(|origin| policy.allows_origin(origin))
                .unwrap_or(false)
        });

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(self.allowed_methods.clone())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(self.allow_credentials)
            .max_age(self.max_age)
    }
}

/// `*` matches any run of characters, including none.
fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return false;
    };
    let Some(mut rest) = candidate.strip_prefix(first) else {
        return false;
    };

    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };

    for piece in middle {
        match rest.find(piece) {
            Some(at) => rest = &rest[at + piece.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matching() {
        assert!(wildcard_match("*", "https://shop.example.com"));
        assert!(wildcard_match("https://*.example.com", "https://shop.example.com"));
        assert!(!wildcard_match("https://*.example.com", "https://example.com"));
        assert!(!wildcard_match("https://*.example.com", "https://shop.example.com.evil.io"));
        assert!(wildcard_match("http://localhost:*", "http://localhost:5173"));
        assert!(wildcard_match("https://shop.example.com", "https://shop.example.com"));
        assert!(!wildcard_match("https://shop.example.com", "https://shop.example.co"));
        assert!(wildcard_match("https://*-*.example.com", "https://eu-west.example.com"));
    }

    #[test]
    fn storefront_policy_shape() {
        let policy = CorsPolicy::storefront(vec!["*".to_string()]);
        assert!(policy.allow_credentials);
        assert_eq!(policy.max_age, Duration::from_secs(3600));
        assert_eq!(policy.allowed_methods.len(), 5);
        assert!(policy.allows_origin("http://anything.local"));
    }

    #[test]
    fn origin_must_match_one_pattern() {
        let policy = CorsPolicy::storefront(vec![
            "https://shop.example.com".to_string(),
            "http://localhost:*".to_string(),
        ]);
        assert!(policy.allows_origin("https://shop.example.com"));
        assert!(policy.allows_origin("http://localhost:3000"));
        assert!(!policy.allows_origin("https://evil.example.net"));
    }

    #[test]
    fn empty_pattern_list_allows_nothing() {
        let policy = CorsPolicy::storefront(Vec::new());
        assert!(!policy.allows_origin("https://shop.example.com"));
    }
}
