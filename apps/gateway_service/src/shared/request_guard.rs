use crate::core::error::GatewayError;

/// Hex codes of `.`, `/` and `\`.
const BLOCKED_CODES: [&str; 3] = ["2e", "2f", "5c"];

/// Rejects request paths a backend could normalize into a different path than
/// the one the access rules were evaluated against.
///
/// `path` is the raw, still percent-encoded path of the request URI.
pub fn check_path(path: &str) -> Result<(), GatewayError> {
    if !path.starts_with('/') {
        return Err(GatewayError::validation("Request path must be absolute"));
    }
    if path.contains('\\') || path.contains(';') {
        return Err(GatewayError::validation("Request path contains a forbidden character"));
    }

    let lowered = path.to_ascii_lowercase();
    let encoded_blocked = lowered
        .match_indices('%')
        .any(|(at, _)| decodes_to_blocked(&lowered[at + 1..]));
    if encoded_blocked {
        return Err(GatewayError::validation("Request path contains a forbidden encoding"));
    }

    // A single trailing slash is fine; empty segments elsewhere are not.
    let body = path.strip_suffix('/').unwrap_or(path);
    for segment in body.split('/').skip(1) {
        match segment {
            "" => {
                return Err(GatewayError::validation("Request path contains an empty segment"))
            }
            "." | ".." => {
                return Err(GatewayError::validation("Request path contains a dot segment"))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Whether the text after a `%` encodes a blocked character, directly or
/// through further layers of `%25`.
fn decodes_to_blocked(rest: &str) -> bool {
    if BLOCKED_CODES.iter().any(|code| rest.starts_with(code)) {
        return true;
    }
    match rest.strip_prefix("25") {
        Some(inner) => decodes_to_blocked(inner),
        None => false,
    }
}
