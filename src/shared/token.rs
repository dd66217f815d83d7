//! Credentials token generation and `Authorization` header encoding.
//!
//! OCPI 2.2 and later transmit tokens base64-encoded; 2.1.1 sends them as-is.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

/// Prefix used by the `Authorization` header for OCPI calls.
pub const TOKEN_SCHEME: &str = "Token ";

/// Generate a fresh opaque credentials token (64 hex chars).
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn encodes_tokens(version: Option<&str>) -> bool {
    match version {
        Some(v) => !(v.starts_with("2.0") || v.starts_with("2.1")),
        None => false,
    }
}

/// Build the `Authorization` header value for a call made under `version`.
pub fn authorization_header(token: &str, version: Option<&str>) -> String {
    if encodes_tokens(version) {
        format!("{}{}", TOKEN_SCHEME, STANDARD.encode(token))
    } else {
        format!("{}{}", TOKEN_SCHEME, token)
    }
}

/// Extract the token from an `Authorization` header.
///
/// Returns every plausible reading: the raw value and, when it is valid
/// base64 of UTF-8, the decoded value. The caller matches either against
/// its registry since the version is unknown before the platform is.
pub fn parse_authorization(header: &str) -> Option<Vec<String>> {
    let raw = header.strip_prefix(TOKEN_SCHEME)?.trim();
    if raw.is_empty() {
        return None;
    }
    let mut candidates = vec![raw.to_string()];
    if let Ok(bytes) = STANDARD.decode(raw) {
        if let Ok(decoded) = String::from_utf8(bytes) {
            if !decoded.is_empty() && decoded != raw {
                candidates.push(decoded);
            }
        }
    }
    Some(candidates)
}
