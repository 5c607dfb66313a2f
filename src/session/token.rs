//! Reading claims out of the session token.
//!
//! The token is only decoded, never verified: the backend checks signatures
//! on every request. Decoding exists to pick the UI role.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;

use crate::models::Role;

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    role: Option<String>,
}

/// Extract the role claim, falling back to the unprivileged role when the
/// token is malformed or carries no role.
pub fn decode_role(token: &str) -> Role {
    match decode_claims(token) {
        Some(Claims { role: Some(role) }) => Role::from_claim(&role),
        Some(_) => Role::User,
        None => {
            tracing::warn!("Session token could not be decoded; using default role");
            Role::User
        }
    }
}

fn decode_claims(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
pub(crate) fn encode_test_token(payload: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload);
    format!("{}.{}.signature", header, body)
}
