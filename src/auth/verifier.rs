use std::collections::HashSet;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use thiserror::Error;
use tracing::debug;

use super::claims::Claims;
use crate::config::JwtConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Invalid access token")]
    InvalidToken,
    #[error("Invalid user_id in token")]
    InvalidSubject,
}

/// Checks HMAC (HS256/384/512) signatures with the shared secret and extracts the subject.
///
/// Minting lives in the account service; this side only verifies.
#[derive(Clone)]
pub struct CredentialVerifier {
    decoding: DecodingKey,
    validation: Validation,
}

impl CredentialVerifier {
    pub fn new(cfg: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // `exp` is still enforced whenever the token carries one.
        validation.required_spec_claims = HashSet::new();
        validation.validate_aud = false;
        validation.leeway = cfg.leeway_secs;
        Self {
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<i64, VerifyError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            VerifyError::InvalidToken
        })?;
        let user_id = data.claims.subject().ok_or(VerifyError::InvalidSubject)?;
        debug!(user_id, "jwt verified");
        Ok(user_id)
    }
}

/// Signs a token the way the account service does. Test-only.
#[cfg(test)]
pub(crate) fn sign_for_tests(secret: &str, payload: serde_json::Value) -> String {
    sign_with(Algorithm::HS256, secret, payload)
}

#[cfg(test)]
fn sign_with(alg: Algorithm, secret: &str, payload: serde_json::Value) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    encode(
        &Header::new(alg),
        &payload,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("sign test token")
}
