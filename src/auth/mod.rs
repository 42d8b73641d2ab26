mod claims;
pub(crate) mod extractors;
pub mod verifier;

pub use extractors::{require_auth, AuthUser};
pub use verifier::CredentialVerifier;
