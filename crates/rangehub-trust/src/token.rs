//! Bearer token issue and verification.
//!
//! Tokens are opaque signed blobs embedding only the identity id and an
//! absolute expiry; they deliberately carry no role information, because
//! capabilities are re-derived from live relationship data on every request.
//!
//! Wire format: `base64url(payload) "." base64url(tag)` where
//! `payload = "v1:<identity-id>:<expiry-unix>"` and the tag is an
//! HMAC-SHA256 over the payload bytes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use ring::hmac;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::AuthError;
use crate::identity::IdentityId;

/// Fixed token lifetime. Not configurable: expiry policy is uniform across
/// the deployment and enforced by the verifier, not the holder.
pub const TOKEN_LIFETIME_DAYS: i64 = 30;

/// Payload version prefix; bump when the payload layout changes.
const PAYLOAD_VERSION: &str = "v1";

/// Signing secret for bearer tokens, wiped from memory on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TokenSecret(Vec<u8>);

impl TokenSecret {
    /// Wrap raw secret bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSecret").finish_non_exhaustive()
    }
}

/// Issues and verifies bearer tokens.
///
/// Stateless and safely shareable across any number of concurrent callers.
pub struct TokenAuthenticator {
    key: hmac::Key,
}

impl TokenAuthenticator {
    /// Build an authenticator from the deployment's token secret.
    pub fn new(secret: &TokenSecret) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
        }
    }

    /// Issue a token for an identity, expiring [`TOKEN_LIFETIME_DAYS`] from now.
    pub fn issue(&self, identity_id: IdentityId) -> String {
        self.issue_at(identity_id, Utc::now())
    }

    /// Issue a token with an explicit issue instant.
    ///
    /// Exposed for clock-controlled tests; production callers use [`issue`](Self::issue).
    pub fn issue_at(&self, identity_id: IdentityId, now: DateTime<Utc>) -> String {
        let expiry = now + Duration::days(TOKEN_LIFETIME_DAYS);
        let payload = format!("{PAYLOAD_VERSION}:{identity_id}:{}", expiry.timestamp());
        let tag = hmac::sign(&self.key, payload.as_bytes());
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(tag.as_ref()),
        )
    }

    /// Verify a token and return its subject identity id.
    pub fn verify(&self, token: &str) -> Result<IdentityId, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token against an explicit instant.
    ///
    /// Exposed for clock-controlled tests; production callers use [`verify`](Self::verify).
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<IdentityId, AuthError> {
        let (payload_b64, tag_b64) = token.split_once('.').ok_or(AuthError::Invalid)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::Invalid)?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|_| AuthError::Invalid)?;

        let expected = hmac::sign(&self.key, &payload);
        if expected.as_ref().ct_eq(&tag).unwrap_u8() != 1 {
            return Err(AuthError::Invalid);
        }

        // Tag is authentic from here on; structural failures still mean a
        // token we never issued.
        let payload = String::from_utf8(payload).map_err(|_| AuthError::Invalid)?;
        let mut parts = payload.splitn(3, ':');
        if parts.next() != Some(PAYLOAD_VERSION) {
            return Err(AuthError::Invalid);
        }
        let identity_id: IdentityId = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or(AuthError::Invalid)?;
        let expiry: i64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or(AuthError::Invalid)?;

        if now.timestamp() >= expiry {
            return Err(AuthError::Expired);
        }
        Ok(identity_id)
    }
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn authenticator() -> TokenAuthenticator {
        TokenAuthenticator::new(&TokenSecret::new(*b"correct horse battery staple 32b"))
    }

    #[test]
    fn verify_returns_subject_immediately() {
        let auth = authenticator();
        let token = auth.issue(42);
        assert_eq!(auth.verify(&token), Ok(42));
    }

    #[test]
    fn valid_just_before_lifetime_expired_just_after() {
        let auth = authenticator();
        let issued = Utc::now();
        let token = auth.issue_at(42, issued);

        let almost = issued + Duration::days(29) + Duration::hours(23);
        assert_eq!(auth.verify_at(&token, almost), Ok(42));

        let past = issued + Duration::days(30) + Duration::minutes(1);
        assert_eq!(auth.verify_at(&token, past), Err(AuthError::Expired));
    }

    #[test]
    fn garbage_is_invalid_not_expired() {
        let auth = authenticator();
        assert_eq!(auth.verify("not-a-token"), Err(AuthError::Invalid));
        assert_eq!(auth.verify(""), Err(AuthError::Invalid));
        assert_eq!(auth.verify("a.b.c"), Err(AuthError::Invalid));
    }

    #[test]
    fn tampered_payload_fails_the_tag() {
        let auth = authenticator();
        let token = auth.issue(42);
        let (payload, tag) = token.split_once('.').unwrap();
        // Re-encode a different subject under the original tag.
        let forged_payload = URL_SAFE_NO_PAD.encode(b"v1:43:9999999999");
        let forged = format!("{forged_payload}.{tag}");
        assert_ne!(payload, forged_payload);
        assert_eq!(auth.verify(&forged), Err(AuthError::Invalid));
    }

    #[test]
    fn token_from_a_different_secret_is_rejected() {
        let other = TokenAuthenticator::new(&TokenSecret::new(*b"another equally long secret 32by"));
        let token = other.issue(42);
        assert_eq!(authenticator().verify(&token), Err(AuthError::Invalid));
    }

    proptest! {
        #[test]
        fn roundtrip_for_any_subject(id in 1i64..i64::MAX) {
            let auth = authenticator();
            prop_assert_eq!(auth.verify(&auth.issue(id)), Ok(id));
        }

        #[test]
        fn arbitrary_strings_never_verify(s in "\\PC*") {
            let auth = authenticator();
            prop_assert!(auth.verify(&s).is_err());
        }
    }
}
