//! Canonical request payloads and Ed25519 site signatures.
//!
//! A site proves its identity to the hub by signing the canonical encoding
//! of `(site_id, path, body)` with its private key; the hub recomputes the
//! same encoding and verifies against the site's registered public key.
//! Signer and verifier must agree on the canonical bytes exactly, so the
//! encoding rules here are the single source of truth for both sides.

use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::digest;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};

use crate::error::KeyError;
use crate::identity::SiteId;

/// Ed25519 public keys are 32 bytes.
const PUBLIC_KEY_LEN: usize = 32;

/// A request body as seen by the canonicalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body. Canonicalizes identically to an explicit empty JSON object,
    /// so `POST` with no payload and `POST {}` sign the same bytes.
    Empty,
    /// A JSON body. `serde_json::Value` objects are BTreeMap-backed, so the
    /// compact encoding has canonical key order by construction.
    Json(serde_json::Value),
    /// A body with no deterministic serialization (binary, multipart).
    /// Canonicalized as a SHA-256 digest of the exact bytes: distinct bodies
    /// yield distinct signed content, while signer and verifier still agree
    /// byte-for-byte.
    Raw(Vec<u8>),
}

/// Deterministically encode `(site_id, path, body)` for signing.
///
/// Layout: `<site_id> "\n" <path> "\n" <body-repr>`. The site id is the one
/// the signer claims (and the verifier reads from the `site-id` header), so
/// replaying a signature under a different site id changes the canonical
/// bytes and fails verification.
pub fn canonicalize(site_id: SiteId, path: &str, body: &RequestBody) -> Vec<u8> {
    let repr = match body {
        RequestBody::Empty => "{}".to_string(),
        RequestBody::Json(value) => value.to_string(),
        RequestBody::Raw(bytes) => {
            let d = digest::digest(&digest::SHA256, bytes);
            let mut s = String::with_capacity(7 + d.as_ref().len() * 2);
            s.push_str("sha256:");
            for byte in d.as_ref() {
                let _ = write!(s, "{byte:02x}");
            }
            s
        }
    };
    format!("{site_id}\n{path}\n{repr}").into_bytes()
}

/// A site's signing keypair, held by the local site daemon.
///
/// Key material is supplied externally (raw seed or PKCS#8 document) and is
/// read-only to this crate.
pub struct SiteKeyPair {
    keypair: Ed25519KeyPair,
}

impl SiteKeyPair {
    /// Load a keypair from a raw 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, KeyError> {
        let keypair = Ed25519KeyPair::from_seed_unchecked(seed).map_err(|_| KeyError)?;
        Ok(Self { keypair })
    }

    /// Load a keypair from a PKCS#8 v2 document.
    pub fn from_pkcs8(document: &[u8]) -> Result<Self, KeyError> {
        let keypair = Ed25519KeyPair::from_pkcs8(document).map_err(|_| KeyError)?;
        Ok(Self { keypair })
    }

    /// Generate a fresh keypair.
    ///
    /// Provisioning is out of scope for the hub; this exists for site-side
    /// tooling and tests.
    pub fn generate() -> Result<Self, KeyError> {
        let rng = SystemRandom::new();
        let document = Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| KeyError)?;
        Self::from_pkcs8(document.as_ref())
    }

    /// The verification half of this keypair.
    pub fn public_key(&self) -> SitePublicKey {
        SitePublicKey(self.keypair.public_key().as_ref().to_vec())
    }

    /// Sign a canonical payload. Ed25519 is deterministic: the same payload
    /// and key produce the same signature in every process.
    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.keypair.sign(payload).as_ref().to_vec()
    }
}

impl std::fmt::Debug for SiteKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteKeyPair").finish_non_exhaustive()
    }
}

/// A site's registered Ed25519 verification key.
#[derive(Clone, PartialEq, Eq)]
pub struct SitePublicKey(Vec<u8>);

impl SitePublicKey {
    /// Wrap raw key bytes, checking the length.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, KeyError> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(KeyError);
        }
        Ok(Self(bytes))
    }

    /// Decode a standard-base64 key, as carried in site registration data.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let bytes = STANDARD.decode(encoded).map_err(|_| KeyError)?;
        Self::from_bytes(bytes)
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encode as standard base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Verify a signature over a canonical payload.
    ///
    /// Returns `false` on any mismatch, including malformed signature bytes;
    /// never panics and never reveals why verification failed.
    pub fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        UnparsedPublicKey::new(&ED25519, &self.0)
            .verify(payload, signature)
            .is_ok()
    }
}

impl std::fmt::Debug for SitePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SitePublicKey")
            .field("base64", &self.to_base64())
            .finish()
    }
}
