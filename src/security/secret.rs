//! Token secret strength check.
//!
//! The token secret signs every bearer token in the deployment; running with
//! a short or well-known value makes tokens forgeable. `main` refuses to
//! start in that case (tests bypass via `RANGEHUB_ALLOW_INSECURE_SECRET`).

/// Minimum acceptable secret length in bytes.
pub const MIN_TOKEN_SECRET_LEN: usize = 24;

/// Placeholder fragments that ship in documentation and examples.
const KNOWN_PLACEHOLDERS: &[&str] = &["changeme", "example-secret", "token-secret-here"];

/// Check whether a configured token secret is too weak to run with.
pub fn is_weak_secret(secret: &str) -> bool {
    if secret.len() < MIN_TOKEN_SECRET_LEN {
        return true;
    }
    let lowered = secret.to_ascii_lowercase();
    KNOWN_PLACEHOLDERS.iter().any(|p| lowered.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_placeholder_secrets_are_weak() {
        assert!(is_weak_secret(""));
        assert!(is_weak_secret("short"));
        assert!(is_weak_secret("changeme"));
        assert!(is_weak_secret("PLEASE-CHANGEME-BEFORE-DEPLOYING"));
    }

    #[test]
    fn long_random_secret_is_accepted() {
        assert!(!is_weak_secret("dGhpcyBpcyBhIHJlYWwgc2VjcmV0IHZhbHVl"));
    }
}
