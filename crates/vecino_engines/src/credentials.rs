#![forbid(unsafe_code)]

use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD};
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use vecino_kernel_contracts::merchant::SessionToken;
use vecino_kernel_contracts::ContractViolation;

const HASH_SCHEME: &str = "pbkdf2_sha256";
const SALT_LEN: usize = 22;
const KEY_LEN: usize = 32;
const SESSION_TOKEN_BYTES: usize = 32;
const MAX_ITERATIONS: u32 = 10_000_000;
const DUMMY_PASSWORD: &str = "vecino-unknown-account";
const DUMMY_SALT: &str = "vecinoDummySaltValue00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialConfig {
    pub iterations: u32,
}

impl CredentialConfig {
    pub fn mvp_v1() -> Self {
        Self { iterations: 60_000 }
    }
}

fn derive_key(password: &str, salt: &str, iterations: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    key
}

/// PBKDF2-HMAC-SHA256 encoded as `pbkdf2_sha256$<iterations>$<salt>$<key b64>`,
/// the layout Django stores. The salt must not contain `$`.
pub fn hash_password_with_salt(password: &str, salt: &str, iterations: u32) -> String {
    let iterations = iterations.clamp(1, MAX_ITERATIONS);
    let key = derive_key(password, salt, iterations);
    format!("{HASH_SCHEME}${iterations}${salt}${}", BASE64.encode(key))
}

pub fn hash_password(password: &str, config: CredentialConfig) -> String {
    let salt: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect();
    hash_password_with_salt(password, &salt, config.iterations)
}

/// A valid hash no password is expected to match. Checking a login for an
/// unknown account against it costs the same as checking a real one.
pub fn dummy_password_hash(config: CredentialConfig) -> String {
    hash_password_with_salt(DUMMY_PASSWORD, DUMMY_SALT, config.iterations)
}

/// `false` for a wrong password and for any malformed stored hash.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(iter), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != HASH_SCHEME || salt.is_empty() {
        return false;
    }
    let Ok(iterations) = iter.parse::<u32>() else {
        return false;
    };
    if iterations == 0 || iterations > MAX_ITERATIONS {
        return false;
    }
    let Ok(expected) = BASE64.decode(hash) else {
        return false;
    };
    let actual = derive_key(password, salt, iterations);
    bool::from(actual.as_slice().ct_eq(expected.as_slice()))
}

/// 32 random bytes, URL-safe base64 without padding.
pub fn issue_session_token() -> Result<SessionToken, ContractViolation> {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    SessionToken::new(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: CredentialConfig = CredentialConfig { iterations: 16 };

    #[test]
    fn at_credentials_01_hash_verifies_only_the_right_password() {
        let stored = hash_password("almacen123", FAST);
        assert!(stored.starts_with("pbkdf2_sha256$16$"));
        assert!(verify_password("almacen123", &stored));
        assert!(!verify_password("almacen124", &stored));
    }

    #[test]
    fn at_credentials_02_salt_makes_hashes_distinct() {
        let a = hash_password("almacen123", FAST);
        let b = hash_password("almacen123", FAST);
        assert_ne!(a, b);
        assert_eq!(
            hash_password_with_salt("x", "saltsaltsaltsalt", 3),
            hash_password_with_salt("x", "saltsaltsaltsalt", 3)
        );
    }

    #[test]
    fn at_credentials_03_malformed_hash_never_verifies() {
        for bad in [
            "",
            "plain",
            "md5$16$salt$AAAA",
            "sha256$16$salt$AAAA",
            "pbkdf2_sha256$0$salt$AAAA",
            "pbkdf2_sha256$x$salt$AAAA",
            "pbkdf2_sha256$16$$AAAA",
            "pbkdf2_sha256$16$salt$***",
            "pbkdf2_sha256$16$salt$AAAA$extra",
        ] {
            assert!(!verify_password("anything", bad), "{bad}");
        }
    }

    #[test]
    fn at_credentials_04_session_tokens_are_url_safe_and_unique() {
        let a = issue_session_token().unwrap();
        let b = issue_session_token().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 43);
        assert!(a
            .as_str()
            .bytes()
            .all(|c| c.is_ascii_alphanumeric() || c == b'-' || c == b'_'));
    }

    #[test]
    fn at_credentials_05_matches_published_pbkdf2_sha256_vector() {
        // RFC 7914 section 11: PBKDF2-HMAC-SHA256("passwd", "salt", 1, 64).
        let mut key = [0u8; 64];
        pbkdf2_hmac::<Sha256>(b"passwd", b"salt", 1, &mut key);
        assert_eq!(&key[..8], &[0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f]);
        let stored = hash_password_with_salt("passwd", "salt", 1);
        assert_eq!(stored, format!("pbkdf2_sha256$1$salt${}", BASE64.encode(&key[..32])));
        assert!(verify_password("passwd", &stored));
    }

    #[test]
    fn at_credentials_06_dummy_hash_is_well_formed_and_uses_configured_cost() {
        let dummy = dummy_password_hash(FAST);
        assert!(dummy.starts_with("pbkdf2_sha256$16$"));
        assert!(!verify_password("almacen123", &dummy));
        assert_eq!(dummy, dummy_password_hash(FAST));
    }
}
