use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::Error;

/// Derives a salted Argon2id record. The salt and all derivation
/// parameters are encoded into the returned string.
pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| Error::Storage(String::from("password hashing failed")))
}

/// Recomputes with the stored salt and compares in constant time.
/// Malformed records verify as `false` rather than erroring, so a
/// corrupted row cannot be told apart from a wrong password.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let argon2 = Argon2::default();

    match PasswordHash::new(password_hash) {
        Ok(parsed_hash) => argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(_) => false,
    }
}

/// Opaque single-use token for the password-reset flow.
pub fn generate_reset_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_roundtrip() {
        let record = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &record));
        assert!(!verify_password("hunter3", &record));
    }

    #[test]
    fn malformed_record_verifies_false() {
        assert!(!verify_password("hunter2", "not-a-hash-record"));
        assert!(!verify_password("hunter2", ""));
    }

    #[test]
    fn salts_are_randomized() {
        let a = hash_password("hunter2").unwrap();
        let b = hash_password("hunter2").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn reset_tokens_are_distinct() {
        assert_ne!(generate_reset_token(), generate_reset_token());
        assert_eq!(generate_reset_token().len(), 48);
    }
}
