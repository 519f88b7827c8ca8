//! Password hashing and verification for students and admins.

use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;

/// One-way hash with a fresh random salt per call. The salt and the cost
/// parameters travel inside the returned PHC string.
pub fn hash(plaintext: &str) -> Result<String, pbkdf2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hashed = Pbkdf2.hash_password(plaintext.as_bytes(), &salt)?;
    Ok(hashed.to_string())
}

/// Malformed stored hashes count as a mismatch, never an error.
pub fn verify(plaintext: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Pbkdf2.verify_password(plaintext.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// An absent account verifies exactly like a wrong password, so a login
/// failure cannot be used to probe which emails are registered.
pub fn verify_candidate(plaintext: &str, stored: Option<&str>) -> bool {
    match stored {
        Some(stored) => verify(plaintext, stored),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_never_the_plaintext() {
        let stored = hash("p1").unwrap();
        assert_ne!(stored, "p1");
        assert!(stored.starts_with("$pbkdf2"));
    }

    #[test]
    fn verify_accepts_only_the_right_password() {
        let stored = hash("correct horse").unwrap();
        assert!(verify("correct horse", &stored));
        assert!(!verify("wrong horse", &stored));
    }

    #[test]
    fn two_hashes_of_one_password_differ() {
        // per-call salts
        assert_ne!(hash("p1").unwrap(), hash("p1").unwrap());
    }

    #[test]
    fn malformed_stored_hashes_verify_false() {
        assert!(!verify("anything", "not-a-phc-string"));
        assert!(!verify("anything", ""));
    }

    #[test]
    fn absent_account_and_wrong_password_are_indistinguishable() {
        let stored = hash("p1").unwrap();
        assert_eq!(
            verify_candidate("p2", Some(&stored)),
            verify_candidate("p2", None)
        );
    }
}
