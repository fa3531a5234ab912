//! Password hashing and verification, using argon2 in PHC string format.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

use crate::prelude::*;


/// Hashes a password with a fresh random salt.
pub(crate) fn hash(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| Error::Password(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| Error::Password(e.to_string()))?;

    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Password(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// Checks a password against a stored PHC string. An unparsable hash counts
/// as a mismatch.
pub(crate) fn verify(stored_hash: &str, password: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}


#[cfg(test)]
mod tests {
    use super::{hash, verify};

    #[test]
    fn hash_and_verify() {
        let phc = hash("hunter2").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify(&phc, "hunter2"));
        assert!(!verify(&phc, "hunter3"));
    }

    #[test]
    fn garbage_hash_is_a_mismatch() {
        assert!(!verify("not a phc string", "hunter2"));
        assert!(!verify("", "hunter2"));
    }
}
