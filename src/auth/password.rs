//! Password hashing and verification (Argon2id, PHC strings).
use crate::error::{HelpdeskError, HelpdeskResult};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distributions::Alphanumeric, Rng};

/// One-way credential hashing
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl CredentialHasher {
    /// Create a hasher with default Argon2id parameters
    ///
    /// Also hashes a random throwaway password so lookup misses can be
    /// verified against a real hash with the same cost.
    pub fn new() -> HelpdeskResult<Self> {
        let argon2 = Argon2::default();
        let throwaway: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        let dummy_hash = hash_with(&argon2, &throwaway)?;

        Ok(Self { argon2, dummy_hash })
    }

    /// Hash a plaintext password
    pub fn hash(&self, plain: &str) -> HelpdeskResult<String> {
        hash_with(&self.argon2, plain)
    }

    /// Verify a plaintext password against a PHC string
    pub fn verify(&self, plain: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };
        self.argon2.verify_password(plain.as_bytes(), &parsed).is_ok()
    }

    /// Hash compared against when the account does not exist
    pub fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}

fn hash_with(argon2: &Argon2<'static>, plain: &str) -> HelpdeskResult<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let phc = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| HelpdeskError::Internal(format!("Password hashing failed: {}", e)))?
        .to_string();
    Ok(phc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = CredentialHasher::new().unwrap();
        let hash = hasher.hash("secret1").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("secret1", &hash));
        assert!(!hasher.verify("secret2", &hash));
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let hasher = CredentialHasher::new().unwrap();
        let a = hasher.hash("secret1").unwrap();
        let b = hasher.hash("secret1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        let hasher = CredentialHasher::new().unwrap();
        assert!(!hasher.verify("secret1", "not-a-phc-string"));
        assert!(!hasher.verify("", ""));
    }

    #[test]
    fn test_dummy_hash_is_real_argon2() {
        let hasher = CredentialHasher::new().unwrap();
        assert!(PasswordHash::new(hasher.dummy_hash()).is_ok());
        assert!(!hasher.verify("secret1", hasher.dummy_hash()));
    }
}
