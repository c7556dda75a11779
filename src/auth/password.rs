use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::HashingConfig;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password must not be empty")]
    Empty,
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Salted argon2id hashing with a tunable work factor.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher {
    pub fn from_config(cfg: &HashingConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self { params })
    }

    /// Cheapest parameters argon2 accepts. Only for tests.
    pub fn fast_insecure() -> Self {
        Self {
            params: Params::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST, None)
                .unwrap_or_default(),
        }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        if plain.is_empty() {
            return Err(PasswordError::Empty);
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                PasswordError::Hash(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Never errors: a digest that does not parse simply does not match.
    pub fn verify(&self, plain: &str, digest: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "stored digest is not a PHC string");
                return false;
            }
        };
        // Parameters are read from the digest itself, so older cost settings
        // still verify.
        Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }

    /// Runs [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, plain: String) -> Result<String, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| PasswordError::Hash(e.to_string()))?
    }

    pub async fn verify_blocking(&self, plain: String, digest: String) -> bool {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &digest))
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = PasswordHasher::fast_insecure();
        let password = "Secur3P@ssw0rd!";
        let hash = hasher.hash(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(hasher.verify(password, &hash));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hasher = PasswordHasher::fast_insecure();
        let hash = hasher.hash("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!hasher.verify("wrong-password", &hash));
    }

    #[test]
    fn same_input_gets_a_fresh_salt() {
        let hasher = PasswordHasher::fast_insecure();
        let a = hasher.hash("Abc123!!").unwrap();
        let b = hasher.hash("Abc123!!").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("Abc123!!", &a));
        assert!(hasher.verify("Abc123!!", &b));
    }

    #[test]
    fn verify_returns_false_on_malformed_hash() {
        let hasher = PasswordHasher::fast_insecure();
        assert!(!hasher.verify("anything", "not-a-valid-hash"));
        assert!(!hasher.verify("anything", ""));
    }

    #[test]
    fn empty_password_is_rejected() {
        let err = PasswordHasher::fast_insecure().hash("").unwrap_err();
        assert!(matches!(err, PasswordError::Empty));
    }

    #[tokio::test]
    async fn blocking_helpers_agree_with_sync_versions() {
        let hasher = PasswordHasher::fast_insecure();
        let hash = hasher.hash_blocking("Abc123!!".into()).await.unwrap();
        assert!(hasher.verify_blocking("Abc123!!".into(), hash.clone()).await);
        assert!(!hasher.verify_blocking("abc123!!".into(), hash).await);
    }
}
