use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use tracing::error;

use crate::config::PasswordConfig;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid argon2 parameters: {0}")]
    Params(argon2::Error),
    #[error("argon2 hashing failed: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("stored password hash is malformed: {0}")]
    Malformed(argon2::password_hash::Error),
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Argon2id hasher. Each hash carries its own random salt and parameters in
/// PHC form, so verification needs nothing but the stored string.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    // Verified against when the account does not exist, so both login
    // failure paths cost one Argon2 run.
    dummy_hash: String,
}

impl CredentialHasher {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, HashError> {
        let params =
            Params::new(memory_kib, iterations, parallelism, None).map_err(HashError::Params)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, "dummy-password-for-unknown-accounts")?;
        Ok(Self { argon2, dummy_hash })
    }

    pub fn from_config(cfg: &PasswordConfig) -> Result<Self, HashError> {
        Self::new(
            cfg.argon2_memory_kib,
            cfg.argon2_iterations,
            cfg.argon2_parallelism,
        )
    }

    pub fn hash(&self, plain: &str) -> Result<String, HashError> {
        hash_with(&self.argon2, plain)
    }

    /// `Ok(false)` on mismatch; `Err` only when `stored` cannot be parsed.
    pub fn verify(&self, stored: &str, plain: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(stored).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            HashError::Malformed(e)
        })?;
        Ok(self
            .argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// Burns the same work as a real verification and always fails.
    pub fn verify_dummy(&self, plain: &str) {
        let _ = self.verify(&self.dummy_hash, plain);
    }

    // Argon2 is CPU bound; the spawn_* variants keep it off the async workers.

    pub async fn spawn_hash(&self, plain: String) -> Result<String, HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plain)).await?
    }

    pub async fn spawn_verify(&self, stored: String, plain: String) -> Result<bool, HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&stored, &plain)).await?
    }

    pub async fn spawn_verify_dummy(&self, plain: String) -> Result<(), HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify_dummy(&plain)).await?;
        Ok(())
    }
}

fn hash_with(argon2: &Argon2<'_>, plain: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            HashError::Hash(e)
        })?
        .to_string();
    Ok(hash)
}
