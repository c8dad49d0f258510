//! Password hashing with Argon2id.

use argon2::{
    password_hash::{
        PasswordHash, PasswordHasher as Argon2PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2, Params,
};
use rand::rngs::OsRng;

use crate::error::{AuthError, AuthResult};

/// Upper bound for the memory cost exponent (4 GiB).
const MAX_MEMORY_COST_LOG2: u32 = 22;

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: 6 }
    }
}

impl PasswordPolicy {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    pub fn validate(&self, password: &str) -> AuthResult<()> {
        if password.chars().count() < self.min_length {
            return Err(AuthError::invalid_argument(format!(
                "password must be at least {} characters",
                self.min_length
            )));
        }
        Ok(())
    }
}

/// Salted Argon2id hashing with a fixed memory cost.
///
/// The cost parameter is the log2 of the memory usage in KiB:
/// - 4: test suites
/// - 12: ~4MB, development
/// - 16: ~64MB, production
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    memory_cost_log2: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(12)
    }
}

impl PasswordHasher {
    pub fn new(memory_cost_log2: u32) -> Self {
        Self {
            memory_cost_log2: memory_cost_log2.min(MAX_MEMORY_COST_LOG2),
        }
    }

    pub fn memory_cost_log2(&self) -> u32 {
        self.memory_cost_log2
    }

    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let params = Params::new(1u32 << self.memory_cost_log2, 3, 1, None)
            .map_err(|e| AuthError::HashingFailure(e.to_string()))?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashingFailure(e.to_string()))?;
        Ok(password_hash.to_string())
    }

    /// Constant-time check of `password` against a PHC-encoded hash.
    ///
    /// Parameters are read from the hash itself, so hashes made with a
    /// different cost still verify.
    pub fn verify(password: &str, password_hash: &str) -> AuthResult<bool> {
        let parsed_hash =
            PasswordHash::new(password_hash).map_err(|e| AuthError::HashingFailure(e.to_string()))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::HashingFailure(e.to_string())),
        }
    }
}

/// Runs hashing work on the blocking pool so it does not stall async workers.
pub async fn run_blocking<T, F>(work: F) -> AuthResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AuthResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AuthError::HashingFailure(e.to_string()))?
}
