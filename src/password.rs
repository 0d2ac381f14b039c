//! Password hashing for stored user credentials.
//!
//! Hashes are Argon2id in PHC string format, so the salt and parameters travel
//! with the hash and verification needs nothing else.
use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

use crate::repository::RepositoryError;

fn hasher() -> Result<Argon2<'static>, RepositoryError> {
    let params = Params::new(15000, 2, 1, None)
        .map_err(|e| RepositoryError::PasswordHash(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Compute the PHC-encoded hash of `password`.
pub fn compute_password_hash(password: &str) -> Result<String, RepositoryError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| RepositoryError::PasswordHash(e.to_string()))?
        .to_string();
    Ok(hash)
}

/// Compare `password` against a stored hash.
///
/// A mismatch is reported as [`RepositoryError::InvalidCredentials`]; a
/// malformed stored hash is an infrastructure error.
pub fn verify_password_hash(expected_hash: &str, password: &str) -> Result<(), RepositoryError> {
    let expected = PasswordHash::new(expected_hash)
        .map_err(|e| RepositoryError::PasswordHash(e.to_string()))?;

    match hasher()?.verify_password(password.as_bytes(), &expected) {
        Ok(()) => Ok(()),
        Err(argon2::password_hash::Error::Password) => Err(RepositoryError::InvalidCredentials),
        Err(e) => Err(RepositoryError::PasswordHash(e.to_string())),
    }
}
