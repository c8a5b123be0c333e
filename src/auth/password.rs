use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::error::{AppError, Result};

/// Argon2id with the crate's recommended cost parameters.
fn hasher() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

fn hashing_failed(stage: &'static str) -> impl Fn(password_hash::Error) -> AppError {
    move |e| {
        error!(error = %e, stage, "password hashing failed");
        AppError::internal(format!("{stage}: {e}"))
    }
}

/// Salted PHC string for `plain`.
pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let phc = hasher()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(hashing_failed("hash"))?;
    Ok(phc.to_string())
}

/// Constant-time comparison of `plain` against a stored PHC hash. A hash that
/// does not parse is a storage fault, not a wrong password.
pub fn verify_password(plain: &str, phc: &str) -> Result<bool> {
    let stored = PasswordHash::new(phc).map_err(hashing_failed("parse stored hash"))?;
    match hasher().verify_password(plain.as_bytes(), &stored) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(hashing_failed("verify")(e)),
    }
}

/// Hashing is CPU bound; keep it off the async workers.
pub async fn hash_password_blocking(plain: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AppError::internal(format!("hash task: {e}")))?
}

pub async fn verify_password_blocking(plain: String, phc: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &phc))
        .await
        .map_err(|e| AppError::internal(format!("verify task: {e}")))?
}
