use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenHashError {
    #[error("Failed to hash token: {0}")]
    HashError(String),
    #[error("Failed to parse token hash: {0}")]
    InvalidHash(String),
}

/// Hash an operator token with Argon2id, the output is a PHC string for the config file
pub fn hash_token(token: &str) -> Result<String, TokenHashError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(token.as_bytes(), &salt)
        .map_err(|e| TokenHashError::HashError(e.to_string()))?;
    Ok(hash.to_string())
}

pub fn parse_token_hash(hash: &str) -> Result<PasswordHash<'_>, TokenHashError> {
    PasswordHash::new(hash).map_err(|e| TokenHashError::InvalidHash(e.to_string()))
}

pub fn verify_token(token: &str, hash: &str) -> Result<bool, TokenHashError> {
    let parsed_hash = parse_token_hash(hash)?;
    Ok(Argon2::default()
        .verify_password(token.as_bytes(), &parsed_hash)
        .is_ok())
}
