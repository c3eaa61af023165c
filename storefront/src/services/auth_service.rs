// storefront/src/services/auth_service.rs

//! Password hashing and verification.

use crate::errors::AppError; // Application-specific error type
use argon2::{
  password_hash::{
    rand_core::OsRng, // For generating random salts
    PasswordHash,
    PasswordHasher,
    PasswordVerifier,
    SaltString,
  },
  Argon2,
};
use tracing::{debug, error, instrument};

/// Hashes a plain-text password using Argon2 with a fresh random salt.
///
/// Returns the PHC-format hash string, or `AppError::Validation` for an empty password.
#[instrument(name = "auth_service::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String, AppError> {
  if password.is_empty() {
    return Err(AppError::Validation("Password cannot be empty.".to_string()));
  }

  let salt = SaltString::generate(&mut OsRng);
  match Argon2::default().hash_password(password.as_bytes(), &salt) {
    Ok(password_hash_obj) => {
      debug!("Password hashed successfully.");
      Ok(password_hash_obj.to_string())
    }
    Err(argon_err) => {
      error!(error = %argon_err, "Argon2 password hashing failed.");
      Err(AppError::Internal(format!("Password hashing process failed: {}", argon_err)))
    }
  }
}

/// Verifies a plain-text password against a stored Argon2 hash.
///
/// `Ok(false)` means the password does not match. A malformed stored hash is an
/// internal error, not an authentication failure.
#[instrument(name = "auth_service::verify_password", skip(hashed_password_str, provided_password), err(Display))]
pub fn verify_password(hashed_password_str: &str, provided_password: &str) -> Result<bool, AppError> {
  if provided_password.is_empty() {
    return Ok(false);
  }

  let parsed_hash = PasswordHash::new(hashed_password_str).map_err(|parse_err| {
    error!(error = %parse_err, "Failed to parse stored password hash string.");
    AppError::Internal(format!("Invalid stored password hash format: {}", parse_err))
  })?;

  match Argon2::default().verify_password(provided_password.as_bytes(), &parsed_hash) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Password verification failed: Passwords do not match.");
      Ok(false)
    }
    Err(other_argon_err) => {
      error!(error = %other_argon_err, "Argon2 password verification process encountered an error.");
      Err(AppError::Internal(format!(
        "Password verification process failed: {}",
        other_argon_err
      )))
    }
  }
}
