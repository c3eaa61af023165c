// storefront/src/services/account_service.rs

//! User registration and sign-in.

use tracing::{info, instrument, warn};

use crate::db::UserRepository;
use crate::errors::{AppError, Result};
use crate::models::{NewUser, User, UserType};
use crate::services::auth_service;
use crate::services::token_service::{TokenPair, TokenService, TokenSubject};

#[derive(Debug, Clone)]
pub struct Registration {
  pub user_name: String,
  pub email: String,
  pub password: String,
  pub phone_number: Option<String>,
  pub address: Option<String>,
  pub user_type: UserType,
}

#[derive(Debug, Clone)]
pub struct SignedIn {
  pub user: User,
  pub tokens: TokenPair,
}

/// Emails are compared case-insensitively by storing them lowercased.
pub fn normalize_email(email: &str) -> String {
  email.trim().to_ascii_lowercase()
}

// Argon2 is deliberately slow; keep it off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
  F: FnOnce() -> Result<T> + Send + 'static,
  T: Send + 'static,
{
  tokio::task::spawn_blocking(f)
    .await
    .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
}

#[instrument(name = "account_service::register", skip(users, registration), fields(email = %registration.email), err(Display))]
pub async fn register<R>(users: &R, registration: Registration) -> Result<i64>
where
  R: UserRepository + ?Sized,
{
  let email = normalize_email(&registration.email);
  if registration.user_name.trim().is_empty() || email.is_empty() || registration.password.is_empty() {
    return Err(AppError::Validation("Missing required fields".to_string()));
  }
  if users.find_user_by_email(&email).await?.is_some() {
    return Err(AppError::Conflict("User already exists".to_string()));
  }

  let password = registration.password;
  let password_hash = run_blocking(move || auth_service::hash_password(&password)).await?;

  let user_id = users
    .create_user(&NewUser {
      user_name: registration.user_name.trim().to_string(),
      email,
      password_hash,
      phone_number: registration.phone_number,
      address: registration.address,
      user_type: registration.user_type,
    })
    .await?;
  info!(user_id, "User registered.");
  Ok(user_id)
}

/// Checks credentials and issues a token pair. Unknown email and wrong password
/// produce the same error.
#[instrument(name = "account_service::login", skip(users, tokens, password), err(Display))]
pub async fn login<R>(users: &R, tokens: &TokenService, email: &str, password: &str) -> Result<SignedIn>
where
  R: UserRepository + ?Sized,
{
  let invalid = || AppError::Auth("Invalid email or password".to_string());

  let user = users.find_user_by_email(&normalize_email(email)).await?.ok_or_else(|| {
    warn!("Login attempt for unknown email.");
    invalid()
  })?;

  let stored_hash = user.password_hash.clone();
  let provided = password.to_string();
  let matches = run_blocking(move || auth_service::verify_password(&stored_hash, &provided)).await?;
  if !matches {
    warn!(user_id = user.user_id, "Login attempt with wrong password.");
    return Err(invalid());
  }

  let tokens = tokens.issue_pair(&TokenSubject {
    user_id: user.user_id,
    user_type: user.user_type,
    email: user.email.clone(),
  })?;
  info!(user_id = user.user_id, "User signed in.");
  Ok(SignedIn { user, tokens })
}
