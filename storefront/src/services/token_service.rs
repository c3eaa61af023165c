// storefront/src/services/token_service.rs

//! Issues and verifies access/refresh JWTs.
//!
//! Access and refresh tokens are signed with different secrets and carry a
//! `token_use` claim, so neither can stand in for the other.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::UserType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
  Access,
  Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub sub: String, // user_id as string
  pub user_type: UserType,
  pub email: String,
  pub token_use: TokenUse,
  pub iat: u64,
  pub exp: u64,
}

/// Who a token was issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
  pub user_id: i64,
  pub user_type: UserType,
  pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
  pub token: String,
  #[serde(rename = "refreshToken")]
  pub refresh_token: String,
}

struct SigningKeys {
  encoding: EncodingKey,
  decoding: DecodingKey,
  ttl: Duration,
}

impl SigningKeys {
  fn new(secret: &str, ttl: Duration) -> Self {
    Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      ttl,
    }
  }
}

pub struct TokenService {
  access: SigningKeys,
  refresh: SigningKeys,
}

impl TokenService {
  pub fn new(access_secret: &str, refresh_secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
    Self {
      access: SigningKeys::new(access_secret, access_ttl),
      refresh: SigningKeys::new(refresh_secret, refresh_ttl),
    }
  }

  pub fn from_config(config: &AppConfig) -> Self {
    Self::new(
      &config.jwt_access_secret,
      &config.jwt_refresh_secret,
      config.access_token_ttl,
      config.refresh_token_ttl,
    )
  }

  fn keys(&self, token_use: TokenUse) -> &SigningKeys {
    match token_use {
      TokenUse::Access => &self.access,
      TokenUse::Refresh => &self.refresh,
    }
  }

  fn sign(&self, claims: &Claims) -> Result<String> {
    encode(&Header::default(), claims, &self.keys(claims.token_use).encoding)
      .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
  }

  fn claims_for(&self, subject: &TokenSubject, token_use: TokenUse) -> Claims {
    let now = Utc::now().timestamp().max(0) as u64;
    Claims {
      sub: subject.user_id.to_string(),
      user_type: subject.user_type,
      email: subject.email.clone(),
      token_use,
      iat: now,
      exp: now + self.keys(token_use).ttl.as_secs(),
    }
  }

  /// Short-lived access token plus long-lived refresh token for one subject.
  #[instrument(name = "token_service::issue_pair", skip(self, subject), fields(user_id = subject.user_id))]
  pub fn issue_pair(&self, subject: &TokenSubject) -> Result<TokenPair> {
    let token = self.sign(&self.claims_for(subject, TokenUse::Access))?;
    let refresh_token = self.sign(&self.claims_for(subject, TokenUse::Refresh))?;
    debug!("Issued access and refresh tokens.");
    Ok(TokenPair { token, refresh_token })
  }

  fn verify(&self, token: &str, expected: TokenUse) -> Result<TokenSubject> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, &self.keys(expected).decoding, &validation).map_err(|e| {
      debug!(error = %e, ?expected, "Token rejected.");
      AppError::Auth("Invalid or expired token.".to_string())
    })?;

    let claims = data.claims;
    if claims.token_use != expected {
      return Err(AppError::Auth("Invalid or expired token.".to_string()));
    }
    let user_id = claims
      .sub
      .parse::<i64>()
      .map_err(|_| AppError::Auth("Invalid token subject.".to_string()))?;

    Ok(TokenSubject {
      user_id,
      user_type: claims.user_type,
      email: claims.email,
    })
  }

  pub fn verify_access(&self, token: &str) -> Result<TokenSubject> {
    self.verify(token, TokenUse::Access)
  }

  /// Verifies a refresh token and issues a new pair for the same subject.
  #[instrument(name = "token_service::refresh", skip_all)]
  pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
    let subject = self.verify(refresh_token, TokenUse::Refresh)?;
    self.issue_pair(&subject)
  }
}
