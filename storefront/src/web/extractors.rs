// storefront/src/web/extractors.rs

use actix_web::{http::header, web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::debug;

use crate::errors::{AppError, Result};
use crate::models::UserType;
use crate::state::AppState;

/// Caller identity taken from an `Authorization: Bearer <access token>` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
  pub user_id: i64,
  pub user_type: UserType,
  pub email: String,
}

impl AuthenticatedUser {
  pub fn is_admin(&self) -> bool {
    self.user_type == UserType::Admin
  }

  pub fn require_admin(&self) -> Result<()> {
    if self.is_admin() {
      Ok(())
    } else {
      Err(AppError::Forbidden("Administrator access required.".to_string()))
    }
  }

  pub fn require_self_or_admin(&self, user_id: i64) -> Result<()> {
    if self.is_admin() || self.user_id == user_id {
      Ok(())
    } else {
      Err(AppError::Forbidden("You can only access your own orders.".to_string()))
    }
  }

  pub fn require_seller_or_admin(&self) -> Result<()> {
    match self.user_type {
      UserType::Seller | UserType::Admin => Ok(()),
      UserType::Buyer => Err(AppError::Forbidden("Seller or administrator access required.".to_string())),
    }
  }
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    ready(authenticate(req))
  }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser> {
  let state = req
    .app_data::<web::Data<AppState>>()
    .ok_or_else(|| AppError::Internal("Application state is not registered.".to_string()))?;

  let header_value = req
    .headers()
    .get(header::AUTHORIZATION)
    .ok_or_else(|| AppError::Auth("Missing Authorization header.".to_string()))?
    .to_str()
    .map_err(|_| AppError::Auth("Malformed Authorization header.".to_string()))?;

  let token = header_value
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .ok_or_else(|| AppError::Auth("Authorization header must carry a Bearer token.".to_string()))?;

  let subject = state.tokens.verify_access(token)?;
  debug!(user_id = subject.user_id, "Request authenticated.");
  Ok(AuthenticatedUser {
    user_id: subject.user_id,
    user_type: subject.user_type,
    email: subject.email,
  })
}
