// storefront/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::UserType;
use crate::services::account_service::{self, Registration};
use crate::state::AppState;

// --- Request DTOs ---

#[derive(Deserialize, Debug)]
pub struct RegisterRequestPayload {
  pub user_name: Option<String>,
  pub email: Option<String>,
  pub password: Option<String>,
  pub phone_number: Option<String>,
  pub address: Option<String>,
  pub user_type: Option<UserType>,
}

#[derive(Deserialize, Debug)]
pub struct LoginRequestPayload {
  pub email: Option<String>,
  pub password: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct RefreshRequestPayload {
  #[serde(rename = "refreshToken")]
  pub refresh_token: Option<String>,
}

// --- Handler Implementations ---

#[instrument(name = "handler::register", skip(app_state, req_payload))]
pub async fn register_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<RegisterRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let (Some(user_name), Some(email), Some(password)) = (payload.user_name, payload.email, payload.password) else {
    return Err(AppError::Validation("Missing required fields".to_string()));
  };

  let registration = Registration {
    user_name,
    email,
    password,
    phone_number: payload.phone_number,
    address: payload.address,
    user_type: payload.user_type.unwrap_or(UserType::Buyer),
  };
  let user_id = account_service::register(app_state.store.as_ref(), registration).await?;

  info!(user_id, "Signup successful.");
  Ok(HttpResponse::Created().json(json!({
      "message": "User registered successfully",
      "userId": user_id,
  })))
}

#[instrument(name = "handler::login", skip(app_state, req_payload))]
pub async fn login_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<LoginRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let (Some(email), Some(password)) = (payload.email, payload.password) else {
    return Err(AppError::Validation("Missing email or password".to_string()));
  };

  let signed_in = account_service::login(app_state.store.as_ref(), &app_state.tokens, &email, &password).await?;
  let user = signed_in.user;

  Ok(HttpResponse::Ok().json(json!({
      "message": "Login successful",
      "user": {
          "id": user.user_id,
          "name": user.user_name,
          "email": user.email,
          "type": user.user_type,
          "token": signed_in.tokens.token,
          "refreshToken": signed_in.tokens.refresh_token,
      },
  })))
}

#[instrument(name = "handler::refresh_token", skip(app_state, req_payload))]
pub async fn refresh_token_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<RefreshRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let refresh_token = req_payload
    .into_inner()
    .refresh_token
    .ok_or_else(|| AppError::Validation("Missing refreshToken".to_string()))?;

  let pair = app_state.tokens.refresh(&refresh_token)?;
  Ok(HttpResponse::Ok().json(pair))
}
