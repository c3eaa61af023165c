// storefront/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  // The wording is part of the HTTP contract: clients match on "out of stock".
  #[error("Product '{product_name}' (id {product_id}) is out of stock: requested {requested}, available {available}")]
  OutOfStock {
    product_id: i64,
    product_name: String,
    requested: i32,
    available: i32,
  },

  #[error("Transaction failed while trying to {context}: {source}")]
  Transaction {
    context: String,
    #[source]
    source: anyhow::Error,
  },

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  /// Wraps a data-access fault raised inside a unit of work.
  pub fn transaction(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
    AppError::Transaction {
      context: context.into(),
      source: source.into(),
    }
  }

  /// Stable machine-readable kind, sent to clients as `code`.
  pub fn code(&self) -> &'static str {
    match self {
      AppError::Validation(_) => "validation_error",
      AppError::Auth(_) => "unauthorized",
      AppError::Forbidden(_) => "forbidden",
      AppError::NotFound(_) => "not_found",
      AppError::Conflict(_) => "conflict",
      AppError::OutOfStock { .. } => "out_of_stock",
      AppError::Transaction { .. } => "transaction_failure",
      AppError::Sqlx(_) => "database_error",
      AppError::Config(_) => "configuration_error",
      AppError::Internal(_) => "internal_error",
    }
  }

  /// Message safe to show to a client. Server-side faults get a generic text.
  fn public_message(&self) -> String {
    match self {
      AppError::Validation(m)
      | AppError::Auth(m)
      | AppError::Forbidden(m)
      | AppError::NotFound(m)
      | AppError::Conflict(m) => m.clone(),
      AppError::OutOfStock { .. } => self.to_string(),
      AppError::Transaction { .. } => "The operation could not be completed. No changes were made.".to_string(),
      AppError::Sqlx(_) => "Database operation failed.".to_string(),
      AppError::Config(_) | AppError::Internal(_) => "An internal error occurred.".to_string(),
    }
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(other) => AppError::Internal(other.to_string()),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) | AppError::OutOfStock { .. } => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Forbidden(_) => StatusCode::FORBIDDEN,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::Transaction { .. } | AppError::Sqlx(_) | AppError::Config(_) | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      // The id is the only link between the client-visible body and the logged cause.
      let error_id = Uuid::new_v4();
      tracing::error!(%error_id, code = self.code(), application_error = ?self, "Responding with server error");
      return HttpResponse::build(status).json(json!({
        "message": self.public_message(),
        "code": self.code(),
        "errorId": error_id.to_string(),
      }));
    }

    tracing::warn!(code = self.code(), application_error = %self, "Responding with client error");
    HttpResponse::build(status).json(json!({
      "message": self.public_message(),
      "code": self.code(),
    }))
  }
}

// Define a Result type alias for the application
pub type Result<T, E = AppError> = std::result::Result<T, E>;
