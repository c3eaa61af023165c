// storefront/src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "user_type_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserType {
  Buyer,
  Seller,
  Admin,
}

impl UserType {
  pub fn as_str(&self) -> &'static str {
    match self {
      UserType::Buyer => "buyer",
      UserType::Seller => "seller",
      UserType::Admin => "admin",
    }
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
  pub user_id: i64,
  pub user_name: String,
  pub email: String,
  #[serde(skip_serializing)] // Never send password hash to client
  pub password_hash: String,
  pub phone_number: Option<String>,
  pub address: Option<String>,
  pub user_type: UserType,
  pub created_at: DateTime<Utc>,
}

/// A user row ready for insertion; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub user_name: String,
  pub email: String,
  pub password_hash: String,
  pub phone_number: Option<String>,
  pub address: Option<String>,
  pub user_type: UserType,
}
