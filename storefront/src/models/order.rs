// storefront/src/models/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};

use crate::errors::AppError;

// Matches order_status_enum in migrations/0001_initial_schema.sql.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Order {
  pub order_id: i64,
  pub buyer_user_id: i64,
  pub total_amount: Decimal,
  pub status: OrderStatus,
  pub shipping_address: String,
  pub phone_number: Option<String>,
  pub order_date: DateTime<Utc>,
}

/// Row of the admin order list.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct OrderSummary {
  pub order_id: i64,
  pub buyer_name: String,
  pub order_date: DateTime<Utc>,
  pub total_amount: Decimal,
  pub status: OrderStatus,
}

/// A single order with its buyer's contact details.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct OrderDetail {
  pub order_id: i64,
  pub order_date: DateTime<Utc>,
  pub total_amount: Decimal,
  pub status: OrderStatus,
  pub shipping_address: String,
  pub phone_number: Option<String>,
  pub buyer_name: String,
  pub buyer_email: String,
}

/// Row of a customer's order history.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct CustomerOrder {
  pub order_id: i64,
  pub order_date: DateTime<Utc>,
  pub total_amount: Decimal,
  pub status: OrderStatus,
}

/// A validated order request, the input of `order_service::create_order`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
  pub buyer_user_id: i64,
  pub total_amount: Decimal,
  pub shipping_address: String,
  pub phone_number: Option<String>,
  /// Processed in this order; row locks are taken in the same sequence.
  pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
  pub product_id: i64,
  pub quantity: i32,
  pub price_at_ordertime: Decimal,
}

/// Digits after the point that a `NUMERIC(12,2)` column keeps.
const MONEY_SCALE: u32 = 2;

fn exceeds_money_scale(amount: Decimal) -> bool {
  // "12.500" normalises to "12.5" and passes.
  amount.normalize().scale() > MONEY_SCALE
}

impl NewOrder {
  pub fn validate(&self) -> Result<(), AppError> {
    if self.buyer_user_id <= 0 {
      return Err(AppError::Validation("buyer_user_id must be a positive integer.".to_string()));
    }
    if self.total_amount.is_sign_negative() {
      return Err(AppError::Validation("total_amount cannot be negative.".to_string()));
    }
    if exceeds_money_scale(self.total_amount) {
      return Err(AppError::Validation(
        "total_amount cannot have more than two decimal places.".to_string(),
      ));
    }
    if self.shipping_address.trim().is_empty() {
      return Err(AppError::Validation("shipping_address cannot be empty.".to_string()));
    }
    if self.items.is_empty() {
      return Err(AppError::Validation("Items array cannot be empty.".to_string()));
    }
    for (idx, item) in self.items.iter().enumerate() {
      if item.product_id <= 0 {
        return Err(AppError::Validation(format!(
          "items[{}].product_id must be a positive integer.",
          idx
        )));
      }
      if item.quantity <= 0 {
        return Err(AppError::Validation(format!(
          "items[{}].quantity must be a positive integer.",
          idx
        )));
      }
      if item.price_at_ordertime.is_sign_negative() {
        return Err(AppError::Validation(format!(
          "items[{}].price_at_ordertime cannot be negative.",
          idx
        )));
      }
      if exceeds_money_scale(item.price_at_ordertime) {
        return Err(AppError::Validation(format!(
          "items[{}].price_at_ordertime cannot have more than two decimal places.",
          idx
        )));
      }
    }
    Ok(())
  }

  /// Σ quantity × price over the items, as the client should have computed it.
  pub fn items_total(&self) -> Decimal {
    self
      .items
      .iter()
      .map(|item| item.price_at_ordertime * Decimal::from(item.quantity))
      .sum()
  }
}

/// Result of a committed order transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCreated {
  pub message: String,
  #[serde(rename = "orderId")]
  pub order_id: i64,
}
