// storefront/src/models/product.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Product {
  pub product_id: i64,
  pub product_name: String,
  pub price: Decimal,
  pub stock_quantity: i32,
  pub is_available: bool,
  pub img_url: Option<String>,
  pub category_id: Option<i64>,
  pub seller_user_id: Option<i64>,
}

/// The columns an order transaction reads while holding the product's row lock.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LockedProduct {
  pub product_id: i64,
  pub product_name: String,
  pub stock_quantity: i32,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
  pub product_name: String,
  pub price: Decimal,
  pub stock_quantity: i32,
  pub is_available: bool,
  pub img_url: Option<String>,
  pub category_id: i64,
  pub seller_user_id: i64,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
  pub product_name: Option<String>,
  pub price: Option<Decimal>,
  pub stock_quantity: Option<i32>,
}

impl ProductChanges {
  pub fn is_empty(&self) -> bool {
    self.product_name.is_none() && self.price.is_none() && self.stock_quantity.is_none()
  }
}

/// An order line that references a given product, with the buyer's name.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ProductOrder {
  pub order_id: i64,
  pub buyer_name: String,
  pub order_date: DateTime<Utc>,
  pub quantity: i32,
  pub price_at_ordertime: Decimal,
}
