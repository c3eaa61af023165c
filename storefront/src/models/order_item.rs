// storefront/src/models/order_item.rs

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// One persisted line of an order. Written once, inside the order's transaction.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct OrderItem {
  pub order_item_id: i64,
  pub order_id: i64,
  pub product_id: i64,
  pub quantity: i32,
  // Snapshot of the price the buyer saw; later catalogue changes never touch it.
  pub price_at_ordertime: Decimal,
}

/// Line item as shown for an order, joined with the product name.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct OrderLine {
  pub product_id: i64,
  pub product_name: String,
  pub quantity: i32,
  pub price_at_ordertime: Decimal,
}
