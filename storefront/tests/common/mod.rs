// tests/common/mod.rs
#![allow(dead_code)] // Each test binary uses a different subset of these helpers

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use tracing::Level;

use storefront::db::MemoryStore;
use storefront::models::{NewOrder, NewOrderItem, Product, User, UserType};
use storefront::services::auth_service;
use storefront::services::token_service::{TokenService, TokenSubject};
use storefront::state::AppState;

pub const BUYER_ID: i64 = 7;
pub const OTHER_BUYER_ID: i64 = 8;
pub const SELLER_ID: i64 = 20;
pub const ADMIN_ID: i64 = 99;

pub const WIDGET_ID: i64 = 3; // stock 5, price 12.50
pub const GADGET_ID: i64 = 4; // stock 10, price 3.00
pub const GIZMO_ID: i64 = 5; // stock 2, price 40.00

pub const PASSWORD: &str = "password123";

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// Hashing once keeps the argon2 cost out of every test.
static PASSWORD_HASH: Lazy<String> =
  Lazy::new(|| auth_service::hash_password(PASSWORD).expect("hashing the fixture password"));

pub fn money(cents: i64) -> Decimal {
  Decimal::new(cents, 2)
}

pub fn user(user_id: i64, name: &str, user_type: UserType) -> User {
  User {
    user_id,
    user_name: name.to_string(),
    email: format!("{}@example.com", name.to_lowercase()),
    password_hash: PASSWORD_HASH.clone(),
    phone_number: None,
    address: Some("1 Test Street".to_string()),
    user_type,
    created_at: Utc::now(),
  }
}

pub fn product(product_id: i64, name: &str, price: Decimal, stock_quantity: i32) -> Product {
  Product {
    product_id,
    product_name: name.to_string(),
    price,
    stock_quantity,
    is_available: true,
    img_url: None,
    category_id: Some(1),
    seller_user_id: Some(SELLER_ID),
  }
}

/// Store with buyers 7 and 8, a seller, an admin and three products.
pub fn seeded_store_with(max_sessions: usize, lock_timeout: Duration) -> MemoryStore {
  let store = MemoryStore::new(max_sessions, Duration::from_secs(2), lock_timeout);
  store.put_user(user(BUYER_ID, "Ada", UserType::Buyer));
  store.put_user(user(OTHER_BUYER_ID, "Brian", UserType::Buyer));
  store.put_user(user(SELLER_ID, "Sally", UserType::Seller));
  store.put_user(user(ADMIN_ID, "Root", UserType::Admin));
  store.put_product(product(WIDGET_ID, "Widget", money(1250), 5));
  store.put_product(product(GADGET_ID, "Gadget", money(300), 10));
  store.put_product(product(GIZMO_ID, "Gizmo", money(4000), 2));
  store
}

pub fn seeded_store() -> MemoryStore {
  seeded_store_with(10, Duration::from_secs(2))
}

pub fn item(product_id: i64, quantity: i32, price_cents: i64) -> NewOrderItem {
  NewOrderItem {
    product_id,
    quantity,
    price_at_ordertime: money(price_cents),
  }
}

pub fn order_for(buyer_user_id: i64, items: Vec<NewOrderItem>) -> NewOrder {
  let total_amount = items
    .iter()
    .map(|i| i.price_at_ordertime * Decimal::from(i.quantity))
    .sum();
  NewOrder {
    buyer_user_id,
    total_amount,
    shipping_address: "1 Test Street".to_string(),
    phone_number: Some("555-0100".to_string()),
    items,
  }
}

pub fn token_service() -> TokenService {
  TokenService::new(
    "test-access-secret",
    "test-refresh-secret",
    Duration::from_secs(900),
    Duration::from_secs(3600),
  )
}

pub fn app_state(store: &MemoryStore) -> AppState {
  AppState::new(Arc::new(store.clone()), token_service())
}

/// `Authorization` header value for a seeded user.
pub fn bearer(user_id: i64, user_type: UserType) -> String {
  let pair = token_service()
    .issue_pair(&TokenSubject {
      user_id,
      user_type,
      email: format!("user{}@example.com", user_id),
    })
    .expect("issuing a test token");
  format!("Bearer {}", pair.token)
}
