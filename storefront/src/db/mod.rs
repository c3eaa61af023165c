// storefront/src/db/mod.rs

//! Persistence seams. Handlers and services talk to these traits; `postgres`
//! provides the production implementation and `memory` an in-process one with
//! the same locking and all-or-nothing semantics.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{
  CustomerOrder, LockedProduct, NewOrder, NewOrderItem, NewProduct, NewUser, OrderDetail, OrderLine, OrderStatus,
  OrderSummary, Product, ProductChanges, ProductOrder, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// One exclusive session with an open transaction.
///
/// Every call runs on the same session. Row locks taken by `lock_product` are
/// held until `commit` or `rollback`. Dropping a unit of work without calling
/// either discards its writes and returns the session to the pool.
#[async_trait]
pub trait UnitOfWork: Send {
  /// Inserts the order row with status `pending` and returns its new id.
  async fn insert_order(&mut self, order: &NewOrder) -> Result<i64>;

  /// Reads a product while taking its row-level write lock (`SELECT ... FOR UPDATE`).
  /// Blocks while another transaction holds the lock, up to the configured lock timeout.
  async fn lock_product(&mut self, product_id: i64) -> Result<Option<LockedProduct>>;

  async fn insert_order_item(&mut self, order_id: i64, item: &NewOrderItem) -> Result<()>;

  /// Unconditional `stock_quantity = stock_quantity - quantity` for one product.
  async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> Result<()>;

  async fn commit(self: Box<Self>) -> Result<()>;

  async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait TransactionalStore: Send + Sync {
  /// Acquires a session from the bounded pool and begins a transaction on it.
  async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
  /// All orders with the buyer's display name, newest first.
  async fn list_orders(&self) -> Result<Vec<OrderSummary>>;

  async fn find_order(&self, order_id: i64) -> Result<Option<OrderDetail>>;

  /// Line items of an order joined with product names. Empty when the order has none or does not exist.
  async fn order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>>;

  /// Fails with `NotFound` when no row was affected.
  async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> Result<()>;

  /// Order history of one buyer, newest first.
  async fn orders_for_buyer(&self, buyer_user_id: i64) -> Result<Vec<CustomerOrder>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
  async fn list_products(&self) -> Result<Vec<Product>>;

  async fn find_product(&self, product_id: i64) -> Result<Option<Product>>;

  async fn orders_for_product(&self, product_id: i64) -> Result<Vec<ProductOrder>>;

  async fn create_product(&self, product: &NewProduct) -> Result<i64>;

  /// Fails with `NotFound` when no row was affected.
  async fn update_product(&self, product_id: i64, changes: &ProductChanges) -> Result<()>;

  /// Fails with `NotFound` when absent and `Conflict` while order lines still reference it.
  async fn delete_product(&self, product_id: i64) -> Result<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
  async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

  /// Fails with `Conflict` when the email is already registered.
  async fn create_user(&self, user: &NewUser) -> Result<i64>;
}

/// Everything the HTTP layer needs from a backing store.
#[async_trait]
pub trait Store: OrderRepository + ProductRepository + UserRepository + TransactionalStore {
  /// Cheap liveness probe for the health endpoint.
  async fn ping(&self) -> bool;
}
