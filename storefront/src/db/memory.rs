// storefront/src/db/memory.rs

//! In-process store with the transactional behaviour of the Postgres one.
//!
//! * Sessions come from a bounded semaphore, so at most `max_sessions` units of
//!   work are open at once and a waiting `begin` gives up after the acquire timeout.
//! * Each product row has its own async mutex. `lock_product` holds it until the
//!   unit of work ends, which serialises concurrent orders touching that product.
//!   Product updates and deletes take the same lock for the duration of the write.
//!   Locks nobody holds are dropped from the map once released.
//! * Writes made inside a unit of work are staged and become visible only on
//!   commit. Rollback (or drop) throws them away.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use super::{OrderRepository, ProductRepository, Store, TransactionalStore, UnitOfWork, UserRepository};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::{
  CustomerOrder, LockedProduct, NewOrder, NewOrderItem, NewProduct, NewUser, Order, OrderDetail, OrderItem, OrderLine,
  OrderStatus, OrderSummary, Product, ProductChanges, ProductOrder, User,
};

#[derive(Default)]
struct Tables {
  users: BTreeMap<i64, User>,
  products: BTreeMap<i64, Product>,
  orders: BTreeMap<i64, Order>,
  order_items: Vec<OrderItem>,
  last_user_id: i64,
  last_product_id: i64,
  last_order_id: i64,
  last_order_item_id: i64,
}

fn next_id(last: &mut i64) -> i64 {
  *last += 1;
  *last
}

struct Shared {
  tables: Mutex<Tables>,
  row_locks: Mutex<HashMap<i64, Arc<RowMutex<()>>>>,
  sessions: Arc<Semaphore>,
  acquire_timeout: Duration,
  lock_timeout: Duration,
}

impl Shared {
  /// Returns the lock of a product row, creating it on first use.
  fn row_lock(&self, product_id: i64) -> Arc<RowMutex<()>> {
    self
      .row_locks
      .lock()
      .entry(product_id)
      .or_insert_with(|| Arc::new(RowMutex::new(())))
      .clone()
  }

  /// Waits up to `lock_timeout` for a product row.
  async fn lock_row(&self, product_id: i64) -> Result<OwnedMutexGuard<()>> {
    tokio::time::timeout(self.lock_timeout, self.row_lock(product_id).lock_owned())
      .await
      .map_err(|_| {
        warn!(product_id, timeout = ?self.lock_timeout, "Row lock wait timed out.");
        AppError::transaction(
          format!("lock product {}", product_id),
          anyhow!("lock wait timed out after {:?}", self.lock_timeout),
        )
      })
  }

  /// Drops row locks nobody holds or waits on.
  fn prune_rows(&self, product_ids: impl IntoIterator<Item = i64>) {
    let mut row_locks = self.row_locks.lock();
    for product_id in product_ids {
      if row_locks.get(&product_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
        row_locks.remove(&product_id);
      }
    }
  }
}

#[derive(Clone)]
pub struct MemoryStore {
  shared: Arc<Shared>,
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new(10, Duration::from_secs(5), Duration::from_secs(5))
  }
}

impl MemoryStore {
  pub fn new(max_sessions: usize, acquire_timeout: Duration, lock_timeout: Duration) -> Self {
    Self {
      shared: Arc::new(Shared {
        tables: Mutex::new(Tables::default()),
        row_locks: Mutex::new(HashMap::new()),
        sessions: Arc::new(Semaphore::new(max_sessions)),
        acquire_timeout,
        lock_timeout,
      }),
    }
  }

  pub fn from_config(config: &AppConfig) -> Self {
    Self::new(
      config.db_max_connections as usize,
      config.db_acquire_timeout,
      config.lock_timeout,
    )
  }

  /// Inserts or replaces a user row, keeping its id.
  pub fn put_user(&self, user: User) {
    let mut tables = self.shared.tables.lock();
    tables.last_user_id = tables.last_user_id.max(user.user_id);
    tables.users.insert(user.user_id, user);
  }

  /// Inserts or replaces a product row, keeping its id.
  pub fn put_product(&self, product: Product) {
    let mut tables = self.shared.tables.lock();
    tables.last_product_id = tables.last_product_id.max(product.product_id);
    tables.products.insert(product.product_id, product);
  }

  /// Committed state of one product.
  pub fn product(&self, product_id: i64) -> Option<Product> {
    self.shared.tables.lock().products.get(&product_id).cloned()
  }

  /// Committed orders, in id order.
  pub fn orders(&self) -> Vec<Order> {
    self.shared.tables.lock().orders.values().cloned().collect()
  }

  /// Committed order items, in insertion order.
  pub fn order_items(&self) -> Vec<OrderItem> {
    self.shared.tables.lock().order_items.clone()
  }

  /// Sessions not currently held by a unit of work.
  pub fn idle_sessions(&self) -> usize {
    self.shared.sessions.available_permits()
  }
}

#[async_trait]
impl TransactionalStore for MemoryStore {
  async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
    let session = tokio::time::timeout(self.shared.acquire_timeout, self.shared.sessions.clone().acquire_owned())
      .await
      .map_err(|_| {
        warn!(timeout = ?self.shared.acquire_timeout, "Session pool exhausted.");
        AppError::transaction("begin a transaction", anyhow!("timed out waiting for a free session"))
      })?
      .map_err(|e| AppError::transaction("begin a transaction", e))?;

    Ok(Box::new(MemoryUnitOfWork {
      shared: self.shared.clone(),
      held_rows: HashMap::new(),
      staged_orders: Vec::new(),
      staged_items: Vec::new(),
      staged_stock: HashMap::new(),
      _session: session,
    }))
  }
}

pub struct MemoryUnitOfWork {
  shared: Arc<Shared>,
  held_rows: HashMap<i64, OwnedMutexGuard<()>>,
  staged_orders: Vec<Order>,
  staged_items: Vec<OrderItem>,
  // Post-decrement stock of products touched by this unit of work.
  staged_stock: HashMap<i64, i32>,
  // Declared last so row locks are released before the session goes back to the pool.
  _session: OwnedSemaphorePermit,
}

impl MemoryUnitOfWork {
  async fn acquire_row(&mut self, product_id: i64) -> Result<()> {
    if self.held_rows.contains_key(&product_id) {
      return Ok(());
    }
    let guard = self.shared.lock_row(product_id).await?;
    debug!(product_id, "Row lock acquired.");
    self.held_rows.insert(product_id, guard);
    Ok(())
  }

  fn current_stock(&self, tables: &Tables, product_id: i64) -> Option<i32> {
    let committed = tables.products.get(&product_id)?.stock_quantity;
    Some(self.staged_stock.get(&product_id).copied().unwrap_or(committed))
  }
}

impl Drop for MemoryUnitOfWork {
  fn drop(&mut self) {
    let released: Vec<i64> = self.held_rows.drain().map(|(product_id, _guard)| product_id).collect();
    self.shared.prune_rows(released);
  }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
  async fn insert_order(&mut self, order: &NewOrder) -> Result<i64> {
    let mut tables = self.shared.tables.lock();
    if !tables.users.contains_key(&order.buyer_user_id) {
      return Err(AppError::transaction(
        "insert the order",
        anyhow!("foreign key violation: buyer {} does not exist", order.buyer_user_id),
      ));
    }
    // Ids are consumed even if the transaction later rolls back, like a sequence.
    let order_id = next_id(&mut tables.last_order_id);
    self.staged_orders.push(Order {
      order_id,
      buyer_user_id: order.buyer_user_id,
      total_amount: order.total_amount,
      status: OrderStatus::Pending,
      shipping_address: order.shipping_address.clone(),
      phone_number: order.phone_number.clone(),
      order_date: Utc::now(),
    });
    Ok(order_id)
  }

  async fn lock_product(&mut self, product_id: i64) -> Result<Option<LockedProduct>> {
    self.acquire_row(product_id).await?;
    let tables = self.shared.tables.lock();
    let locked = tables.products.get(&product_id).map(|product| LockedProduct {
      product_id,
      product_name: product.product_name.clone(),
      stock_quantity: self.current_stock(&tables, product_id).unwrap_or(product.stock_quantity),
    });
    Ok(locked)
  }

  async fn insert_order_item(&mut self, order_id: i64, item: &NewOrderItem) -> Result<()> {
    if !self.staged_orders.iter().any(|o| o.order_id == order_id) {
      return Err(AppError::transaction(
        format!("insert an item for product {}", item.product_id),
        anyhow!("foreign key violation: order {} does not exist", order_id),
      ));
    }
    let mut tables = self.shared.tables.lock();
    if !tables.products.contains_key(&item.product_id) {
      return Err(AppError::transaction(
        format!("insert an item for product {}", item.product_id),
        anyhow!("foreign key violation: product {} does not exist", item.product_id),
      ));
    }
    let order_item_id = next_id(&mut tables.last_order_item_id);
    self.staged_items.push(OrderItem {
      order_item_id,
      order_id,
      product_id: item.product_id,
      quantity: item.quantity,
      price_at_ordertime: item.price_at_ordertime,
    });
    Ok(())
  }

  async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> Result<()> {
    // An UPDATE takes the row lock itself if the caller has not.
    self.acquire_row(product_id).await?;
    let tables = self.shared.tables.lock();
    let Some(current) = self.current_stock(&tables, product_id) else {
      // UPDATE ... WHERE product_id = $1 on a missing row affects nothing.
      return Ok(());
    };
    let remaining = current - quantity;
    if remaining < 0 {
      return Err(AppError::transaction(
        format!("decrement stock of product {}", product_id),
        anyhow!("check constraint violation: stock_quantity would become {}", remaining),
      ));
    }
    drop(tables);
    self.staged_stock.insert(product_id, remaining);
    Ok(())
  }

  async fn commit(self: Box<Self>) -> Result<()> {
    let mut this = *self;
    {
      let mut tables = this.shared.tables.lock();
      let missing = this
        .staged_items
        .iter()
        .map(|item| item.product_id)
        .chain(this.staged_stock.keys().copied())
        .find(|product_id| !tables.products.contains_key(product_id));
      if let Some(product_id) = missing {
        return Err(AppError::transaction(
          "commit the unit of work",
          anyhow!("product {} no longer exists", product_id),
        ));
      }
      for order in this.staged_orders.drain(..) {
        tables.orders.insert(order.order_id, order);
      }
      tables.order_items.append(&mut this.staged_items);
      for (product_id, stock) in this.staged_stock.drain() {
        if let Some(product) = tables.products.get_mut(&product_id) {
          product.stock_quantity = stock;
        }
      }
    }
    debug!(released_rows = this.held_rows.len(), "Memory unit of work committed.");
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> Result<()> {
    debug!(
      discarded_orders = self.staged_orders.len(),
      discarded_items = self.staged_items.len(),
      "Memory unit of work rolled back."
    );
    Ok(())
  }
}

#[async_trait]
impl OrderRepository for MemoryStore {
  async fn list_orders(&self) -> Result<Vec<OrderSummary>> {
    let tables = self.shared.tables.lock();
    let mut orders: Vec<OrderSummary> = tables
      .orders
      .values()
      .filter_map(|o| {
        let buyer = tables.users.get(&o.buyer_user_id)?;
        Some(OrderSummary {
          order_id: o.order_id,
          buyer_name: buyer.user_name.clone(),
          order_date: o.order_date,
          total_amount: o.total_amount,
          status: o.status,
        })
      })
      .collect();
    orders.sort_by(|a, b| (b.order_date, b.order_id).cmp(&(a.order_date, a.order_id)));
    Ok(orders)
  }

  async fn find_order(&self, order_id: i64) -> Result<Option<OrderDetail>> {
    let tables = self.shared.tables.lock();
    let detail = tables.orders.get(&order_id).and_then(|o| {
      let buyer = tables.users.get(&o.buyer_user_id)?;
      Some(OrderDetail {
        order_id: o.order_id,
        order_date: o.order_date,
        total_amount: o.total_amount,
        status: o.status,
        shipping_address: o.shipping_address.clone(),
        phone_number: o.phone_number.clone(),
        buyer_name: buyer.user_name.clone(),
        buyer_email: buyer.email.clone(),
      })
    });
    Ok(detail)
  }

  async fn order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>> {
    let tables = self.shared.tables.lock();
    let lines = tables
      .order_items
      .iter()
      .filter(|item| item.order_id == order_id)
      .filter_map(|item| {
        let product = tables.products.get(&item.product_id)?;
        Some(OrderLine {
          product_id: item.product_id,
          product_name: product.product_name.clone(),
          quantity: item.quantity,
          price_at_ordertime: item.price_at_ordertime,
        })
      })
      .collect();
    Ok(lines)
  }

  async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> Result<()> {
    let mut tables = self.shared.tables.lock();
    match tables.orders.get_mut(&order_id) {
      Some(order) => {
        order.status = status;
        Ok(())
      }
      None => Err(AppError::NotFound("Order not found".to_string())),
    }
  }

  async fn orders_for_buyer(&self, buyer_user_id: i64) -> Result<Vec<CustomerOrder>> {
    let tables = self.shared.tables.lock();
    let mut orders: Vec<CustomerOrder> = tables
      .orders
      .values()
      .filter(|o| o.buyer_user_id == buyer_user_id)
      .map(|o| CustomerOrder {
        order_id: o.order_id,
        order_date: o.order_date,
        total_amount: o.total_amount,
        status: o.status,
      })
      .collect();
    orders.sort_by(|a, b| (b.order_date, b.order_id).cmp(&(a.order_date, a.order_id)));
    Ok(orders)
  }
}

#[async_trait]
impl ProductRepository for MemoryStore {
  async fn list_products(&self) -> Result<Vec<Product>> {
    Ok(self.shared.tables.lock().products.values().cloned().collect())
  }

  async fn find_product(&self, product_id: i64) -> Result<Option<Product>> {
    Ok(self.product(product_id))
  }

  async fn orders_for_product(&self, product_id: i64) -> Result<Vec<ProductOrder>> {
    let tables = self.shared.tables.lock();
    let mut orders: Vec<ProductOrder> = tables
      .order_items
      .iter()
      .filter(|item| item.product_id == product_id)
      .filter_map(|item| {
        let order = tables.orders.get(&item.order_id)?;
        let buyer = tables.users.get(&order.buyer_user_id)?;
        Some(ProductOrder {
          order_id: order.order_id,
          buyer_name: buyer.user_name.clone(),
          order_date: order.order_date,
          quantity: item.quantity,
          price_at_ordertime: item.price_at_ordertime,
        })
      })
      .collect();
    orders.sort_by(|a, b| (b.order_date, b.order_id).cmp(&(a.order_date, a.order_id)));
    Ok(orders)
  }

  async fn create_product(&self, product: &NewProduct) -> Result<i64> {
    let mut tables = self.shared.tables.lock();
    if !tables.users.contains_key(&product.seller_user_id) {
      return Err(AppError::Validation(format!(
        "Seller {} does not exist.",
        product.seller_user_id
      )));
    }
    let product_id = next_id(&mut tables.last_product_id);
    tables.products.insert(
      product_id,
      Product {
        product_id,
        product_name: product.product_name.clone(),
        price: product.price,
        stock_quantity: product.stock_quantity,
        is_available: product.is_available,
        img_url: product.img_url.clone(),
        category_id: Some(product.category_id),
        seller_user_id: Some(product.seller_user_id),
      },
    );
    Ok(product_id)
  }

  async fn update_product(&self, product_id: i64, changes: &ProductChanges) -> Result<()> {
    let _row = self.shared.lock_row(product_id).await?;
    let mut tables = self.shared.tables.lock();
    let product = tables
      .products
      .get_mut(&product_id)
      .ok_or_else(|| AppError::NotFound(format!("Product with ID {} not found.", product_id)))?;
    if let Some(name) = &changes.product_name {
      product.product_name = name.clone();
    }
    if let Some(price) = changes.price {
      product.price = price;
    }
    if let Some(stock) = changes.stock_quantity {
      product.stock_quantity = stock;
    }
    Ok(())
  }

  async fn delete_product(&self, product_id: i64) -> Result<()> {
    let row = self.shared.lock_row(product_id).await?;
    {
      let mut tables = self.shared.tables.lock();
      if !tables.products.contains_key(&product_id) {
        return Err(AppError::NotFound(format!("Product with ID {} not found.", product_id)));
      }
      if tables.order_items.iter().any(|item| item.product_id == product_id) {
        return Err(AppError::Conflict(format!(
          "Product with ID {} is referenced by existing orders.",
          product_id
        )));
      }
      tables.products.remove(&product_id);
    }
    drop(row);
    self.shared.prune_rows([product_id]);
    Ok(())
  }
}

#[async_trait]
impl UserRepository for MemoryStore {
  async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
    let tables = self.shared.tables.lock();
    Ok(tables.users.values().find(|u| u.email == email).cloned())
  }

  async fn create_user(&self, user: &NewUser) -> Result<i64> {
    let mut tables = self.shared.tables.lock();
    if tables.users.values().any(|u| u.email == user.email) {
      return Err(AppError::Conflict("User already exists".to_string()));
    }
    let user_id = next_id(&mut tables.last_user_id);
    tables.users.insert(
      user_id,
      User {
        user_id,
        user_name: user.user_name.clone(),
        email: user.email.clone(),
        password_hash: user.password_hash.clone(),
        phone_number: user.phone_number.clone(),
        address: user.address.clone(),
        user_type: user.user_type,
        created_at: Utc::now(),
      },
    );
    Ok(user_id)
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn ping(&self) -> bool {
    true
  }
}
