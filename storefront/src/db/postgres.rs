// storefront/src/db/postgres.rs

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info, instrument, warn};

use super::{OrderRepository, ProductRepository, Store, TransactionalStore, UnitOfWork, UserRepository};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::{
  CustomerOrder, LockedProduct, NewOrder, NewOrderItem, NewProduct, NewUser, OrderDetail, OrderLine, OrderStatus,
  OrderSummary, Product, ProductChanges, ProductOrder, User,
};

// Postgres SQLSTATE for "lock_not_available", raised when lock_timeout expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

const PRODUCT_COLUMNS: &str =
  "product_id, product_name, price, stock_quantity, is_available, img_url, category_id, seller_user_id";

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
  lock_timeout: Duration,
}

impl PgStore {
  pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
    Self { pool, lock_timeout }
  }

  /// Opens the bounded connection pool described by the config.
  pub async fn connect(config: &AppConfig) -> Result<Self> {
    let pool = PgPoolOptions::new()
      .max_connections(config.db_max_connections)
      .acquire_timeout(config.db_acquire_timeout)
      .connect(&config.database_url)
      .await
      .map_err(|e| {
        error!(error = %e, "Failed to connect to the database.");
        AppError::Sqlx(e)
      })?;
    info!(max_connections = config.db_max_connections, "Successfully connected to the database.");
    Ok(Self::new(pool, config.lock_timeout))
  }

  pub async fn run_migrations(&self) -> Result<()> {
    sqlx::migrate!("./migrations")
      .run(&self.pool)
      .await
      .map_err(|e| AppError::Internal(format!("Database migration failed: {}", e)))?;
    info!("Database migrations applied.");
    Ok(())
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }
}

/// Maps a data-access fault inside a transaction, flagging lock waits that ran out.
fn tx_fault(context: impl Into<String>) -> impl FnOnce(sqlx::Error) -> AppError {
  let context = context.into();
  move |err| {
    match &err {
      sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE) => {
        warn!(%context, "Row lock wait timed out.");
      }
      sqlx::Error::PoolTimedOut => warn!(%context, "Connection pool exhausted."),
      _ => {}
    }
    AppError::transaction(context, err)
  }
}

#[async_trait]
impl TransactionalStore for PgStore {
  #[instrument(name = "pg_store::begin", skip(self), err(Display))]
  async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
    let mut tx = self.pool.begin().await.map_err(tx_fault("begin a transaction"))?;

    // SET cannot take bind parameters; the value is an integer we format ourselves.
    let set_lock_timeout = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
    sqlx::query(&set_lock_timeout)
      .execute(&mut *tx)
      .await
      .map_err(tx_fault("set the lock timeout"))?;

    Ok(Box::new(PgUnitOfWork { tx }))
  }
}

/// A pooled connection with an open transaction. Dropping it rolls back and
/// hands the connection back to the pool.
pub struct PgUnitOfWork {
  tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
  async fn insert_order(&mut self, order: &NewOrder) -> Result<i64> {
    let (order_id,): (i64,) = sqlx::query_as(
      r#"
      INSERT INTO orders (buyer_user_id, total_amount, status, shipping_address, phone_number)
      VALUES ($1, $2, 'pending', $3, $4)
      RETURNING order_id
      "#,
    )
    .bind(order.buyer_user_id)
    .bind(order.total_amount)
    .bind(&order.shipping_address)
    .bind(&order.phone_number)
    .fetch_one(&mut *self.tx)
    .await
    .map_err(tx_fault("insert the order"))?;
    Ok(order_id)
  }

  async fn lock_product(&mut self, product_id: i64) -> Result<Option<LockedProduct>> {
    sqlx::query_as::<_, LockedProduct>(
      "SELECT product_id, product_name, stock_quantity FROM product WHERE product_id = $1 FOR UPDATE",
    )
    .bind(product_id)
    .fetch_optional(&mut *self.tx)
    .await
    .map_err(tx_fault(format!("lock product {}", product_id)))
  }

  async fn insert_order_item(&mut self, order_id: i64, item: &NewOrderItem) -> Result<()> {
    sqlx::query(
      r#"
      INSERT INTO order_item (order_id, product_id, quantity, price_at_ordertime)
      VALUES ($1, $2, $3, $4)
      "#,
    )
    .bind(order_id)
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(item.price_at_ordertime)
    .execute(&mut *self.tx)
    .await
    .map_err(tx_fault(format!("insert an item for product {}", item.product_id)))?;
    Ok(())
  }

  async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> Result<()> {
    sqlx::query("UPDATE product SET stock_quantity = stock_quantity - $1 WHERE product_id = $2")
      .bind(quantity)
      .bind(product_id)
      .execute(&mut *self.tx)
      .await
      .map_err(tx_fault(format!("decrement stock of product {}", product_id)))?;
    Ok(())
  }

  async fn commit(self: Box<Self>) -> Result<()> {
    let PgUnitOfWork { tx } = *self;
    tx.commit().await.map_err(tx_fault("commit"))
  }

  async fn rollback(self: Box<Self>) -> Result<()> {
    let PgUnitOfWork { tx } = *self;
    tx.rollback().await.map_err(tx_fault("roll back"))
  }
}

#[async_trait]
impl OrderRepository for PgStore {
  async fn list_orders(&self) -> Result<Vec<OrderSummary>> {
    let orders = sqlx::query_as::<_, OrderSummary>(
      r#"
      SELECT o.order_id, u.user_name AS buyer_name, o.order_date, o.total_amount, o.status
      FROM orders o
      INNER JOIN users u ON o.buyer_user_id = u.user_id
      ORDER BY o.order_date DESC, o.order_id DESC
      "#,
    )
    .fetch_all(&self.pool)
    .await?;
    Ok(orders)
  }

  async fn find_order(&self, order_id: i64) -> Result<Option<OrderDetail>> {
    let order = sqlx::query_as::<_, OrderDetail>(
      r#"
      SELECT o.order_id, o.order_date, o.total_amount, o.status, o.shipping_address, o.phone_number,
             u.user_name AS buyer_name, u.email AS buyer_email
      FROM orders o
      INNER JOIN users u ON o.buyer_user_id = u.user_id
      WHERE o.order_id = $1
      "#,
    )
    .bind(order_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(order)
  }

  async fn order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>> {
    let lines = sqlx::query_as::<_, OrderLine>(
      r#"
      SELECT p.product_id, p.product_name, oi.quantity, oi.price_at_ordertime
      FROM order_item oi
      INNER JOIN product p ON oi.product_id = p.product_id
      WHERE oi.order_id = $1
      ORDER BY oi.order_item_id
      "#,
    )
    .bind(order_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(lines)
  }

  async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> Result<()> {
    let result = sqlx::query("UPDATE orders SET status = $1 WHERE order_id = $2")
      .bind(status)
      .bind(order_id)
      .execute(&self.pool)
      .await?;
    if result.rows_affected() == 0 {
      return Err(AppError::NotFound("Order not found".to_string()));
    }
    Ok(())
  }

  async fn orders_for_buyer(&self, buyer_user_id: i64) -> Result<Vec<CustomerOrder>> {
    let orders = sqlx::query_as::<_, CustomerOrder>(
      r#"
      SELECT order_id, order_date, total_amount, status
      FROM orders
      WHERE buyer_user_id = $1
      ORDER BY order_date DESC, order_id DESC
      "#,
    )
    .bind(buyer_user_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(orders)
  }
}

#[async_trait]
impl ProductRepository for PgStore {
  async fn list_products(&self) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(&format!(
      "SELECT {} FROM product ORDER BY product_id",
      PRODUCT_COLUMNS
    ))
    .fetch_all(&self.pool)
    .await?;
    Ok(products)
  }

  async fn find_product(&self, product_id: i64) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
      "SELECT {} FROM product WHERE product_id = $1",
      PRODUCT_COLUMNS
    ))
    .bind(product_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(product)
  }

  async fn orders_for_product(&self, product_id: i64) -> Result<Vec<ProductOrder>> {
    let orders = sqlx::query_as::<_, ProductOrder>(
      r#"
      SELECT o.order_id, u.user_name AS buyer_name, o.order_date, oi.quantity, oi.price_at_ordertime
      FROM users u
      INNER JOIN orders o ON u.user_id = o.buyer_user_id
      INNER JOIN order_item oi ON o.order_id = oi.order_id
      WHERE oi.product_id = $1
      ORDER BY o.order_date DESC, o.order_id DESC
      "#,
    )
    .bind(product_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(orders)
  }

  async fn create_product(&self, product: &NewProduct) -> Result<i64> {
    let (product_id,): (i64,) = sqlx::query_as(
      r#"
      INSERT INTO product (product_name, price, stock_quantity, is_available, img_url, category_id, seller_user_id)
      VALUES ($1, $2, $3, $4, $5, $6, $7)
      RETURNING product_id
      "#,
    )
    .bind(&product.product_name)
    .bind(product.price)
    .bind(product.stock_quantity)
    .bind(product.is_available)
    .bind(&product.img_url)
    .bind(product.category_id)
    .bind(product.seller_user_id)
    .fetch_one(&self.pool)
    .await
    .map_err(|e| match e {
      sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
        AppError::Validation(format!("Seller {} does not exist.", product.seller_user_id))
      }
      other => AppError::Sqlx(other),
    })?;
    Ok(product_id)
  }

  async fn update_product(&self, product_id: i64, changes: &ProductChanges) -> Result<()> {
    let result = sqlx::query(
      r#"
      UPDATE product
      SET product_name = COALESCE($1, product_name),
          price = COALESCE($2, price),
          stock_quantity = COALESCE($3, stock_quantity)
      WHERE product_id = $4
      "#,
    )
    .bind(&changes.product_name)
    .bind(changes.price)
    .bind(changes.stock_quantity)
    .bind(product_id)
    .execute(&self.pool)
    .await?;
    if result.rows_affected() == 0 {
      return Err(AppError::NotFound(format!("Product with ID {} not found.", product_id)));
    }
    Ok(())
  }

  async fn delete_product(&self, product_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM product WHERE product_id = $1")
      .bind(product_id)
      .execute(&self.pool)
      .await
      .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => AppError::Conflict(format!(
          "Product with ID {} is referenced by existing orders.",
          product_id
        )),
        other => AppError::Sqlx(other),
      })?;
    if result.rows_affected() == 0 {
      return Err(AppError::NotFound(format!("Product with ID {} not found.", product_id)));
    }
    Ok(())
  }
}

#[async_trait]
impl UserRepository for PgStore {
  async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
      r#"
      SELECT user_id, user_name, email, password_hash, phone_number, address, user_type, created_at
      FROM users
      WHERE email = $1
      "#,
    )
    .bind(email)
    .fetch_optional(&self.pool)
    .await?;
    Ok(user)
  }

  async fn create_user(&self, user: &NewUser) -> Result<i64> {
    let (user_id,): (i64,) = sqlx::query_as(
      r#"
      INSERT INTO users (user_name, email, password_hash, phone_number, address, user_type)
      VALUES ($1, $2, $3, $4, $5, $6)
      RETURNING user_id
      "#,
    )
    .bind(&user.user_name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.phone_number)
    .bind(&user.address)
    .bind(user.user_type)
    .fetch_one(&self.pool)
    .await
    .map_err(|e| match e {
      sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
        AppError::Conflict("User already exists".to_string())
      }
      other => AppError::Sqlx(other),
    })?;
    Ok(user_id)
  }
}

#[async_trait]
impl Store for PgStore {
  async fn ping(&self) -> bool {
    sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
  }
}
