// storefront/src/services/order_service.rs

//! Atomic order placement.

use tracing::{error, info, instrument, warn};

use crate::db::{TransactionalStore, UnitOfWork};
use crate::errors::{AppError, Result};
use crate::models::{NewOrder, OrderCreated};

/// Creates an order, its line items and the matching stock decrements as one
/// transaction.
///
/// Items are processed in the order the caller supplied them. For each one the
/// product row is read under a write lock, so concurrent orders touching the same
/// product serialise on its stock instead of both seeing the old value.
///
/// Any failure (validation, missing product, insufficient stock, data-access
/// fault) rolls the whole transaction back and is returned as-is. The session is
/// released on every path: the unit of work is consumed by `commit`/`rollback`,
/// or dropped if one of those fails.
///
/// `total_amount` and `price_at_ordertime` are stored as supplied.
#[instrument(
  name = "order_service::create_order",
  skip(store, order),
  fields(buyer_user_id = order.buyer_user_id, item_count = order.items.len()),
  err(Display)
)]
pub async fn create_order<S>(store: &S, order: &NewOrder) -> Result<OrderCreated>
where
  S: TransactionalStore + ?Sized,
{
  order.validate()?;

  let items_total = order.items_total();
  if items_total != order.total_amount {
    warn!(
      supplied_total = %order.total_amount,
      %items_total,
      "Supplied total_amount differs from the sum of its items; storing it unchanged."
    );
  }

  let mut uow = store.begin().await?;
  match write_order(uow.as_mut(), order).await {
    Ok(order_id) => {
      uow.commit().await?;
      info!(order_id, "Order committed.");
      Ok(OrderCreated {
        message: "Order created successfully!".to_string(),
        order_id,
      })
    }
    Err(err) => {
      warn!(error = %err, "Order transaction failed, rolling back.");
      if let Err(rollback_err) = uow.rollback().await {
        // The session is dropped regardless, which discards the transaction.
        error!(error = %rollback_err, "Explicit rollback failed.");
      }
      Err(err)
    }
  }
}

async fn write_order(uow: &mut dyn UnitOfWork, order: &NewOrder) -> Result<i64> {
  let order_id = uow.insert_order(order).await?;

  for item in &order.items {
    let product = uow
      .lock_product(item.product_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("Product with ID {} not found.", item.product_id)))?;

    if product.stock_quantity < item.quantity {
      return Err(AppError::OutOfStock {
        product_id: product.product_id,
        product_name: product.product_name,
        requested: item.quantity,
        available: product.stock_quantity,
      });
    }

    uow.insert_order_item(order_id, item).await?;
    uow.decrement_stock(item.product_id, item.quantity).await?;
  }

  Ok(order_id)
}
