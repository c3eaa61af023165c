// storefront/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::{NewOrder, NewOrderItem, OrderStatus};
use crate::services::order_service;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

// --- Request DTOs ---

// Required fields are optional here so that a missing one is reported as a
// validation error with a readable message rather than a serde failure.
#[derive(Deserialize, Debug)]
pub struct CreateOrderPayload {
  pub buyer_user_id: Option<i64>,
  pub total_amount: Option<Decimal>,
  pub shipping_address: Option<String>,
  pub phone_number: Option<String>,
  pub items: Option<Vec<OrderItemPayload>>,
}

#[derive(Deserialize, Debug)]
pub struct OrderItemPayload {
  pub product_id: i64,
  pub quantity: i32,
  pub price_at_ordertime: Decimal,
}

impl TryFrom<CreateOrderPayload> for NewOrder {
  type Error = AppError;

  fn try_from(payload: CreateOrderPayload) -> Result<Self, Self::Error> {
    let (Some(buyer_user_id), Some(total_amount), Some(items)) =
      (payload.buyer_user_id, payload.total_amount, payload.items)
    else {
      return Err(AppError::Validation("Missing required order data.".to_string()));
    };

    let order = NewOrder {
      buyer_user_id,
      total_amount,
      shipping_address: payload.shipping_address.unwrap_or_default(),
      phone_number: payload.phone_number.filter(|p| !p.trim().is_empty()),
      items: items
        .into_iter()
        .map(|item| NewOrderItem {
          product_id: item.product_id,
          quantity: item.quantity,
          price_at_ordertime: item.price_at_ordertime,
        })
        .collect(),
    };
    order.validate()?;
    Ok(order)
  }
}

#[derive(Deserialize, Debug)]
pub struct UpdateOrderPayload {
  pub status: Option<OrderStatus>,
}

// --- Handler Implementations ---

#[instrument(name = "handler::create_order", skip(app_state, payload, caller), fields(caller_id = caller.user_id))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CreateOrderPayload>,
  caller: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let new_order = NewOrder::try_from(payload.into_inner())?;
  if new_order.buyer_user_id != caller.user_id {
    info!(
      buyer_user_id = new_order.buyer_user_id,
      "Order placed on behalf of another buyer."
    );
  }

  let created = order_service::create_order(app_state.store.as_ref(), &new_order).await?;
  info!(order_id = created.order_id, "Order created.");
  Ok(HttpResponse::Created().json(created))
}

#[instrument(name = "handler::list_orders", skip(app_state, caller))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  caller: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  caller.require_admin()?;
  let orders = app_state.store.list_orders().await?;
  info!("Fetched {} orders.", orders.len());
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::get_order", skip(app_state, path, _caller), fields(order_id = %path.as_ref()))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i64>,
  _caller: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  match app_state.store.find_order(order_id).await? {
    Some(order) => Ok(HttpResponse::Ok().json(order)),
    None => {
      warn!("Order {} not found.", order_id);
      Err(AppError::NotFound("Order not found".to_string()))
    }
  }
}

#[instrument(name = "handler::get_order_items", skip(app_state, path, _caller), fields(order_id = %path.as_ref()))]
pub async fn get_order_items_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i64>,
  _caller: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let lines = app_state.store.order_lines(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(lines))
}

#[instrument(name = "handler::update_order", skip(app_state, path, payload, caller), fields(order_id = %path.as_ref()))]
pub async fn update_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i64>,
  payload: web::Json<UpdateOrderPayload>,
  caller: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  caller.require_admin()?;
  let status = payload
    .into_inner()
    .status
    .ok_or_else(|| AppError::Validation("Missing order status.".to_string()))?;

  let order_id = path.into_inner();
  app_state.store.update_order_status(order_id, status).await?;
  info!(?status, "Order {} status updated.", order_id);
  Ok(HttpResponse::Ok().json(json!({ "message": "Order status updated successfully" })))
}

#[instrument(name = "handler::customer_orders", skip(app_state, path, caller), fields(buyer_user_id = %path.as_ref()))]
pub async fn customer_orders_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i64>,
  caller: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let buyer_user_id = path.into_inner();
  caller.require_self_or_admin(buyer_user_id)?;
  let orders = app_state.store.orders_for_buyer(buyer_user_id).await?;
  Ok(HttpResponse::Ok().json(orders))
}
