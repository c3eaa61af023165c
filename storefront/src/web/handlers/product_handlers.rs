// storefront/src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::{NewProduct, ProductChanges, UserType};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

// --- Request DTOs ---

#[derive(Deserialize, Debug)]
pub struct CreateProductPayload {
  pub product_name: Option<String>,
  pub price: Option<Decimal>,
  pub stock_quantity: Option<i32>,
  pub is_available: Option<bool>,
  pub img_url: Option<String>,
  pub category_id: Option<i64>,
  pub seller_user_id: Option<i64>,
}

impl TryFrom<CreateProductPayload> for NewProduct {
  type Error = AppError;

  fn try_from(payload: CreateProductPayload) -> Result<Self, Self::Error> {
    let missing = || AppError::Validation("Missing required product fields".to_string());
    let product_name = payload
      .product_name
      .map(|n| n.trim().to_string())
      .filter(|n| !n.is_empty())
      .ok_or_else(missing)?;
    let price = payload.price.ok_or_else(missing)?;
    let stock_quantity = payload.stock_quantity.ok_or_else(missing)?;
    let category_id = payload.category_id.ok_or_else(missing)?;
    let seller_user_id = payload.seller_user_id.ok_or_else(missing)?;

    if price.is_sign_negative() {
      return Err(AppError::Validation("price cannot be negative.".to_string()));
    }
    if stock_quantity < 0 {
      return Err(AppError::Validation("stock_quantity cannot be negative.".to_string()));
    }

    Ok(NewProduct {
      product_name,
      price,
      stock_quantity,
      is_available: payload.is_available.unwrap_or(true),
      img_url: payload.img_url,
      category_id,
      seller_user_id,
    })
  }
}

#[derive(Deserialize, Debug)]
pub struct UpdateProductPayload {
  pub product_name: Option<String>,
  pub price: Option<Decimal>,
  pub stock_quantity: Option<i32>,
}

impl TryFrom<UpdateProductPayload> for ProductChanges {
  type Error = AppError;

  fn try_from(payload: UpdateProductPayload) -> Result<Self, Self::Error> {
    let changes = ProductChanges {
      product_name: payload.product_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
      price: payload.price,
      stock_quantity: payload.stock_quantity,
    };
    if changes.is_empty() {
      return Err(AppError::Validation("No product data provided to update".to_string()));
    }
    if changes.price.is_some_and(|p| p.is_sign_negative()) {
      return Err(AppError::Validation("price cannot be negative.".to_string()));
    }
    if changes.stock_quantity.is_some_and(|s| s < 0) {
      return Err(AppError::Validation("stock_quantity cannot be negative.".to_string()));
    }
    Ok(changes)
  }
}

/// Sellers may only change their own listings; administrators may change any.
async fn ensure_can_manage(app_state: &AppState, caller: &AuthenticatedUser, product_id: i64) -> Result<(), AppError> {
  caller.require_seller_or_admin()?;
  if caller.user_type != UserType::Seller {
    return Ok(());
  }
  let product = app_state
    .store
    .find_product(product_id)
    .await?
    .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
  if product.seller_user_id != Some(caller.user_id) {
    warn!(product_id, owner = ?product.seller_user_id, "Seller tried to change another seller's product.");
    return Err(AppError::Forbidden("Sellers can only change their own products.".to_string()));
  }
  Ok(())
}

// --- Handler Implementations ---

#[instrument(name = "handler::list_products", skip(app_state))]
pub async fn list_products_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let products = app_state.store.list_products().await?;
  info!("Successfully fetched {} products.", products.len());
  Ok(HttpResponse::Ok().json(products))
}

#[instrument(name = "handler::get_product", skip(app_state, path), fields(product_id = %path.as_ref()))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
  let product_id = path.into_inner();
  match app_state.store.find_product(product_id).await? {
    Some(product) => Ok(HttpResponse::Ok().json(product)),
    None => {
      warn!("Product with ID {} not found.", product_id);
      Err(AppError::NotFound("Product not found".to_string()))
    }
  }
}

#[instrument(name = "handler::product_orders", skip(app_state, path), fields(product_id = %path.as_ref()))]
pub async fn product_orders_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
  // No orders is a valid answer, not a 404.
  let orders = app_state.store.orders_for_product(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(orders))
}

#[instrument(name = "handler::create_product", skip(app_state, payload, caller), fields(caller_id = caller.user_id))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CreateProductPayload>,
  caller: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  caller.require_seller_or_admin()?;
  let new_product = NewProduct::try_from(payload.into_inner())?;
  if caller.user_type == UserType::Seller && new_product.seller_user_id != caller.user_id {
    return Err(AppError::Forbidden("Sellers can only list their own products.".to_string()));
  }

  let product_id = app_state.store.create_product(&new_product).await?;
  info!(product_id, "Product created.");
  Ok(HttpResponse::Created().json(json!({
      "message": "Product created successfully",
      "productId": product_id,
  })))
}

#[instrument(name = "handler::update_product", skip(app_state, path, payload, caller), fields(product_id = %path.as_ref()))]
pub async fn update_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i64>,
  payload: web::Json<UpdateProductPayload>,
  caller: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let product_id = path.into_inner();
  let changes = ProductChanges::try_from(payload.into_inner())?;
  ensure_can_manage(&app_state, &caller, product_id).await?;
  app_state.store.update_product(product_id, &changes).await?;
  Ok(HttpResponse::Ok().json(json!({ "message": "Product updated successfully" })))
}

#[instrument(name = "handler::delete_product", skip(app_state, path, caller), fields(product_id = %path.as_ref()))]
pub async fn delete_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i64>,
  caller: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let product_id = path.into_inner();
  ensure_can_manage(&app_state, &caller, product_id).await?;
  app_state.store.delete_product(product_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "message": "Product deleted successfully" })))
}
