// storefront/src/web/routes.rs

use actix_web::{error, web, HttpResponse};
use serde_json::json;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::handlers::{auth_handlers, order_handlers, product_handlers};

// Reports whether the store answers, but never fails itself.
async fn health_check_handler(app_state: web::Data<AppState>) -> HttpResponse {
  let database = if app_state.store.ping().await {
    "Connected"
  } else {
    "Not Connected"
  };
  HttpResponse::Ok().json(json!({
      "message": "Storefront API is running",
      "database": database,
  }))
}

fn json_error_handler(err: error::JsonPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
  AppError::Validation(format!("Invalid JSON payload: {}", err)).into()
}

fn path_error_handler(err: error::PathError, _req: &actix_web::HttpRequest) -> actix_web::Error {
  AppError::Validation(format!("Invalid path parameter: {}", err)).into()
}

// Called from `main.rs` and from the integration tests to mount every route.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .app_data(web::JsonConfig::default().error_handler(json_error_handler))
    .app_data(web::PathConfig::default().error_handler(path_error_handler))
    .route("/", web::get().to(health_check_handler))
    .service(
      web::scope("/api/users")
        .route("/register", web::post().to(auth_handlers::register_handler))
        .route("/login", web::post().to(auth_handlers::login_handler)),
    )
    .service(web::scope("/api/token").route("/refresh", web::post().to(auth_handlers::refresh_token_handler)))
    .service(
      web::scope("/api/products")
        .route("", web::get().to(product_handlers::list_products_handler))
        .route("", web::post().to(product_handlers::create_product_handler))
        // Must precede "/{product_id}".
        .route(
          "/orders/{product_id}",
          web::get().to(product_handlers::product_orders_handler),
        )
        .route("/{product_id}", web::get().to(product_handlers::get_product_handler))
        .route("/{product_id}", web::put().to(product_handlers::update_product_handler))
        .route("/{product_id}", web::delete().to(product_handlers::delete_product_handler)),
    )
    .service(
      web::scope("/api/orders")
        .route("", web::post().to(order_handlers::create_order_handler))
        .route("", web::get().to(order_handlers::list_orders_handler))
        .route(
          "/customer/{buyer_user_id}",
          web::get().to(order_handlers::customer_orders_handler),
        )
        .route("/{order_id}/items", web::get().to(order_handlers::get_order_items_handler))
        .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
        .route("/{order_id}", web::put().to(order_handlers::update_order_handler)),
    );
}
