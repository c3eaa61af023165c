// tests/api_tests.rs
mod common;
use common::*;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use serde_json::{json, Value};

use storefront::models::UserType;
use storefront::web::configure_app_routes;

macro_rules! init_app {
  ($store:expr) => {
    test::init_service(
      App::new()
        .app_data(web::Data::new(app_state($store)))
        .configure(configure_app_routes),
    )
    .await
  };
}

fn widget_order(buyer_user_id: i64, quantity: i32) -> Value {
  json!({
      "buyer_user_id": buyer_user_id,
      "total_amount": format!("{}", money(1250) * rust_decimal::Decimal::from(quantity)),
      "shipping_address": "1 Test Street",
      "phone_number": "555-0100",
      "items": [{ "product_id": WIDGET_ID, "quantity": quantity, "price_at_ordertime": "12.50" }],
  })
}

#[actix_web::test]
async fn health_check_reports_database() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);

  let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["database"], "Connected");
}

#[actix_web::test]
async fn create_order_returns_201_and_decrements_stock() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header((header::AUTHORIZATION, bearer(BUYER_ID, UserType::Buyer)))
    .set_json(widget_order(BUYER_ID, 2))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::CREATED);

  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["message"], "Order created successfully!");
  assert!(body["orderId"].as_i64().is_some());
  assert_eq!(store.product(WIDGET_ID).unwrap().stock_quantity, 3);
}

#[actix_web::test]
async fn create_order_out_of_stock_is_400_and_names_the_product() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header((header::AUTHORIZATION, bearer(BUYER_ID, UserType::Buyer)))
    .set_json(widget_order(BUYER_ID, 6))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["code"], "out_of_stock");
  assert!(body["message"].as_str().unwrap().contains("Widget"));
  assert_eq!(store.product(WIDGET_ID).unwrap().stock_quantity, 5);
  assert!(store.orders().is_empty());
}

#[actix_web::test]
async fn create_order_validation_errors_are_400() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);
  let auth = bearer(BUYER_ID, UserType::Buyer);

  let missing_items = json!({ "buyer_user_id": BUYER_ID, "total_amount": "1.00", "shipping_address": "x" });
  let empty_items = json!({ "buyer_user_id": BUYER_ID, "total_amount": "1.00", "shipping_address": "x", "items": [] });
  let zero_quantity = json!({
      "buyer_user_id": BUYER_ID, "total_amount": "1.00", "shipping_address": "x",
      "items": [{ "product_id": WIDGET_ID, "quantity": 0, "price_at_ordertime": "1.00" }],
  });
  let sub_cent_price = json!({
      "buyer_user_id": BUYER_ID, "total_amount": "12.51", "shipping_address": "x",
      "items": [{ "product_id": WIDGET_ID, "quantity": 1, "price_at_ordertime": "12.505" }],
  });

  for (payload, expected) in [
    (missing_items, "Missing required order data."),
    (empty_items, "Items array cannot be empty."),
    (zero_quantity, "items[0].quantity must be a positive integer."),
    (sub_cent_price, "items[0].price_at_ordertime cannot have more than two decimal places."),
  ] {
    let req = test::TestRequest::post()
      .uri("/api/orders")
      .insert_header((header::AUTHORIZATION, auth.clone()))
      .set_json(payload)
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], expected);
    assert_eq!(body["code"], "validation_error");
  }
  assert!(store.orders().is_empty());
}

#[actix_web::test]
async fn malformed_json_is_400() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header((header::AUTHORIZATION, bearer(BUYER_ID, UserType::Buyer)))
    .insert_header((header::CONTENT_TYPE, "application/json"))
    .set_payload("{not json")
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_product_is_404() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header((header::AUTHORIZATION, bearer(BUYER_ID, UserType::Buyer)))
    .set_json(json!({
        "buyer_user_id": BUYER_ID, "total_amount": "1.00", "shipping_address": "x",
        "items": [{ "product_id": 4040, "quantity": 1, "price_at_ordertime": "1.00" }],
    }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn transaction_failure_is_500_with_error_id() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header((header::AUTHORIZATION, bearer(BUYER_ID, UserType::Buyer)))
    .set_json(widget_order(31337, 1))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["code"], "transaction_failure");
  assert!(body["errorId"].as_str().is_some());
  assert_eq!(store.product(WIDGET_ID).unwrap().stock_quantity, 5);
}

#[actix_web::test]
async fn order_routes_require_a_token() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .set_json(widget_order(BUYER_ID, 1))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

  let req = test::TestRequest::get()
    .uri("/api/orders")
    .insert_header((header::AUTHORIZATION, "Bearer not-a-token"))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(store.product(WIDGET_ID).unwrap().stock_quantity, 5);
}

#[actix_web::test]
async fn order_listing_and_status_updates_are_admin_only() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);
  let buyer = bearer(BUYER_ID, UserType::Buyer);
  let admin = bearer(ADMIN_ID, UserType::Admin);

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header((header::AUTHORIZATION, buyer.clone()))
    .set_json(widget_order(BUYER_ID, 1))
    .to_request();
  let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
  let order_id = created["orderId"].as_i64().unwrap();

  let req = test::TestRequest::get()
    .uri("/api/orders")
    .insert_header((header::AUTHORIZATION, buyer.clone()))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

  let req = test::TestRequest::get()
    .uri("/api/orders")
    .insert_header((header::AUTHORIZATION, admin.clone()))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let list: Value = test::read_body_json(resp).await;
  assert_eq!(list[0]["order_id"], order_id);
  assert_eq!(list[0]["buyer_name"], "Ada");

  let req = test::TestRequest::put()
    .uri(&format!("/api/orders/{}", order_id))
    .insert_header((header::AUTHORIZATION, buyer))
    .set_json(json!({ "status": "shipped" }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

  let req = test::TestRequest::put()
    .uri(&format!("/api/orders/{}", order_id))
    .insert_header((header::AUTHORIZATION, admin.clone()))
    .set_json(json!({ "status": "shipped" }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["message"], "Order status updated successfully");

  let req = test::TestRequest::get()
    .uri(&format!("/api/orders/{}", order_id))
    .insert_header((header::AUTHORIZATION, admin.clone()))
    .to_request();
  let detail: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(detail["status"], "shipped");
  assert_eq!(detail["buyer_email"], "ada@example.com");

  let req = test::TestRequest::put()
    .uri("/api/orders/424242")
    .insert_header((header::AUTHORIZATION, admin.clone()))
    .set_json(json!({ "status": "shipped" }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

  let req = test::TestRequest::put()
    .uri(&format!("/api/orders/{}", order_id))
    .insert_header((header::AUTHORIZATION, admin))
    .set_json(json!({ "status": "lost" }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn order_detail_items_and_customer_history() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);
  let buyer = bearer(BUYER_ID, UserType::Buyer);

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header((header::AUTHORIZATION, buyer.clone()))
    .set_json(widget_order(BUYER_ID, 1))
    .to_request();
  let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
  let order_id = created["orderId"].as_i64().unwrap();

  let req = test::TestRequest::get()
    .uri(&format!("/api/orders/{}/items", order_id))
    .insert_header((header::AUTHORIZATION, buyer.clone()))
    .to_request();
  let lines: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(lines[0]["product_name"], "Widget");
  assert_eq!(lines[0]["quantity"], 1);

  let fetch_detail = || {
    test::TestRequest::get()
      .uri(&format!("/api/orders/{}", order_id))
      .insert_header((header::AUTHORIZATION, buyer.clone()))
      .to_request()
  };
  let resp = test::call_service(&app, fetch_detail()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let detail: Value = test::read_body_json(resp).await;
  let again: Value = test::read_body_json(test::call_service(&app, fetch_detail()).await).await;
  assert_eq!(detail, again);
  assert_eq!(detail["order_id"], order_id);

  let req = test::TestRequest::get()
    .uri("/api/orders/999999")
    .insert_header((header::AUTHORIZATION, buyer.clone()))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["message"], "Order not found");

  let req = test::TestRequest::get()
    .uri(&format!("/api/orders/customer/{}", BUYER_ID))
    .insert_header((header::AUTHORIZATION, buyer.clone()))
    .to_request();
  let history: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(history.as_array().unwrap().len(), 1);
  assert_eq!(history[0]["order_id"], order_id);

  let req = test::TestRequest::get()
    .uri(&format!("/api/orders/customer/{}", OTHER_BUYER_ID))
    .insert_header((header::AUTHORIZATION, buyer))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn register_login_and_refresh() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);

  let req = test::TestRequest::post()
    .uri("/api/users/register")
    .set_json(json!({
        "user_name": "Carol",
        "email": "Carol@Example.com",
        "password": "s3cret-pass",
        "address": "9 Elm Road",
    }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let registered: Value = test::read_body_json(resp).await;
  let user_id = registered["userId"].as_i64().unwrap();

  let req = test::TestRequest::post()
    .uri("/api/users/register")
    .set_json(json!({ "user_name": "Carol", "email": "carol@example.com", "password": "x" }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

  let req = test::TestRequest::post()
    .uri("/api/users/register")
    .set_json(json!({ "email": "dave@example.com" }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

  let req = test::TestRequest::post()
    .uri("/api/users/login")
    .set_json(json!({ "email": "carol@example.com", "password": "wrong" }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

  let req = test::TestRequest::post()
    .uri("/api/users/login")
    .set_json(json!({ "email": "carol@example.com", "password": "s3cret-pass" }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let login: Value = test::read_body_json(resp).await;
  assert_eq!(login["message"], "Login successful");
  assert_eq!(login["user"]["id"], user_id);
  assert_eq!(login["user"]["type"], "buyer");
  let token = login["user"]["token"].as_str().unwrap().to_string();
  let refresh_token = login["user"]["refreshToken"].as_str().unwrap().to_string();

  // The issued access token works against a protected route.
  let req = test::TestRequest::get()
    .uri(&format!("/api/orders/customer/{}", user_id))
    .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

  let req = test::TestRequest::post()
    .uri("/api/token/refresh")
    .set_json(json!({ "refreshToken": refresh_token }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let pair: Value = test::read_body_json(resp).await;
  assert!(pair["token"].as_str().is_some());
  assert!(pair["refreshToken"].as_str().is_some());

  // An access token is not accepted as a refresh token.
  let req = test::TestRequest::post()
    .uri("/api/token/refresh")
    .set_json(json!({ "refreshToken": token }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn seeded_user_can_log_in() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);

  let req = test::TestRequest::post()
    .uri("/api/users/login")
    .set_json(json!({ "email": "ada@example.com", "password": PASSWORD }))
    .to_request();
  let login: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(login["user"]["id"], BUYER_ID);
}

#[actix_web::test]
async fn product_catalog_reads() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);

  let req = test::TestRequest::get().uri("/api/products").to_request();
  let products: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(products.as_array().unwrap().len(), 3);

  let req = test::TestRequest::get().uri(&format!("/api/products/{}", WIDGET_ID)).to_request();
  let widget: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(widget["product_name"], "Widget");
  assert_eq!(widget["stock_quantity"], 5);

  let req = test::TestRequest::get().uri("/api/products/777").to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

  let req = test::TestRequest::get().uri("/api/products/abc").to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

  let req = test::TestRequest::get()
    .uri(&format!("/api/products/orders/{}", WIDGET_ID))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let orders: Value = test::read_body_json(resp).await;
  assert!(orders.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn product_writes_need_a_seller_or_admin() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);
  let seller = bearer(SELLER_ID, UserType::Seller);
  let new_product = json!({
      "product_name": "Sprocket",
      "price": "7.25",
      "stock_quantity": 12,
      "category_id": 2,
      "seller_user_id": SELLER_ID,
  });

  let req = test::TestRequest::post()
    .uri("/api/products")
    .insert_header((header::AUTHORIZATION, bearer(BUYER_ID, UserType::Buyer)))
    .set_json(new_product.clone())
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

  let mut someone_elses = new_product.clone();
  someone_elses["seller_user_id"] = json!(ADMIN_ID);
  let req = test::TestRequest::post()
    .uri("/api/products")
    .insert_header((header::AUTHORIZATION, seller.clone()))
    .set_json(someone_elses)
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

  let req = test::TestRequest::post()
    .uri("/api/products")
    .insert_header((header::AUTHORIZATION, seller.clone()))
    .set_json(new_product)
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let created: Value = test::read_body_json(resp).await;
  let product_id = created["productId"].as_i64().unwrap();
  assert_eq!(store.product(product_id).unwrap().stock_quantity, 12);

  let req = test::TestRequest::put()
    .uri(&format!("/api/products/{}", product_id))
    .insert_header((header::AUTHORIZATION, seller.clone()))
    .set_json(json!({ "stock_quantity": 20 }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
  assert_eq!(store.product(product_id).unwrap().stock_quantity, 20);

  let req = test::TestRequest::put()
    .uri(&format!("/api/products/{}", product_id))
    .insert_header((header::AUTHORIZATION, seller.clone()))
    .set_json(json!({}))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

  let req = test::TestRequest::delete()
    .uri(&format!("/api/products/{}", product_id))
    .insert_header((header::AUTHORIZATION, seller.clone()))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
  assert!(store.product(product_id).is_none());

  let req = test::TestRequest::delete()
    .uri(&format!("/api/products/{}", product_id))
    .insert_header((header::AUTHORIZATION, seller))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn ordered_product_cannot_be_deleted() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header((header::AUTHORIZATION, bearer(BUYER_ID, UserType::Buyer)))
    .set_json(widget_order(BUYER_ID, 1))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

  let req = test::TestRequest::get()
    .uri(&format!("/api/products/orders/{}", WIDGET_ID))
    .to_request();
  let orders: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(orders[0]["buyer_name"], "Ada");

  let req = test::TestRequest::delete()
    .uri(&format!("/api/products/{}", WIDGET_ID))
    .insert_header((header::AUTHORIZATION, bearer(ADMIN_ID, UserType::Admin)))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn sellers_only_change_their_own_products() {
  setup_tracing();
  let store = seeded_store();
  let app = init_app!(&store);
  let rival = bearer(SELLER_ID + 1, UserType::Seller);

  let req = test::TestRequest::put()
    .uri(&format!("/api/products/{}", WIDGET_ID))
    .insert_header((header::AUTHORIZATION, rival.clone()))
    .set_json(json!({ "stock_quantity": 0 }))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["message"], "Sellers can only change their own products.");

  let req = test::TestRequest::delete()
    .uri(&format!("/api/products/{}", WIDGET_ID))
    .insert_header((header::AUTHORIZATION, rival))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
  assert_eq!(store.product(WIDGET_ID).unwrap().stock_quantity, 5);

  let req = test::TestRequest::put()
    .uri(&format!("/api/products/{}", WIDGET_ID))
    .insert_header((header::AUTHORIZATION, bearer(SELLER_ID, UserType::Seller)))
    .set_json(json!({ "stock_quantity": 9 }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
  assert_eq!(store.product(WIDGET_ID).unwrap().stock_quantity, 9);

  let req = test::TestRequest::delete()
    .uri(&format!("/api/products/{}", GADGET_ID))
    .insert_header((header::AUTHORIZATION, bearer(ADMIN_ID, UserType::Admin)))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
  assert!(store.product(GADGET_ID).is_none());
}
