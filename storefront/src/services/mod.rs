// storefront/src/services/mod.rs

pub mod account_service;
pub mod auth_service;
pub mod order_service;
pub mod token_service;
