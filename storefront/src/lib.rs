// storefront/src/lib.rs

//! Storefront backend: product catalog, user accounts and transactional order placement.

pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod services;
pub mod state;
pub mod web;
