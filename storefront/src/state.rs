// storefront/src/state.rs
use crate::db::Store;
use crate::services::token_service::TokenService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn Store>,
  pub tokens: Arc<TokenService>,
}

impl AppState {
  pub fn new(store: Arc<dyn Store>, tokens: TokenService) -> Self {
    Self {
      store,
      tokens: Arc::new(tokens),
    }
  }
}
