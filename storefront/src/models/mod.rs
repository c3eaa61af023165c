// storefront/src/models/mod.rs

//! Contains data structures representing database entities and the read
//! projections the API serves.

pub mod order;
pub mod order_item;
pub mod product;
pub mod user;

// Re-export the model structs for convenient access
pub use order::{CustomerOrder, NewOrder, NewOrderItem, Order, OrderCreated, OrderDetail, OrderStatus, OrderSummary};
pub use order_item::{OrderItem, OrderLine};
pub use product::{LockedProduct, NewProduct, Product, ProductChanges, ProductOrder};
pub use user::{NewUser, User, UserType};
