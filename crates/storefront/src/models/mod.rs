//! Domain models for storefront.
//!
//! Row types derive `sqlx::FromRow` and are read with runtime-checked
//! `query_as`. JSON shapes use camelCase field names.

pub mod address;
pub mod cart;
pub mod order;
pub mod product;
pub mod review;
pub mod session;
pub mod user;

pub use address::{Address, AddressInput, AddressPayload};
pub use cart::{CartLine, WishlistLine};
pub use order::{Order, OrderDetail, OrderItem, ShippingDetails};
pub use product::{Product, ProductInput, ProductPayload, ProductView, Specification};
pub use review::Review;
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
