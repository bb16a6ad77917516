//! Marigold Core - Shared domain types.
//!
//! This crate provides the types shared by the Marigold components:
//! - `storefront` - JSON storefront and admin API server
//! - `cli` - Command-line tools for migrations, users and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Everything that must agree between the guest cart,
//! the persisted cart and checkout (pricing, the tax split, cart line
//! arithmetic) lives here so there is exactly one implementation of it.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, slugs, currencies and statuses
//! - [`pricing`] - Discount pricing and the tax-inclusive order total split
//! - [`cart`] - The product-id to quantity cart container

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod pricing;
pub mod types;

pub use cart::{CartEntry, CartState, CartStateError, Quantity};
pub use pricing::{OrderTotals, discounted_price};
pub use types::*;
