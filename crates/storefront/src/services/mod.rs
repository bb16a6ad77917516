//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Email and password accounts
//! - `cart` - Stored and guest carts, guest-cart merge on login
//! - `checkout` - Order creation and payment verification
//! - `gateway` - Payment gateway client and signature check
//! - `storage` - Object storage for uploads
//! - `upload` - Image validation and resizing

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod gateway;
pub mod storage;
pub mod upload;
