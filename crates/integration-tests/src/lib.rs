//! Integration tests for Marigold.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and apply migrations
//! marigold-cli migrate
//! marigold-cli seed products -f catalog.yaml
//!
//! # Start the storefront with APP_ENV=development
//! cargo run -p marigold-storefront
//!
//! # Run the ignored tests against it
//! cargo test -p marigold-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_BASE_URL` - Storefront under test (default `http://localhost:3000`)
//! - `MARIGOLD_ADMIN_EMAIL`, `MARIGOLD_ADMIN_PASSWORD` - An `admin` created
//!   with `marigold-cli user create`, for the admin tests
//! - `RAZORPAY_KEY_SECRET` - The storefront's gateway secret, for signing
//!   test payments
//!
//! Auth endpoints allow a burst of 5 requests per client address; run with
//! `--test-threads=1` and pause between files if they start returning 429.

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sha2::Sha256;
use uuid::Uuid;

/// Password used for every throwaway account.
pub const TEST_PASSWORD: &str = "integration-password-1";

/// Base URL for the storefront API (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A client that keeps the session cookie between requests.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// An email no earlier run has registered.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@example.com", Uuid::new_v4().simple())
}

/// Register a fresh account. The client stays logged out.
pub async fn register(client: &Client, email: &str) -> Value {
    let resp = client
        .post(format!("{}/api/auth/register", base_url()))
        .json(&json!({"name": "Integration Tester", "email": email, "password": TEST_PASSWORD}))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("Failed to parse register response")
}

/// Log in and return the response body, including any cart merge report.
pub async fn login(client: &Client, email: &str, password: &str) -> Value {
    let resp = client
        .post(format!("{}/api/auth/login", base_url()))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.expect("Failed to parse login response")
}

/// A logged-in client for a brand new account.
pub async fn signed_in_client() -> Client {
    let client = client();
    let email = unique_email();
    register(&client, &email).await;
    login(&client, &email, TEST_PASSWORD).await;
    client
}

/// First in-stock catalog product. The catalog must be seeded.
pub async fn in_stock_product(client: &Client) -> Value {
    in_stock_products(client, 1).await.remove(0)
}

/// The first `count` in-stock catalog products.
pub async fn in_stock_products(client: &Client, count: usize) -> Vec<Value> {
    let resp = client
        .get(format!(
            "{}/api/products?inStock=true&limit={count}",
            base_url()
        ))
        .send()
        .await
        .expect("Failed to list products");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Failed to parse product list");
    let products = body["products"].as_array().cloned().unwrap_or_default();
    assert!(
        products.len() >= count,
        "Catalog has fewer than {count} in-stock products; seed it first"
    );
    products
}

/// Sign a payment the way the gateway does, with `RAZORPAY_KEY_SECRET`.
#[must_use]
pub fn sign_payment(gateway_order_id: &str, payment_id: &str) -> String {
    let secret = std::env::var("RAZORPAY_KEY_SECRET").expect("RAZORPAY_KEY_SECRET must be set");
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(format!("{gateway_order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
