//! Integration tests for the cart and guest-cart sync.
//!
//! These tests require:
//! - A migrated, seeded `PostgreSQL` database
//! - The storefront running with `APP_ENV=development`
//!
//! Run with: cargo test -p marigold-integration-tests -- --ignored

use marigold_integration_tests::{
    TEST_PASSWORD, base_url, client, in_stock_product, in_stock_products, login, register,
    signed_in_client, unique_email,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

async fn add_to_cart(client: &Client, product_id: &Value, quantity: i64) {
    let resp = client
        .post(format!("{}/api/cart", base_url()))
        .json(&json!({"productId": product_id, "quantity": quantity}))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::OK);
}

async fn cart_lines(client: &Client) -> Vec<(Value, Value)> {
    let cart: Value = client
        .get(format!("{}/api/cart", base_url()))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to parse cart");
    cart["items"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|line| (line["id"].clone(), line["quantity"].clone()))
        .collect()
}

// ============================================================================
// Guest Cart
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and seeded catalog"]
async fn test_guest_cart_add_update_remove() {
    let client = client();
    let product = in_stock_product(&client).await;
    let product_id = &product["id"];
    let url = format!("{}/api/cart", base_url());

    let resp = client
        .post(&url)
        .json(&json!({"productId": product_id}))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Failed to parse cart");
    assert_eq!(body["items"][0]["id"], *product_id);
    assert_eq!(body["items"][0]["quantity"], 1);

    // Adding again accumulates
    let resp = client
        .post(&url)
        .json(&json!({"productId": product_id, "quantity": 1}))
        .send()
        .await
        .expect("Failed to add to cart");
    let body: Value = resp.json().await.expect("Failed to parse cart");
    assert_eq!(body["items"][0]["quantity"], 2);

    // PUT replaces
    let resp = client
        .put(&url)
        .json(&json!({"productId": product_id, "quantity": 1}))
        .send()
        .await
        .expect("Failed to update cart");
    let body: Value = resp.json().await.expect("Failed to parse cart");
    assert_eq!(body["items"][0]["quantity"], 1);

    let resp = client
        .delete(format!("{url}?productId={product_id}"))
        .send()
        .await
        .expect("Failed to remove from cart");
    let body: Value = resp.json().await.expect("Failed to parse cart");
    assert_eq!(body["items"], json!([]));
}

#[tokio::test]
#[ignore = "Requires running storefront and seeded catalog"]
async fn test_cart_rejects_unknown_product() {
    let client = client();
    let resp = client
        .post(format!("{}/api/cart", base_url()))
        .json(&json!({"productId": i64::from(i32::MAX)}))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Sync On Login
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and seeded catalog"]
async fn test_guest_cart_merged_on_login() {
    let client = client();
    let email = unique_email();
    register(&client, &email).await;

    let product = in_stock_product(&client).await;
    client
        .post(format!("{}/api/cart", base_url()))
        .json(&json!({"productId": product["id"], "quantity": 1}))
        .send()
        .await
        .expect("Failed to add to guest cart");

    let body = login(&client, &email, TEST_PASSWORD).await;
    assert_eq!(body["cart"]["merged"][0]["productId"], product["id"]);

    // The cart now comes from the account
    let cart: Value = client
        .get(format!("{}/api/cart", base_url()))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to parse cart");
    assert_eq!(cart["items"][0]["id"], product["id"]);
}

#[tokio::test]
#[ignore = "Requires running storefront and seeded catalog"]
async fn test_guest_lines_add_to_account_cart_on_login() {
    let client = client();
    let email = unique_email();
    register(&client, &email).await;
    let products = in_stock_products(&client, 2).await;
    let (a, b) = (&products[0]["id"], &products[1]["id"]);

    // Account cart: A x1
    login(&client, &email, TEST_PASSWORD).await;
    add_to_cart(&client, a, 1).await;
    let resp = client
        .post(format!("{}/api/auth/logout", base_url()))
        .send()
        .await
        .expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::OK);

    // Guest cart: A x2, B x1
    add_to_cart(&client, a, 2).await;
    add_to_cart(&client, b, 1).await;

    let body = login(&client, &email, TEST_PASSWORD).await;
    assert_eq!(body["cart"]["merged"].as_array().map(Vec::len), Some(2));

    assert_eq!(
        cart_lines(&client).await,
        vec![(a.clone(), json!(3)), (b.clone(), json!(1))]
    );
}

#[tokio::test]
#[ignore = "Requires running storefront and seeded catalog"]
async fn test_add_past_line_limit_is_rejected() {
    let client = signed_in_client().await;
    let product = in_stock_product(&client).await;

    add_to_cart(&client, &product["id"], 999).await;
    let resp = client
        .post(format!("{}/api/cart", base_url()))
        .json(&json!({"productId": product["id"], "quantity": 1}))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Failed to parse error");
    assert!(body["details"]["quantity"].is_string());

    assert_eq!(cart_lines(&client).await, vec![(product["id"].clone(), json!(999))]);
}

#[tokio::test]
#[ignore = "Requires running storefront and seeded catalog"]
async fn test_sync_reports_skipped_lines() {
    let client = signed_in_client().await;
    let product = in_stock_product(&client).await;

    let resp = client
        .post(format!("{}/api/cart/sync", base_url()))
        .json(&json!({"items": [
            {"productId": product["id"], "quantity": 1},
            {"productId": i64::from(i32::MAX), "quantity": 1},
        ]}))
        .send()
        .await
        .expect("Failed to sync cart");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.expect("Failed to parse sync response");
    assert_eq!(body["merged"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["skipped"][0]["productId"], i64::from(i32::MAX));
}
