//! Integration tests for checkout and payment verification.
//!
//! These tests require:
//! - A migrated, seeded `PostgreSQL` database
//! - The storefront running with `APP_ENV=development`
//!
//! Tests that open a gateway order additionally need Razorpay test keys.
//!
//! Run with: cargo test -p marigold-integration-tests -- --ignored

use marigold_integration_tests::{base_url, in_stock_product, sign_payment, signed_in_client};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

fn shipping() -> Value {
    json!({
        "name": "Integration Tester",
        "email": "tester@example.com",
        "phone": "9876543210",
        "address": "12 MG Road",
        "city": "Bengaluru",
        "state": "KA",
        "postalCode": "560001",
        "country": "IN",
        "paymentMethod": "razorpay",
        "shippingMethod": "standard"
    })
}

async fn create_order(client: &Client, body: &Value) -> reqwest::Response {
    client
        .post(format!("{}/api/orders/create", base_url()))
        .json(body)
        .send()
        .await
        .expect("Failed to create order")
}

/// Open a gateway order for one unit of an in-stock product.
async fn open_order(client: &Client) -> Value {
    let product = in_stock_product(client).await;
    let price = product["discountedPrice"]
        .as_i64()
        .expect("Product has no price");

    // Catalog prices are whole units; the gateway charges minor units
    let resp = create_order(
        client,
        &json!({
            "amount": price * 100,
            "currency": "INR",
            "items": [{"productId": product["id"], "quantity": 1}],
            "shippingDetails": shipping(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.expect("Failed to parse order")
}

async fn verify(client: &Client, payment: &Value) -> Value {
    let resp = client
        .post(format!("{}/api/orders/verify-payment", base_url()))
        .json(payment)
        .send()
        .await
        .expect("Failed to verify payment");
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.expect("Failed to parse verification")
}

async fn order_detail(client: &Client, order_id: &Value) -> Value {
    let body: Value = client
        .get(format!("{}/api/orders/{order_id}", base_url()))
        .send()
        .await
        .expect("Failed to get order")
        .json()
        .await
        .expect("Failed to parse order");
    body["order"].clone()
}

#[tokio::test]
#[ignore = "Requires running storefront and seeded catalog"]
async fn test_checkout_rejects_tampered_amount() {
    let client = signed_in_client().await;
    let product = in_stock_product(&client).await;

    let resp = create_order(
        &client,
        &json!({
            "amount": 10_000_000_000_i64,
            "currency": "INR",
            "items": [{"productId": product["id"], "quantity": 1}],
            "shippingDetails": shipping(),
        }),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Failed to parse error");
    assert!(body["details"]["amount"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront and seeded catalog"]
async fn test_checkout_reports_missing_fields() {
    let client = signed_in_client().await;

    let resp = create_order(&client, &json!({"items": []})).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Failed to parse error");
    assert!(body["details"]["amount"].is_string());
    assert!(body["details"]["currency"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront and Razorpay test keys"]
async fn test_forged_signature_leaves_order_pending() {
    let client = signed_in_client().await;
    let order = open_order(&client).await;

    let resp = client
        .post(format!("{}/api/orders/verify-payment", base_url()))
        .json(&json!({
            "paymentId": "pay_forged",
            "orderId": order["razorpayOrderId"],
            "signature": "00".repeat(32),
            "orderDbId": order["orderId"],
        }))
        .send()
        .await
        .expect("Failed to verify payment");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let detail = order_detail(&client, &order["orderId"]).await;
    assert_eq!(detail["paymentStatus"], "pending");
}

#[tokio::test]
#[ignore = "Requires running storefront, Razorpay test keys and RAZORPAY_KEY_SECRET"]
async fn test_verifying_twice_changes_nothing_the_second_time() {
    let client = signed_in_client().await;
    let order = open_order(&client).await;
    let gateway_order_id = order["razorpayOrderId"]
        .as_str()
        .expect("Order has no gateway id");
    let payment = json!({
        "paymentId": "pay_it_twice",
        "orderId": gateway_order_id,
        "signature": sign_payment(gateway_order_id, "pay_it_twice"),
        "orderDbId": order["orderId"],
    });

    let first = verify(&client, &payment).await;
    assert_eq!(first["message"], "Payment verified successfully");
    assert_eq!(first["order"]["paymentStatus"], "completed");
    let paid = order_detail(&client, &order["orderId"]).await;

    let second = verify(&client, &payment).await;
    assert_eq!(second["message"], "Payment already verified");
    assert_eq!(second["order"]["paymentStatus"], "completed");

    let after = order_detail(&client, &order["orderId"]).await;
    assert_eq!(after["updatedAt"], paid["updatedAt"]);
    assert_eq!(after["status"], paid["status"]);
}
