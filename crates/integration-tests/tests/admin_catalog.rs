//! Integration tests for the role-gated admin API.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database
//! - The storefront running
//! - `MARIGOLD_ADMIN_EMAIL` and `MARIGOLD_ADMIN_PASSWORD` for an `admin`
//!
//! Run with: cargo test -p marigold-integration-tests -- --ignored

use marigold_integration_tests::{base_url, client, login, signed_in_client};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

async fn admin_client() -> Client {
    let email = std::env::var("MARIGOLD_ADMIN_EMAIL").expect("MARIGOLD_ADMIN_EMAIL not set");
    let password =
        std::env::var("MARIGOLD_ADMIN_PASSWORD").expect("MARIGOLD_ADMIN_PASSWORD not set");
    let client = client();
    login(&client, &email, &password).await;
    client
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_customer_cannot_reach_admin() {
    let client = signed_in_client().await;
    for path in ["/api/admin/products", "/api/admin/users"] {
        let resp = client
            .get(format!("{}{path}", base_url()))
            .send()
            .await
            .expect("Failed to call admin API");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{path}");
    }
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_product_lifecycle() {
    let client = admin_client().await;
    let base = format!("{}/api/admin/products", base_url());
    let slug = format!("it-product-{}", Uuid::new_v4().simple());

    let resp = client
        .post(&base)
        .json(&json!({"name": "Integration Lamp", "slug": slug, "price": 999, "stock": 3}))
        .send()
        .await
        .expect("Failed to create product");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("Failed to parse product");
    let id = body["product"]["id"].clone();

    // Partial update keeps the other fields
    let resp = client
        .put(format!("{base}/{id}"))
        .json(&json!({"discount": 10}))
        .send()
        .await
        .expect("Failed to update product");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Failed to parse product");
    assert_eq!(body["product"]["price"], 999);
    assert_eq!(body["product"]["discountedPrice"], 899);

    // Visible in the public catalog by slug
    let resp = client
        .get(format!("{}/api/products/{slug}", base_url()))
        .send()
        .await
        .expect("Failed to get product");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .delete(format!("{base}/{id}"))
        .send()
        .await
        .expect("Failed to delete product");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .delete(format!("{base}/{id}"))
        .send()
        .await
        .expect("Failed to delete product");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin credentials"]
async fn test_duplicate_slug_conflicts() {
    let client = admin_client().await;
    let base = format!("{}/api/admin/products", base_url());
    let slug = format!("it-dup-{}", Uuid::new_v4().simple());
    let product = json!({"name": "Duplicate", "slug": slug, "price": 100});

    let first: Value = client
        .post(&base)
        .json(&product)
        .send()
        .await
        .expect("Failed to create product")
        .json()
        .await
        .expect("Failed to parse product");

    let resp = client
        .post(&base)
        .json(&product)
        .send()
        .await
        .expect("Failed to create product");
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let _ = client
        .delete(format!("{base}/{}", first["product"]["id"]))
        .send()
        .await;
}
