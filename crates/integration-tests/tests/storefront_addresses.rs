//! Integration tests for the address book.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database
//! - The storefront running
//!
//! Run with: cargo test -p marigold-integration-tests -- --ignored

use marigold_integration_tests::{base_url, client, signed_in_client};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

fn address(line1: &str, is_default: bool) -> Value {
    json!({
        "name": "Integration Tester",
        "phone": "9876543210",
        "line1": line1,
        "city": "Pune",
        "state": "MH",
        "postalCode": "411001",
        "country": "IN",
        "isDefault": is_default,
    })
}

async fn create(client: &Client, body: &Value) -> Value {
    let resp = client
        .post(format!("{}/api/addresses", base_url()))
        .json(body)
        .send()
        .await
        .expect("Failed to create address");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("Failed to parse address");
    body["address"].clone()
}

async fn list(client: &Client) -> Vec<Value> {
    let body: Value = client
        .get(format!("{}/api/addresses", base_url()))
        .send()
        .await
        .expect("Failed to list addresses")
        .json()
        .await
        .expect("Failed to parse addresses");
    body["addresses"].as_array().cloned().unwrap_or_default()
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_addresses_require_login() {
    let resp = client()
        .get(format!("{}/api/addresses", base_url()))
        .send()
        .await
        .expect("Failed to list addresses");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_single_default_address() {
    let client = signed_in_client().await;

    let home = create(&client, &address("1 Home Street", true)).await;
    let work = create(&client, &address("2 Office Park", true)).await;

    let addresses = list(&client).await;
    let defaults: Vec<&Value> = addresses.iter().filter(|a| a["isDefault"] == true).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["id"], work["id"]);

    let resp = client
        .post(format!("{}/api/addresses/{}/default", base_url(), home["id"]))
        .send()
        .await
        .expect("Failed to set default");
    assert_eq!(resp.status(), StatusCode::OK);

    let addresses = list(&client).await;
    let defaults: Vec<&Value> = addresses.iter().filter(|a| a["isDefault"] == true).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["id"], home["id"]);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_other_users_address_is_not_found() {
    let owner = signed_in_client().await;
    let created = create(&owner, &address("3 Private Lane", false)).await;

    let stranger = signed_in_client().await;
    let resp = stranger
        .delete(format!("{}/api/addresses/{}", base_url(), created["id"]))
        .send()
        .await
        .expect("Failed to delete address");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Still there for the owner
    assert_eq!(list(&owner).await.len(), 1);
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_invalid_address_lists_fields() {
    let client = signed_in_client().await;
    let resp = client
        .post(format!("{}/api/addresses", base_url()))
        .json(&json!({"name": "Only a name"}))
        .send()
        .await
        .expect("Failed to create address");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = resp.json().await.expect("Failed to parse error");
    assert!(body["details"]["line1"].is_string());
    assert!(body["details"]["city"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront"]
async fn test_concurrent_first_addresses_keep_one_default() {
    let client = signed_in_client().await;
    let first = address("4 Race Road", false);
    let second = address("5 Race Road", false);

    let (a, b) = tokio::join!(create(&client, &first), create(&client, &second));

    let defaults = [&a, &b]
        .iter()
        .filter(|address| address["isDefault"] == true)
        .count();
    assert_eq!(defaults, 1);

    let addresses = list(&client).await;
    assert_eq!(addresses.len(), 2);
    assert_eq!(
        addresses.iter().filter(|a| a["isDefault"] == true).count(),
        1
    );
}
