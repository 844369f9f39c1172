//! Integration tests for Kharnak.
//!
//! The tests talk to a running storefront over HTTP and are `#[ignore]`d by
//! default.
//!
//! ```bash
//! kharnak migrate
//! kharnak seed catalog crates/cli/seed/catalog.yaml
//! cargo run -p kharnak-storefront &
//! cargo test -p kharnak-integration-tests -- --ignored
//! ```
//!
//! `STOREFRONT_BASE_URL` overrides the default `http://localhost:4000`.
//! The booking tests need a tour that has not started yet in the catalog.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Header carrying the account token.
pub const TOKEN_HEADER: &str = "token";

/// Base URL for the storefront API.
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:4000".to_string())
}

/// An HTTP client with its own cookie jar, i.e. its own guest session.
pub struct Visitor {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl Default for Visitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Visitor {
    /// A fresh guest with an empty cookie jar.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .cookie_store(true)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url(),
            token: None,
        }
    }

    /// Account token, once signed in.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Forget the token but keep the session cookie.
    pub fn drop_token(&mut self) {
        self.token = None;
    }

    /// GET a path and return status and JSON body.
    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let mut req = self.client.get(format!("{}{path}", self.base_url));
        if let Some(token) = &self.token {
            req = req.header(TOKEN_HEADER, token);
        }
        read(req.send().await.expect("GET failed")).await
    }

    /// POST a JSON body and return status and JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let mut req = self.client.post(format!("{}{path}", self.base_url)).json(body);
        if let Some(token) = &self.token {
            req = req.header(TOKEN_HEADER, token);
        }
        read(req.send().await.expect("POST failed")).await
    }

    /// Register a throwaway account and keep its token.
    ///
    /// Returns the response body, which includes the merged cart.
    pub async fn register(&mut self) -> Value {
        let email = format!("it-{}@example.com", Uuid::new_v4().simple());
        self.register_as(&email).await
    }

    /// Register with a given email and keep the token.
    pub async fn register_as(&mut self, email: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/user/register",
                &json!({
                    "name": "Integration Test",
                    "email": email,
                    "password": TEST_PASSWORD,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        self.token = Some(body["token"].as_str().unwrap().to_string());
        body
    }

    /// Sign in and keep the token.
    pub async fn login(&mut self, email: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/user/login",
                &json!({ "email": email, "password": TEST_PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        self.token = Some(body["token"].as_str().unwrap().to_string());
        body
    }
}

/// Password used for every test account.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

async fn read(resp: Response) -> (StatusCode, Value) {
    let status = resp.status();
    let body = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}

/// First product with at least `min_stock` units.
pub async fn product_in_stock(visitor: &Visitor, min_stock: i64) -> Value {
    let (status, body) = visitor.get("/api/product/list").await;
    assert_eq!(status, StatusCode::OK);
    body["products"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["quantity"].as_i64().unwrap_or(0) >= min_stock)
        .cloned()
        .expect("no product with enough stock; seed the catalog first")
}

/// A delivery address that passes validation.
#[must_use]
pub fn test_address() -> Value {
    json!({
        "firstName": "Tsering",
        "lastName": "Dolma",
        "email": "tsering@example.com",
        "street": "Main Bazaar",
        "city": "Leh",
        "state": "Ladakh",
        "zipcode": "194101",
        "country": "India",
        "phone": "+91 9000000000",
    })
}
