//! End-to-end tests for the HTTP surface
//!
//! The router runs against the in-memory store, an identity verifier that
//! accepts `uid:email` bearer tokens, and a scripted media host.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use storefront_api::auth::{AuthError, IdentityVerifier, SessionSigner, VerifiedIdentity};
use storefront_api::config::AccessFlags;
use storefront_api::domain::aggregates::{Order, OrderStatus, Registration};
use storefront_api::domain::value_objects::{Email, Role};
use storefront_api::media::{BatchDeletion, DestroyOutcome, MediaError, MediaHost, ResourceType};
use storefront_api::store::{MemoryStore, UserStore};
use storefront_api::{router, AppState};

const ANA: &str = "ana@example.com";
const ANA_TOKEN: &str = "uid-ana:ana@example.com";

struct PlainVerifier;

#[async_trait]
impl IdentityVerifier for PlainVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let (uid, email) = token.split_once(':').ok_or_else(|| AuthError::InvalidToken(token.to_string()))?;
        let email = Email::parse(email).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(VerifiedIdentity { subject: uid.to_string(), email, email_verified: true })
    }
}

/// `missing` is already gone, `locked` is refused, everything else deletes.
struct ScriptedMedia;

#[async_trait]
impl MediaHost for ScriptedMedia {
    async fn destroy(&self, public_id: &str, _kind: ResourceType) -> Result<DestroyOutcome, MediaError> {
        Ok(match public_id {
            "missing" => DestroyOutcome::NotFound,
            "locked" => DestroyOutcome::Other("error".to_string()),
            _ => DestroyOutcome::Ok,
        })
    }

    async fn delete_images(&self, public_ids: &[String]) -> Result<BatchDeletion, MediaError> {
        let deleted: BTreeMap<String, String> = public_ids
            .iter()
            .map(|id| {
                let status = if id == "missing" { "not_found" } else { "deleted" };
                (id.clone(), status.to_string())
            })
            .collect();
        Ok(BatchDeletion { deleted })
    }
}

struct TestApp {
    app: axum::Router,
    store: Arc<MemoryStore>,
}

fn build(access: AccessFlags, media: bool) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let signer = SessionSigner::new(&SecretString::from("integration-test-secret"));
    let mut state = AppState::from_store(store.clone(), signer, Arc::new(PlainVerifier)).with_access(access);
    if media {
        state = state.with_media(Arc::new(ScriptedMedia));
    }
    let app = router(state, &["http://localhost:5173".to_string()]);
    TestApp { app, store }
}

fn create_test_app() -> TestApp { build(AccessFlags::default(), true) }

/// Sends a request and returns status, parsed JSON body and headers.
async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, String)],
) -> (StatusCode, Value, HeaderMap) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(json!({}));
    (status, body, headers)
}

fn bearer(token: &str) -> (&'static str, String) { ("authorization", format!("Bearer {token}")) }

fn product_body(sku: &str) -> Value {
    json!({
        "sku": sku,
        "productName": "Classic Abaya",
        "description": "Nida fabric",
        "mainCategory": "abaya",
        "sizes": ["52", "54"],
        "colors": ["black"],
        "tags": ["new"],
        "images": ["https://img.example/abaya.jpg"],
        "oldPrice": 60,
        "newPrice": 49.5,
        "stock": 3,
        "fabric": "nida"
    })
}

async fn create_product(app: &axum::Router, sku: &str) -> String {
    let (status, body, _) = send(app, "POST", "/api/products", Some(product_body(sku)), &[]).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["product"]["_id"].as_str().unwrap().to_string()
}

async fn seed_user(store: &MemoryStore, uid: &str, email: &str, role: Role) {
    let registration = Registration {
        uid: uid.to_string(),
        email: Email::parse(email).unwrap(),
        email_verified: true,
        display_name: None,
        photo_url: None,
    };
    store.register(registration).await.unwrap();
    store.set_role(uid, role).await.unwrap();
}

// =============================================================================
// Service
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let t = create_test_app();
    let (status, body, _) = send(&t.app, "GET", "/health", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_session_cookie_issued() {
    let t = create_test_app();
    let (status, body, headers) = send(&t.app, "POST", "/jwt", Some(json!({"email": ANA})), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("access_token="));
    assert!(cookie.contains("HttpOnly") && cookie.contains("Max-Age=604800") && cookie.contains("SameSite=Lax"));
    assert!(!cookie.contains("Secure"));

    let (status, body, _) = send(&t.app, "POST", "/jwt", Some(json!({})), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let t = create_test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/cart/guest-1/add")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_create_and_fetch_product() {
    let t = create_test_app();
    let id = create_product(&t.app, "AB-100").await;

    let (status, body, _) = send(&t.app, "GET", &format!("/products/{id}"), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sku"], "AB-100");
    assert_eq!(body["newPrice"], 49.5);
    assert_eq!(body["status"], "active");
    assert_eq!(body["fabric"], "nida");

    let (status, _, _) = send(&t.app, "GET", "/products/not-an-id", None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = send(&t.app, "GET", &format!("/products/{}", Uuid::now_v7()), None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_price_invariant_rejects_without_insert() {
    let t = create_test_app();
    let mut body = product_body("AB-200");
    body["oldPrice"] = json!(10);
    body["newPrice"] = json!(20);
    let (status, response, _) = send(&t.app, "POST", "/api/products", Some(body), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["message"], "Old price must be greater than new price");

    let (_, products, _) = send(&t.app, "GET", "/products", None, &[]).await;
    assert_eq!(products, json!([]));
}

#[tokio::test]
async fn test_product_validation_messages() {
    let t = create_test_app();
    let cases = [
        ("images", json!([]), "At least one product image is required"),
        ("newPrice", json!(0), "Price must be greater than 0"),
        ("stock", json!(-1), "Stock cannot be negative"),
    ];
    for (field, value, message) in cases {
        let mut body = product_body("AB-300");
        body[field] = value;
        let (status, response, _) = send(&t.app, "POST", "/api/products", Some(body), &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{field}");
        assert_eq!(response["message"], message);
    }

    let mut body = product_body("AB-300");
    body["stock"] = json!(0);
    let (status, _, _) = send(&t.app, "POST", "/api/products", Some(body), &[]).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_duplicate_sku_rejected() {
    let t = create_test_app();
    create_product(&t.app, "AB-400").await;
    let (status, body, _) = send(&t.app, "POST", "/api/products", Some(product_body("AB-400")), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Product with this SKU already exists");
}

#[tokio::test]
async fn test_listing_filters() {
    let t = create_test_app();
    create_product(&t.app, "AB-501").await;
    let mut hijab = product_body("HJ-502");
    hijab["mainCategory"] = json!("hijab");
    hijab["newPrice"] = json!(15);
    hijab["oldPrice"] = Value::Null;
    hijab["colors"] = json!(["white"]);
    send(&t.app, "POST", "/api/products", Some(hijab), &[]).await;

    let (_, all, _) = send(&t.app, "GET", "/products", None, &[]).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    let (_, abayas, _) = send(&t.app, "GET", "/products?category=abaya", None, &[]).await;
    assert_eq!(abayas.as_array().unwrap().len(), 1);
    let (_, white, _) = send(&t.app, "GET", "/products?color=white", None, &[]).await;
    assert_eq!(white[0]["sku"], "HJ-502");
    let (_, cheap, _) = send(&t.app, "GET", "/products?minPrice=10&maxPrice=20", None, &[]).await;
    assert_eq!(cheap.as_array().unwrap().len(), 1);
    let (_, half, _) = send(&t.app, "GET", "/products?minPrice=10", None, &[]).await;
    assert_eq!(half.as_array().unwrap().len(), 2);
    let (status, _, _) = send(&t.app, "GET", "/products?minPrice=x&maxPrice=20", None, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_status_and_delete() {
    let t = create_test_app();
    let id = create_product(&t.app, "AB-600").await;
    let (_, before, _) = send(&t.app, "GET", &format!("/products/{id}"), None, &[]).await;

    let mut body = product_body("AB-600");
    body["productName"] = json!("Classic Abaya (2025)");
    let (status, updated, _) = send(&t.app, "PUT", &format!("/api/products/{id}"), Some(body), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["product"]["productName"], "Classic Abaya (2025)");
    assert_eq!(updated["product"]["createdAt"], before["createdAt"]);

    let uri = format!("/api/products/{id}/status");
    let (status, body, _) = send(&t.app, "PATCH", &uri, Some(json!({"status": "archived"})), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["product"]["status"], "archived");
    let (status, _, _) = send(&t.app, "PATCH", &uri, Some(json!({"status": "deleted"})), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&t.app, "DELETE", &format!("/api/products/{id}"), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&t.app, "DELETE", &format!("/api/products/{id}"), None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Cart
// =============================================================================

#[tokio::test]
async fn test_add_item_merges_by_key() {
    let t = create_test_app();
    let uri = "/api/cart/guest-1/add";
    send(&t.app, "POST", uri, Some(json!({"key": "p1-52", "productId": "p1", "qty": 2, "name": "Abaya"})), &[]).await;
    let (status, body, _) =
        send(&t.app, "POST", uri, Some(json!({"key": "p1-52", "productId": "p1", "qty": 3})), &[]).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["qty"], 5);
    assert_eq!(items[0]["name"], "Abaya");

    // Same product under another key stays a separate line.
    let (_, body, _) = send(&t.app, "POST", uri, Some(json!({"key": "p1-54", "productId": "p1", "qty": 1})), &[]).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let (status, _, _) = send(&t.app, "POST", uri, Some(json!({"key": "p2", "productId": "p2", "qty": 0})), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_quantity_zero_removes_item() {
    let t = create_test_app();
    send(&t.app, "POST", "/api/cart/guest-2/add", Some(json!({"key": "a", "productId": "p1", "qty": 2})), &[]).await;
    send(&t.app, "POST", "/api/cart/guest-2/add", Some(json!({"key": "b", "productId": "p2", "qty": 1})), &[]).await;

    let (status, body, _) =
        send(&t.app, "PATCH", "/api/cart/guest-2/update/b", Some(json!({"qty": 7})), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][1]["qty"], 7);

    send(&t.app, "PATCH", "/api/cart/guest-2/update/a", Some(json!({"qty": 0})), &[]).await;
    let (_, cart, _) = send(&t.app, "GET", "/api/cart/guest-2", None, &[]).await;
    let keys: Vec<&str> = cart["items"].as_array().unwrap().iter().map(|i| i["key"].as_str().unwrap()).collect();
    assert_eq!(keys, vec!["b"]);

    let (status, _, _) = send(&t.app, "PATCH", "/api/cart/guest-2/update/b", Some(json!({"qty": -1})), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = send(&t.app, "PATCH", "/api/cart/guest-2/update/zz", Some(json!({"qty": 1})), &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = send(&t.app, "PATCH", "/api/cart/nobody/update/b", Some(json!({"qty": 1})), &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_replace_filters_invalid_items() {
    let t = create_test_app();
    let items = json!({"items": [
        {"key": "a", "productId": "p1", "qty": 0},
        {"key": "b", "productId": "p2", "qty": 2}
    ]});
    let (status, body, _) = send(&t.app, "POST", "/api/cart/guest-3", Some(items), &[]).await;
    assert_eq!(status, StatusCode::OK);
    let expected = json!([{"key": "b", "productId": "p2", "qty": 2}]);
    assert_eq!(body["items"], expected);

    let (_, cart, _) = send(&t.app, "GET", "/api/cart/guest-3", None, &[]).await;
    assert_eq!(cart["items"], expected);
}

#[tokio::test]
async fn test_count_remove_and_clear() {
    let t = create_test_app();
    let (_, empty, _) = send(&t.app, "GET", "/api/cart/guest-4/count", None, &[]).await;
    assert_eq!(empty["count"], 0);

    let items = json!({"items": [
        {"key": "a", "productId": "p1", "qty": 2},
        {"key": "b", "productId": "p2", "qty": 3},
        {"key": "c", "productId": "p3", "qty": 5}
    ]});
    send(&t.app, "POST", "/api/cart/guest-4", Some(items), &[]).await;
    let (_, count, _) = send(&t.app, "GET", "/api/cart/guest-4/count", None, &[]).await;
    assert_eq!(count["count"], 10);

    let (status, _, _) = send(&t.app, "DELETE", "/api/cart/guest-4/remove/c", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body, _) = send(&t.app, "DELETE", "/api/cart/guest-4/remove/c", None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Item not found");

    let (status, _, _) = send(&t.app, "DELETE", "/api/cart/guest-4/clear", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    let (_, cart, _) = send(&t.app, "GET", "/api/cart/guest-4", None, &[]).await;
    assert_eq!(cart["items"], json!([]));

    let (status, _, _) = send(&t.app, "DELETE", "/api/cart/never-seen/clear", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Wishlist
// =============================================================================

#[tokio::test]
async fn test_wishlist_toggle_cycles() {
    let t = create_test_app();
    let product = create_product(&t.app, "WL-100").await;
    let uri = format!("/api/wishlist/{ANA}/toggle");
    let auth = [bearer(ANA_TOKEN)];

    let expected = [(StatusCode::CREATED, true), (StatusCode::OK, false), (StatusCode::CREATED, true)];
    for (want_status, want_member) in expected {
        let (status, body, _) = send(&t.app, "POST", &uri, Some(json!({"productId": product})), &auth).await;
        assert_eq!(status, want_status);
        assert_eq!(body["inWishlist"], want_member);
    }

    let (_, check, _) = send(&t.app, "GET", &format!("/api/wishlist/{ANA}/check/{product}"), None, &auth).await;
    assert_eq!(check["inWishlist"], true);
    let (_, count, _) = send(&t.app, "GET", &format!("/api/wishlist/{ANA}/count"), None, &auth).await;
    assert_eq!(count["count"], 1);
}

#[tokio::test]
async fn test_wishlist_never_holds_duplicates() {
    let t = create_test_app();
    let product = create_product(&t.app, "WL-200").await;
    let auth = [bearer(ANA_TOKEN)];
    let toggle = format!("/api/wishlist/{ANA}/toggle");
    let remove = format!("/api/wishlist/{ANA}/remove/{product}");
    let count = format!("/api/wishlist/{ANA}/count");

    for step in 0..6 {
        if step % 3 == 2 {
            send(&t.app, "DELETE", &remove, None, &auth).await;
        } else {
            send(&t.app, "POST", &toggle, Some(json!({"productId": product})), &auth).await;
        }
        let (_, body, _) = send(&t.app, "GET", &count, None, &auth).await;
        assert!(body["count"].as_u64().unwrap() <= 1, "step {step}");
    }

    let (status, body, _) = send(&t.app, "DELETE", &remove, None, &auth).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Item not found in wishlist");
}

#[tokio::test]
async fn test_wishlist_toggle_needs_existing_product() {
    let t = create_test_app();
    let uri = format!("/api/wishlist/{ANA}/toggle");
    let auth = [bearer(ANA_TOKEN)];
    let body = json!({"productId": Uuid::now_v7().to_string()});
    let (status, _, _) = send(&t.app, "POST", &uri, Some(body), &auth).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = send(&t.app, "POST", &uri, Some(json!({})), &auth).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wishlist_credentials() {
    let t = create_test_app();
    let count = format!("/api/wishlist/{ANA}/count");

    let (status, _, _) = send(&t.app, "GET", &count, None, &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let other = [bearer("uid-bob:bob@example.com")];
    let (status, _, _) = send(&t.app, "GET", &count, None, &other).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Listing also needs the session cookie.
    let (status, _, _) = send(&t.app, "GET", &format!("/api/wishlist/{ANA}"), None, &[bearer(ANA_TOKEN)]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wishlist_listing_joins_catalog() {
    let t = create_test_app();
    let first = create_product(&t.app, "WL-301").await;
    let second = create_product(&t.app, "WL-302").await;
    let auth = bearer(ANA_TOKEN);
    let toggle = format!("/api/wishlist/{ANA}/toggle");
    send(&t.app, "POST", &toggle, Some(json!({"productId": first})), &[auth.clone()]).await;
    send(&t.app, "POST", &toggle, Some(json!({"productId": second})), &[auth.clone()]).await;

    let (_, _, headers) = send(&t.app, "POST", "/jwt", Some(json!({"email": ANA})), &[]).await;
    let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap().split(';').next().unwrap().to_string();
    let creds = [auth, ("cookie", cookie)];

    let (status, list, _) = send(&t.app, "GET", &format!("/api/wishlist/{ANA}"), None, &creds).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    let skus: Vec<&str> = list.iter().map(|i| i["product"]["sku"].as_str().unwrap()).collect();
    assert!(skus.contains(&"WL-301") && skus.contains(&"WL-302"));

    // Dangling entries are dropped from the listing but still counted.
    send(&t.app, "DELETE", &format!("/api/products/{second}"), None, &[]).await;
    let (_, list, _) = send(&t.app, "GET", &format!("/api/wishlist/{ANA}"), None, &creds).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    let (_, count, _) = send(&t.app, "GET", &format!("/api/wishlist/{ANA}/count"), None, &creds).await;
    assert_eq!(count["count"], 2);
}

#[tokio::test]
async fn test_wishlist_open_when_auth_disabled() {
    let t = build(AccessFlags { wishlist_auth: false, role_gating: true }, false);
    let (status, body, _) = send(&t.app, "GET", "/api/wishlist/guest-9/count", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_register_then_login() {
    let t = create_test_app();
    let auth = [bearer(ANA_TOKEN)];
    let (status, body, _) =
        send(&t.app, "POST", "/api/users/register", Some(json!({"displayName": "Ana"})), &auth).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["email"], ANA);

    let (status, body, _) = send(&t.app, "POST", "/api/users/register", None, &auth).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["displayName"], "Ana");

    let (status, _, _) = send(&t.app, "POST", "/api/users/register", None, &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_with_orders_and_patch() {
    let t = create_test_app();
    let auth = [bearer(ANA_TOKEN)];
    let (status, _, _) = send(&t.app, "GET", "/api/users/profile", None, &auth).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&t.app, "POST", "/api/users/register", None, &auth).await;
    t.store.insert_order(Order {
        id: Uuid::now_v7(),
        user_email: ANA.to_string(),
        items: vec![json!({"productId": "p1", "qty": 1})],
        total: Decimal::new(4950, 2),
        status: OrderStatus::Shipped,
        created_at: Utc::now(),
    });

    let (status, body, _) = send(&t.app, "GET", "/api/users/profile", None, &auth).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);
    assert_eq!(body["orders"][0]["status"], "shipped");

    let patch = json!({"phone": "01700000000", "address": {"city": "Dhaka"}, "preferences": {"size": "54"}});
    let (status, body, _) = send(&t.app, "PATCH", "/api/users/profile", Some(patch), &auth).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["address"]["city"], "Dhaka");

    let (status, _, _) = send(&t.app, "PATCH", "/api/users/profile", Some(json!({"role": "admin"})), &auth).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) =
        send(&t.app, "PATCH", "/api/users/profile", Some(json!({"photoUrl": "not a url"})), &auth).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_role_gate_forbids_plain_users() {
    let t = create_test_app();
    let auth = [bearer(ANA_TOKEN)];
    send(&t.app, "POST", "/api/users/register", None, &auth).await;

    let (status, _, _) = send(&t.app, "GET", "/api/users", None, &auth).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, _) =
        send(&t.app, "PATCH", "/api/users/uid-ana/role", Some(json!({"role": "admin"})), &auth).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, _) = send(&t.app, "DELETE", "/api/users/uid-ana", None, &auth).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unknown caller: role lookup fails.
    let (status, _, _) = send(&t.app, "GET", "/api/users", None, &[bearer("uid-x:x@example.com")]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_manages_roles() {
    let t = create_test_app();
    seed_user(&t.store, "uid-admin", "admin@example.com", Role::Admin).await;
    seed_user(&t.store, "uid-staff", "staff@example.com", Role::Staff).await;
    send(&t.app, "POST", "/api/users/register", None, &[bearer(ANA_TOKEN)]).await;
    let admin = [bearer("uid-admin:admin@example.com")];
    let staff = [bearer("uid-staff:staff@example.com")];

    let (status, body, _) = send(&t.app, "GET", "/api/users", None, &staff).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    let (_, body, _) = send(&t.app, "GET", "/api/users?role=staff", None, &admin).await;
    assert_eq!(body["users"][0]["uid"], "uid-staff");
    let (status, _, _) = send(&t.app, "GET", "/api/users?role=owner", None, &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) =
        send(&t.app, "PATCH", "/api/users/uid-ana/role", Some(json!({"role": "staff"})), &staff).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body, _) =
        send(&t.app, "PATCH", "/api/users/uid-ana/role", Some(json!({"role": "staff"})), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "staff");
    let (status, _, _) =
        send(&t.app, "PATCH", "/api/users/uid-ana/role", Some(json!({"role": "owner"})), &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&t.app, "DELETE", "/api/users/uid-ana", None, &admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&t.app, "DELETE", "/api/users/uid-ana", None, &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_role_gating_disabled() {
    let t = build(AccessFlags { wishlist_auth: true, role_gating: false }, false);
    let auth = [bearer(ANA_TOKEN)];
    send(&t.app, "POST", "/api/users/register", None, &auth).await;
    let (status, _, _) = send(&t.app, "GET", "/api/users", None, &auth).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Media
// =============================================================================

#[tokio::test]
async fn test_media_single_deletes() {
    let t = create_test_app();
    let image = "/api/cloudinary/delete/image";
    let (status, body, _) = send(&t.app, "DELETE", image, Some(json!({"publicId": "products/a"})), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["result"], "ok");

    let (status, body, _) = send(&t.app, "DELETE", image, Some(json!({"publicId": "missing"})), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body, _) = send(&t.app, "DELETE", image, Some(json!({"publicId": "locked"})), &[]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);

    let (status, _, _) = send(&t.app, "DELETE", image, Some(json!({})), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let video = "/api/cloudinary/delete/video";
    let (status, body, _) = send(&t.app, "DELETE", video, Some(json!({"publicId": "missing"})), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Video deleted successfully");
}

#[tokio::test]
async fn test_media_batch_delete() {
    let t = create_test_app();
    let uri = "/api/cloudinary/delete/batch";
    let ids = json!({"publicIds": ["a", "b", "missing"]});
    let (status, body, _) = send(&t.app, "POST", uri, Some(ids), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deletedCount"], 3);
    assert_eq!(body["totalRequested"], 3);
    assert_eq!(body["result"]["deleted"]["missing"], "not_found");

    let (status, _, _) = send(&t.app, "POST", uri, Some(json!({"publicIds": []})), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_media_without_configuration() {
    let t = build(AccessFlags::default(), false);
    let (status, body, _) =
        send(&t.app, "DELETE", "/api/cloudinary/delete/image", Some(json!({"publicId": "a"})), &[]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Cloudinary configuration error");
}

#[tokio::test]
async fn test_wishlist_product_id_case_names_one_row() {
    let t = create_test_app();
    let product = create_product(&t.app, "WL-700").await;
    let auth = [bearer(ANA_TOKEN)];
    let toggle = format!("/api/wishlist/{ANA}/toggle");

    let (status, _, _) = send(&t.app, "POST", &toggle, Some(json!({"productId": product})), &auth).await;
    assert_eq!(status, StatusCode::CREATED);
    let upper = product.to_uppercase();
    let (_, check, _) = send(&t.app, "GET", &format!("/api/wishlist/{ANA}/check/{upper}"), None, &auth).await;
    assert_eq!(check["inWishlist"], true);
    let (status, body, _) = send(&t.app, "POST", &toggle, Some(json!({"productId": upper})), &auth).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inWishlist"], false);

    let (_, count, _) = send(&t.app, "GET", &format!("/api/wishlist/{ANA}/count"), None, &auth).await;
    assert_eq!(count["count"], 0);
}

#[tokio::test]
async fn test_wishlist_path_user_case_is_exact() {
    let t = create_test_app();
    let (status, _, _) =
        send(&t.app, "GET", "/api/wishlist/Ana@Example.com/count", None, &[bearer(ANA_TOKEN)]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unstorable_prices_rejected() {
    let t = create_test_app();
    let mut body = product_body("AB-800");
    body["oldPrice"] = Value::Null;
    body["newPrice"] = json!(0.004);
    let (status, response, _) = send(&t.app, "POST", "/api/products", Some(body), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["message"], "Price cannot have more than 2 decimal places");

    let mut body = product_body("AB-800");
    body["stock"] = json!(5_000_000_000i64);
    let (status, response, _) = send(&t.app, "POST", "/api/products", Some(body), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["message"], "Stock is too large");

    let (_, products, _) = send(&t.app, "GET", "/products", None, &[]).await;
    assert_eq!(products, json!([]));
}
