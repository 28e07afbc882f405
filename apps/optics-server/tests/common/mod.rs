//! Common test utilities and helpers

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use optics_db::repository::user::NewUser;
use optics_db::{Database, DbConfig};
use optics_server::auth::hash_password;
use optics_server::{build_router, AppState, ServerConfig};

pub const ADMIN_PASSWORD: &str = "admin-password";

pub struct TestApp {
    pub router: Router,
    #[allow(dead_code)]
    pub db: Database,
}

/// Fresh in-memory database with a superuser `admin`.
pub async fn setup_test_app() -> TestApp {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let hash = hash_password(ADMIN_PASSWORD).unwrap();
    db.users()
        .create(&NewUser {
            username: "admin",
            password_hash: &hash,
            email: Some("admin@example.com"),
            is_superuser: true,
        })
        .await
        .unwrap();

    let state = AppState::new(db.clone(), ServerConfig::default());
    TestApp {
        router: build_router(state),
        db,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn request(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request("POST", uri, Some(token), Some(body)).await
    }

    pub async fn login(&self, username: &str, password: &str, remember: bool) -> TestResponse {
        self.request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": username, "password": password, "remember": remember })),
        )
        .await
    }

    /// Logs in as the admin and returns the session token.
    pub async fn admin_token(&self) -> String {
        let response = self.login("admin", ADMIN_PASSWORD, false).await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response.body["token"].as_str().unwrap().to_string()
    }

    /// A customer plus one product with 10 in stock priced at 100.00.
    pub async fn customer_and_product(&self, token: &str) -> (String, String) {
        let customer = self
            .post(
                "/api/customers",
                token,
                json!({ "name": "Mohammed", "phone": "512345678", "gender": "male" }),
            )
            .await;
        assert_eq!(customer.status, StatusCode::OK, "{:?}", customer.body);

        let product = self
            .post(
                "/api/stock/products",
                token,
                json!({
                    "item_name": "Classic Frame",
                    "barcode": "6281000000013",
                    "quantity": 10,
                    "cost_price_cents": 6000,
                    "selling_price_cents": 10000
                }),
            )
            .await;
        assert_eq!(product.status, StatusCode::OK, "{:?}", product.body);

        (
            customer.body["id"].as_str().unwrap().to_string(),
            product.body["id"].as_str().unwrap().to_string(),
        )
    }
}
