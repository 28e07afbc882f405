//! HTTP-level tests: auth, permissions and the invoice flow through the router.

mod common;

use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use serde_json::json;

use common::{setup_test_app, ADMIN_PASSWORD};

#[tokio::test]
async fn test_health() {
    let app = setup_test_app().await;
    let response = app.request("GET", "/health", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["database"], true);
}

#[tokio::test]
async fn test_login_sets_browser_session_cookie() {
    let app = setup_test_app().await;
    let response = app.login("admin", ADMIN_PASSWORD, false).await;

    assert_eq!(response.status, StatusCode::OK);
    let cookie = response.headers[SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("optics_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(!cookie.contains("Max-Age"));
    assert_eq!(response.body["user"]["username"], "admin");
    assert!(response.body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_login_remember_me_persists_cookie() {
    let app = setup_test_app().await;
    let response = app.login("admin", ADMIN_PASSWORD, true).await;

    assert_eq!(response.status, StatusCode::OK);
    let cookie = response.headers[SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("Max-Age=1209600"));
    assert_eq!(response.body["expires_in"], 1_209_600);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = setup_test_app().await;

    let response = app.login("admin", "not-the-password", false).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "INVALID_CREDENTIALS");

    let response = app.login("nobody", ADMIN_PASSWORD, false).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_api_requires_login() {
    let app = setup_test_app().await;

    let response = app.request("GET", "/api/customers", None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.get("/api/customers", "made-up-token").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;

    let request = axum::http::Request::builder()
        .uri("/auth/me")
        .header("Cookie", format!("theme=dark; optics_session={token}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_me_lists_superuser_permissions() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;

    let response = app.get("/auth/me", &token).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"]["is_superuser"], true);
    assert_eq!(response.body["permissions"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;

    let response = app.request("POST", "/auth/logout", Some(&token), None).await;
    assert_eq!(response.status, StatusCode::OK);
    let cookie = response.headers[SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));

    let response = app.get("/auth/me", &token).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invoice_flow() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;
    let (customer_id, product_id) = app.customer_and_product(&token).await;

    let sale = app
        .post(
            "/api/sales",
            &token,
            json!({
                "customer_id": customer_id,
                "products": [{ "product_id": product_id, "quantity": 1, "unit_price_cents": 10000 }],
                "paid_cents": 5000
            }),
        )
        .await;
    assert_eq!(sale.status, StatusCode::OK, "{:?}", sale.body);
    assert_eq!(sale.body["order_number"], "INV-00001");
    assert_eq!(sale.body["subtotal_cents"], 10000);
    assert_eq!(sale.body["tax_cents"], 1500);
    assert_eq!(sale.body["total_cents"], 11500);
    assert_eq!(sale.body["remaining_cents"], 6500);
    assert_eq!(sale.body["payment_status"], "partial");
    let sale_id = sale.body["id"].as_str().unwrap().to_string();

    // Stock went out with the sale
    let product = app.get(&format!("/api/stock/products/{product_id}"), &token).await;
    assert_eq!(product.body["product"]["quantity"], 9);

    let overpay = app
        .post(
            &format!("/api/sales/{sale_id}/payments"),
            &token,
            json!({ "amount_cents": 7000 }),
        )
        .await;
    assert_eq!(overpay.status, StatusCode::BAD_REQUEST);
    assert_eq!(overpay.body["code"], "PAYMENT_EXCEEDS_BALANCE");

    let payment = app
        .post(
            &format!("/api/sales/{sale_id}/payments"),
            &token,
            json!({ "amount_cents": 6500 }),
        )
        .await;
    assert_eq!(payment.status, StatusCode::OK, "{:?}", payment.body);

    let detail = app.get(&format!("/api/sales/{sale_id}"), &token).await;
    assert_eq!(detail.body["is_paid"], true);
    assert_eq!(detail.body["payments"].as_array().unwrap().len(), 2);

    let by_number = app.get("/api/sales/number/INV-00001", &token).await;
    assert_eq!(by_number.body["id"], sale_id.as_str());

    let note = app
        .post(&format!("/api/sales/{sale_id}/credit-note"), &token, json!({}))
        .await;
    assert_eq!(note.status, StatusCode::OK, "{:?}", note.body);
    assert_eq!(note.body["order_number"], "CN-INV-00001");

    let note_id = note.body["id"].as_str().unwrap();
    let nested = app
        .post(&format!("/api/sales/{note_id}/credit-note"), &token, json!({}))
        .await;
    assert_eq!(nested.status, StatusCode::BAD_REQUEST);
    assert_eq!(nested.body["code"], "NOTE_OF_NOTE");
}

#[tokio::test]
async fn test_empty_invoice_rejected() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;
    let (customer_id, _) = app.customer_and_product(&token).await;

    let response = app
        .post("/api/sales", &token, json!({ "customer_id": customer_id }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "EMPTY_INVOICE");
}

#[tokio::test]
async fn test_duplicate_customer_phone() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;
    app.customer_and_product(&token).await;

    let response = app
        .post(
            "/api/customers",
            &token,
            json!({ "name": "Another", "phone": "512345678", "gender": "female" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["code"], "DUPLICATE");
}

#[tokio::test]
async fn test_invalid_customer_phone() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;

    let response = app
        .post(
            "/api/customers",
            &token,
            json!({ "name": "Bad", "phone": "0512345678", "gender": "male" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_garbage_filters_are_ignored() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;
    app.customer_and_product(&token).await;

    let response = app
        .get("/api/customers?date_from=garbage&date_to=31-12-2024", &token)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 1);

    let response = app.get("/api/sales?status=bogus&payment_status=nope", &token).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app.get("/api/reports/sales?date_from=yesterday", &token).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_group_permissions_are_enforced() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;
    let (customer_id, product_id) = app.customer_and_product(&token).await;

    let group = app
        .post(
            "/api/groups",
            &token,
            json!({ "name": "Front desk", "name_arabic": "الاستقبال", "manage_customers": true }),
        )
        .await;
    assert_eq!(group.status, StatusCode::OK, "{:?}", group.body);
    let group_id = group.body["id"].as_str().unwrap();

    let employee = app
        .post(
            "/api/employees",
            &token,
            json!({
                "email": "Sara@optics.test",
                "employee_id": "E-001",
                "full_name": "Sara Ali",
                "position": "sales",
                "gender": "female",
                "phone": "0512345678",
                "password": "front-desk-1",
                "group_ids": [group_id]
            }),
        )
        .await;
    assert_eq!(employee.status, StatusCode::OK, "{:?}", employee.body);

    let login = app.login("sara", "front-desk-1", false).await;
    assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);
    assert_eq!(login.body["permissions"], json!(["manage_customers"]));
    let staff = login.body["token"].as_str().unwrap().to_string();

    // Reads only need a login
    let response = app.get("/api/sales", &staff).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .post(
            "/api/sales",
            &staff,
            json!({
                "customer_id": customer_id,
                "products": [{ "product_id": product_id, "quantity": 1, "unit_price_cents": 10000 }]
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["code"], "FORBIDDEN");

    let response = app.get("/api/reports/profit", &staff).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.get("/api/groups", &staff).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .post(
            "/api/customers",
            &staff,
            json!({ "name": "Walk-in", "phone": "598765432", "gender": "male" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
}

#[tokio::test]
async fn test_disabled_employee_cannot_login() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;

    let employee = app
        .post(
            "/api/employees",
            &token,
            json!({
                "email": "omar@optics.test",
                "employee_id": "E-002",
                "full_name": "Omar Saleh",
                "position": "cashier",
                "phone": "0598765432",
                "password": "cashier-pass"
            }),
        )
        .await;
    assert_eq!(employee.status, StatusCode::OK, "{:?}", employee.body);
    let id = employee.body["id"].as_str().unwrap();

    let toggled = app
        .post(
            &format!("/api/employees/{id}/toggle-active"),
            &token,
            json!({ "reason": "left the company" }),
        )
        .await;
    assert_eq!(toggled.status, StatusCode::OK, "{:?}", toggled.body);

    let login = app.login("omar", "cashier-pass", false).await;
    assert_eq!(login.status, StatusCode::FORBIDDEN);
    assert_eq!(login.body["code"], "ACCOUNT_DISABLED");
}

#[tokio::test]
async fn test_employee_password_too_short() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;

    let response = app
        .post(
            "/api/employees",
            &token,
            json!({
                "email": "short@optics.test",
                "employee_id": "E-003",
                "full_name": "Short Pass",
                "position": "other",
                "phone": "0511111111",
                "password": "abc"
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_sale_is_not_found() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;

    let response = app.get("/api/sales/does-not-exist", &token).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_report_date_at_calendar_edge_is_ignored() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;

    for report in ["dashboard", "revenue", "sales", "profit"] {
        let response = app
            .get(&format!("/api/reports/{report}?date_to=-262143-01-01"), &token)
            .await;
        assert_eq!(response.status, StatusCode::OK, "{report}: {:?}", response.body);
    }
}

#[tokio::test]
async fn test_oversized_line_price_rejected() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;
    let (customer_id, product_id) = app.customer_and_product(&token).await;

    let response = app
        .post(
            "/api/sales",
            &token,
            json!({
                "customer_id": customer_id,
                "products": [{ "product_id": product_id, "quantity": 3, "unit_price_cents": 4611686018427387903i64 }]
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["code"], "VALIDATION_ERROR");

    // Nothing was saved and no stock moved
    let product = app.get(&format!("/api/stock/products/{product_id}"), &token).await;
    assert_eq!(product.body["product"]["quantity"], 10);
}

#[tokio::test]
async fn test_oversold_product_can_be_renamed() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;
    let (customer_id, _) = app.customer_and_product(&token).await;

    let product = app
        .post(
            "/api/stock/products",
            &token,
            json!({
                "item_name": "Daily Lens",
                "barcode": "6281000000020",
                "quantity": 0,
                "cost_price_cents": 2000,
                "selling_price_cents": 3500
            }),
        )
        .await;
    assert_eq!(product.status, StatusCode::OK, "{:?}", product.body);
    let product_id = product.body["id"].as_str().unwrap().to_string();

    let sale = app
        .post(
            "/api/sales",
            &token,
            json!({
                "customer_id": customer_id,
                "products": [{ "product_id": product_id, "quantity": 2, "unit_price_cents": 3500 }]
            }),
        )
        .await;
    assert_eq!(sale.status, StatusCode::OK, "{:?}", sale.body);

    let renamed = app
        .request(
            "PUT",
            &format!("/api/stock/products/{product_id}"),
            Some(&token),
            Some(json!({
                "item_name": "Daily Lens 30 pack",
                "barcode": "6281000000020",
                "quantity": -2,
                "cost_price_cents": 2000,
                "selling_price_cents": 3800
            })),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK, "{:?}", renamed.body);
    assert_eq!(renamed.body["item_name"], "Daily Lens 30 pack");
    assert_eq!(renamed.body["quantity"], -2);
}

#[tokio::test]
async fn test_out_of_range_page_is_harmless() {
    let app = setup_test_app().await;
    let token = app.admin_token().await;
    app.customer_and_product(&token).await;

    let response = app
        .get("/api/customers?search=Moh&page=9223372036854775807", &token)
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.body["total"], 1);
    assert_eq!(response.body["items"], json!([]));

    let response = app.get("/api/sales?page=9223372036854775807", &token).await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);

    let response = app.get("/api/customers?search=Moh&page=abc", &token).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["page"], 1);
}
