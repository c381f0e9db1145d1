use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use templeerp_auth::{JwtClaims, PrincipalId, Role};
use templeerp_core::TenantId;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over in-memory stores, bound to an ephemeral port.
        let app = templeerp_api::app::build_app(SECRET.to_string()).expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    /// POST expecting 201 and return the new id.
    async fn create(&self, token: &str, path: &str, body: Value) -> String {
        let res = self.post(token, path, body).await;
        assert_eq!(res.status(), StatusCode::CREATED, "POST {path}");
        let body: Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    /// Read models are updated asynchronously; poll until `ready` accepts the body.
    async fn eventually(&self, token: &str, path: &str, ready: impl Fn(&Value) -> bool) -> Value {
        for _ in 0..100 {
            let res = self.get(token, path).await;
            if res.status() == StatusCode::OK {
                let body: Value = res.json().await.unwrap();
                if ready(&body) {
                    return body;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("GET {path} did not reach the expected state in time");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(tenant_id: TenantId, roles: &[&str]) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        tenant_id,
        roles: roles.iter().map(|r| Role::new(r.to_string())).collect(),
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().and_then(|s| s.parse().ok()).unwrap_or_else(|| panic!("not a decimal: {value}"))
}

async fn error_body(res: reqwest::Response) -> Value {
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].is_string(), "missing error code: {body}");
    assert!(body["message"].is_string(), "missing error message: {body}");
    body
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = error_body(res).await;
    assert_eq!(body["error"], "unauthorized");

    let res = srv.get("not-a-jwt", "/whoami").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tokens_signed_with_another_secret_are_rejected() {
    let srv = TestServer::spawn().await;
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        tenant_id: TenantId::new(),
        roles: vec![Role::new("admin")],
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };
    let forged = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"someone-else"),
    )
    .unwrap();

    let res = srv.get(&forged, "/whoami").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let token = mint_jwt(tenant_id, &["admin"]);

    let res = srv.get(&token, "/whoami").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn roles_gate_commands_per_module() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let viewer = mint_jwt(tenant_id, &["viewer"]);
    let accountant = mint_jwt(tenant_id, &["accountant"]);

    let res = srv
        .post(&viewer, "/products", json!({ "sku": "GHEE", "name": "Ghee", "kind": "raw_material", "uom": "kg" }))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = error_body(res).await;
    assert_eq!(body["error"], "forbidden");

    let res = srv
        .post(&accountant, "/inventory/warehouses", json!({ "code": "MAIN", "name": "Main store" }))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    srv.create(
        &accountant,
        "/accounting/ledgers",
        json!({ "code": "1100", "name": "Cash", "kind": "asset" }),
    )
    .await;
}

#[tokio::test]
async fn malformed_bodies_use_the_error_envelope() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), &["admin"]);

    let res = srv.post(&token, "/inventory/warehouses", json!({ "code": "MAIN" })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = error_body(res).await;
    assert_eq!(body["error"], "validation_error");

    let res = srv.get(&token, "/inventory/warehouses/not-a-uuid").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stock_lifecycle_receive_issue_query() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), &["storekeeper"]);

    let product_id = srv
        .create(
            &token,
            "/products",
            json!({ "sku": "WICK", "name": "Cotton wick", "kind": "raw_material", "uom": "unit", "standard_cost": 10 }),
        )
        .await;
    let res = srv.post(&token, &format!("/products/{product_id}/activate"), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let warehouse_id = srv
        .create(&token, "/inventory/warehouses", json!({ "code": "MAIN", "name": "Main store" }))
        .await;

    let res = srv
        .post(
            &token,
            &format!("/inventory/warehouses/{warehouse_id}/receipts"),
            json!({ "product_id": product_id, "quantity": "100", "unit_cost": 10, "reference": "GRN-1" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["events_committed"], 1);

    let res = srv
        .post(
            &token,
            &format!("/inventory/warehouses/{warehouse_id}/issues"),
            json!({ "product_id": product_id, "quantity": "30", "reference": "ISS-1" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    // Over-issue breaks the non-negative stock rule.
    let res = srv
        .post(
            &token,
            &format!("/inventory/warehouses/{warehouse_id}/issues"),
            json!({ "product_id": product_id, "quantity": "500", "reference": "ISS-2" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    error_body(res).await;

    let path = format!("/inventory/stock?warehouse_id={warehouse_id}&product_id={product_id}");
    let stock = srv
        .eventually(&token, &path, |b| {
            b["items"].as_array().is_some_and(|items| items.len() == 1 && decimal(&items[0]["quantity"]) == Decimal::from(70))
        })
        .await;
    assert_eq!(stock["items"][0]["sku"], "WICK");
    assert_eq!(decimal(&stock["items"][0]["available"]), Decimal::from(70));

    let movements = srv
        .eventually(&token, &format!("/inventory/movements?product_id={product_id}"), |b| {
            b["items"].as_array().is_some_and(|items| items.len() == 2)
        })
        .await;
    assert_eq!(movements["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn only_catalogued_goods_are_received() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), &["storekeeper"]);

    let seva = srv
        .create(&token, "/products", json!({ "sku": "ABHISHEKAM", "name": "Abhishekam", "kind": "service", "uom": "seva" }))
        .await;
    srv.post(&token, &format!("/products/{seva}/activate"), json!({})).await;
    let camphor = srv
        .create(&token, "/products", json!({ "sku": "CAMPHOR", "name": "Camphor", "kind": "consumable", "uom": "box" }))
        .await;
    let warehouse_id = srv
        .create(&token, "/inventory/warehouses", json!({ "code": "MAIN", "name": "Main store" }))
        .await;
    let receipts = format!("/inventory/warehouses/{warehouse_id}/receipts");

    // Services are never stocked; a draft product is not yet stockable.
    for product_id in [&seva, &camphor] {
        let res = srv
            .post(&token, &receipts, json!({ "product_id": product_id, "quantity": "5", "unit_cost": 10, "reference": "R-1" }))
            .await;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_body(res).await["error"], "invariant_violation");
    }

    let res = srv
        .post(
            &token,
            &receipts,
            json!({ "product_id": templeerp_products::ProductId::generate(), "quantity": "5", "unit_cost": 10, "reference": "R-2" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_body(res).await["error"], "not_found");
}

#[tokio::test]
async fn duplicate_sku_is_a_conflict() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), &["storekeeper"]);

    srv.create(
        &token,
        "/products",
        json!({ "sku": "LAMP", "name": "Ghee lamp", "kind": "finished_good", "uom": "unit" }),
    )
    .await;
    srv.eventually(&token, "/products", |b| {
        b["items"].as_array().is_some_and(|items| items.len() == 1)
    })
    .await;

    let res = srv
        .post(&token, "/products", json!({ "sku": "lamp", "name": "Another", "kind": "finished_good", "uom": "unit" }))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn books_post_and_report_balances() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), &["accountant"]);

    let cash = srv
        .create(&token, "/accounting/ledgers", json!({ "code": "1100", "name": "Cash", "kind": "asset" }))
        .await;
    let surplus = srv
        .create(&token, "/accounting/ledgers", json!({ "code": "3000", "name": "General fund", "kind": "equity" }))
        .await;
    let donations = srv
        .create(&token, "/accounting/ledgers", json!({ "code": "4000", "name": "Hundi donations", "kind": "revenue" }))
        .await;

    let year = srv
        .create(
            &token,
            "/accounting/years",
            json!({ "name": "2025-26", "from_date": "2025-04-01", "to_date": "2026-03-31" }),
        )
        .await;
    let res = srv.post(&token, &format!("/accounting/years/{year}/activate"), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);

    for (ledger_id, debit, credit) in [(&cash, 1_000, 0), (&surplus, 0, 1_000)] {
        let res = srv
            .post(
                &token,
                &format!("/accounting/years/{year}/opening-balances"),
                json!({ "ledger_id": ledger_id, "debit": debit, "credit": credit }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let entry = srv
        .create(
            &token,
            "/accounting/entries",
            json!({
                "entry_no": "RV-1",
                "entry_type": "receipt",
                "date": "2025-05-10",
                "ac_year_id": year,
                "fund_code": "GENERAL",
                "narration": "Hundi collection",
                "items": [
                    { "ledger_id": cash, "side": "debit", "amount": 300 },
                    { "ledger_id": donations, "side": "credit", "amount": 300 }
                ]
            }),
        )
        .await;

    // Unbalanced entries are rejected.
    let res = srv
        .post(
            &token,
            "/accounting/entries",
            json!({
                "entry_no": "RV-2",
                "entry_type": "receipt",
                "date": "2025-05-11",
                "ac_year_id": year,
                "items": [
                    { "ledger_id": cash, "side": "debit", "amount": 300 },
                    { "ledger_id": donations, "side": "credit", "amount": 200 }
                ]
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = error_body(res).await;
    assert_eq!(body["error"], "invariant_violation");

    let balance = srv
        .eventually(
            &token,
            &format!("/accounting/balances/{cash}?ac_year_id={year}&as_of=2025-12-31"),
            |b| b["balance"] == 1_300,
        )
        .await;
    assert_eq!(balance["display"], "13.00 Dr");

    let tb = srv
        .eventually(
            &token,
            &format!("/accounting/trial-balance?ac_year_id={year}&as_of=2025-12-31"),
            |b| b["total_debit"] == 1_300,
        )
        .await;
    assert_eq!(tb["total_credit"], 1_300);
    assert_eq!(tb["balanced"], true);

    let res = srv
        .post(&token, &format!("/accounting/entries/{entry}/void"), json!({ "reason": "counted twice" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    srv.eventually(
        &token,
        &format!("/accounting/balances/{cash}?ac_year_id={year}&as_of=2025-12-31"),
        |b| b["balance"] == 1_000,
    )
    .await;
}

#[tokio::test]
async fn cross_tenant_reads_are_not_found() {
    let srv = TestServer::spawn().await;
    let temple_a = mint_jwt(TenantId::new(), &["admin"]);
    let temple_b = mint_jwt(TenantId::new(), &["admin"]);

    let warehouse_id = srv
        .create(&temple_a, "/inventory/warehouses", json!({ "code": "MAIN", "name": "Main store" }))
        .await;

    let res = srv.get(&temple_a, &format!("/inventory/warehouses/{warehouse_id}")).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.get(&temple_b, &format!("/inventory/warehouses/{warehouse_id}")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = error_body(res).await;
    assert_eq!(body["error"], "not_found");

    let listed: Value = srv.get(&temple_b, "/inventory/warehouses").await.json().await.unwrap();
    assert!(listed["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn pagoda_lights_cannot_be_double_booked() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), &["temple_staff"]);

    let tower = srv
        .create(
            &token,
            "/temple/pagoda/towers",
            json!({ "code": "T1", "name": "East tower", "total_lights": 108, "annual_fee": 1_200 }),
        )
        .await;

    let registration = json!({
        "light_number": 7,
        "devotee_name": "Lakshmi",
        "start_date": "2025-01-01",
        "end_date": "2025-12-31",
        "amount_paid": 1_200
    });
    srv.create(&token, &format!("/temple/pagoda/towers/{tower}/registrations"), registration.clone())
        .await;

    let res = srv
        .post(&token, &format!("/temple/pagoda/towers/{tower}/registrations"), registration)
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv
        .get(&token, &format!("/temple/pagoda/towers/{tower}/availability?on=2025-06-01"))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["occupied_lights"], json!([7]));
    assert_eq!(body["available_lights"], 107);
}

#[tokio::test]
async fn bookings_track_payments() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), &["temple_staff"]);

    let booking = srv
        .create(
            &token,
            "/temple/bookings",
            json!({
                "booking_no": "BK-1",
                "service_name": "Abhishekam",
                "devotee_name": "Ravi",
                "booking_date": "2025-08-15",
                "amount": 500
            }),
        )
        .await;

    let res = srv
        .post(&token, &format!("/temple/bookings/{booking}/payments"), json!({ "amount": 200, "payment_mode": "cash" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.get(&token, &format!("/temple/bookings/{booking}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["paid"], 200);
    assert_eq!(body["balance_due"], 300);
}
