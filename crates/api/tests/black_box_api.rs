use chrono::{Duration as ChronoDuration, Utc};
use exactmatch_api::config::Config;
use exactmatch_auth::{Role, UserClaims};
use exactmatch_core::UserId;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let config = Config::for_tests(SECRET);
        let app = exactmatch_api::app::build_app(&config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind(config.bind_addr)
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.get(self.url(path));
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn send(&self, method: reqwest::Method, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .request(method, self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, token, body).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct User {
    id: UserId,
    token: String,
}

fn mint_jwt(username: &str, roles: &[&'static str]) -> User {
    let now = Utc::now();
    let id = UserId::new();
    let claims = UserClaims {
        sub: id,
        username: username.to_string(),
        email: Some(format!("{username}@example.com")),
        first_name: Some(username.to_uppercase()),
        last_name: None,
        roles: roles.iter().map(|r| Role::new(*r)).collect(),
        iat: now.timestamp(),
        exp: (now + ChronoDuration::minutes(10)).timestamp(),
    };

    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt");
    User { id, token }
}

struct Catalog {
    brand: String,
    mega: String,
    commercial: String,
}

/// Two batteries: "Mega-Tron" at 300 and "Commercial" at 100.
async fn seed(server: &TestServer) -> Catalog {
    let admin = mint_jwt("admin", &["admin"]);

    let (status, brand) = server
        .post(
            "/admin/brands",
            &admin.token,
            json!({"name": "Interstate", "logo": "brands/interstate.png"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(brand["logo"], "http://localhost:8080/media/brands/interstate.png");

    let (status, category) = server
        .post(
            "/admin/categories",
            &admin.token,
            json!({"name": "Automotive", "type": "vehicle_type"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let battery = |name: &str, price: u32, stock: u32| {
        json!({
            "name": name,
            "brand_id": brand["id"],
            "category_id": category["id"],
            "model_number": "MT-7",
            "voltage": "12",
            "amp_hours": "70",
            "cold_cranking_amps": 700,
            "condition": "new",
            "price": price,
            "stock_quantity": stock,
            "compatibility": "Ford F-150 2015-2020",
        })
    };

    let (status, mega) = server
        .post("/admin/batteries", &admin.token, battery("Mega-Tron", 300, 5))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{mega}");

    let (status, commercial) = server
        .post("/admin/batteries", &admin.token, battery("Commercial", 100, 0))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{commercial}");

    let mega_id = mega["id"].as_str().unwrap().to_string();
    let (status, image) = server
        .post(
            &format!("/admin/batteries/{mega_id}/images"),
            &admin.token,
            json!({"image": "batteries/mega.jpg", "alt_text": "front", "is_primary": true}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(image["image"], "http://localhost:8080/media/batteries/mega.jpg");

    Catalog {
        brand: brand["id"].as_str().unwrap().to_string(),
        mega: mega_id,
        commercial: commercial["id"].as_str().unwrap().to_string(),
    }
}

fn checkout(items: Value) -> Value {
    json!({
        "shipping_address": "1 Main St",
        "shipping_city": "Springfield",
        "shipping_postal_code": "12345",
        "shipping_country": "US",
        "phone_number": "555-0100",
        "items": items,
    })
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let (status, body) = server.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let server = TestServer::spawn().await;

    let (status, body) = server.get("/orders", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = server.get("/users/me", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &json!({"sub": UserId::new(), "username": "eve", "iat": 0, "exp": 4_000_000_000i64}),
        &EncodingKey::from_secret(b"wrong-secret"),
    )
    .unwrap();
    let (status, _) = server.get("/users/me", Some(&forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn catalog_management_requires_permission() {
    let server = TestServer::spawn().await;
    let customer = mint_jwt("alice", &[]);
    let staff = mint_jwt("sam", &["staff"]);

    for user in [&customer, &staff] {
        let (status, body) = server
            .post("/admin/brands", &user.token, json!({"name": "Bosch"}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
    }
}

#[tokio::test]
async fn admin_battery_with_unknown_brand_is_rejected() {
    let server = TestServer::spawn().await;
    let admin = mint_jwt("admin", &["admin"]);
    let (status, category) = server
        .post("/admin/categories", &admin.token, json!({"name": "Marine"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = server
        .post(
            "/admin/batteries",
            &admin.token,
            json!({
                "name": "Ghost",
                "brand_id": UserId::new(),
                "category_id": category["id"],
                "model_number": "G-1",
                "voltage": "12",
                "amp_hours": "50",
                "condition": "new",
                "price": 10,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn browse_filter_and_detail() {
    let server = TestServer::spawn().await;
    let catalog = seed(&server).await;

    let (status, list) = server.get("/batteries", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 2);
    let first = &list["results"][0];
    assert_eq!(first["name"], "Commercial", "newest first");
    assert_eq!(first["brand"]["name"], "Interstate");
    assert_eq!(first["is_in_stock"], false);

    let (_, by_price) = server.get("/batteries?ordering=-price", None).await;
    assert_eq!(by_price["results"][0]["id"], catalog.mega.as_str());
    assert_eq!(
        by_price["results"][0]["primary_image"],
        "http://localhost:8080/media/batteries/mega.jpg"
    );
    assert_eq!(by_price["results"][0]["price"], "300.00");
    assert_eq!(by_price["results"][0]["slug"], "mega-tron-mt-7");

    let (_, hits) = server.get("/batteries/search?q=mega", None).await;
    assert_eq!(hits["count"], 1);

    let (_, hits) = server.get("/batteries?in_stock=true&vehicle_search=f-150", None).await;
    assert_eq!(hits["count"], 1);
    assert_eq!(hits["results"][0]["id"], catalog.mega.as_str());

    let (_, hits) = server
        .get(&format!("/batteries?brands={}&max_price=150", catalog.brand), None)
        .await;
    assert_eq!(hits["count"], 1);
    assert_eq!(hits["results"][0]["id"], catalog.commercial.as_str());

    let (_, page) = server.get("/batteries?page=2&page_size=1", None).await;
    assert_eq!(page["count"], 2);
    assert_eq!(page["results"].as_array().unwrap().len(), 1);

    let (status, detail) = server.get(&format!("/batteries/{}", catalog.mega), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["category"]["name"], "Automotive");
    assert_eq!(detail["images"].as_array().unwrap().len(), 1);
    assert_eq!(detail["review_count"], 0);
    assert_eq!(detail["average_rating"], 0.0);

    let (status, body) = server.get("/batteries/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, _) = server.get(&format!("/batteries/{}", UserId::new()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server.get("/batteries?min_cca=lots", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (_, categories) = server.get("/categories?type=vehicle_type", None).await;
    assert_eq!(categories["count"], 1);
    let (_, categories) = server.get("/categories?type=use_case", None).await;
    assert_eq!(categories["count"], 0);

    let (status, brand) = server.get(&format!("/brands/{}", catalog.brand), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(brand["name"], "Interstate");
}

#[tokio::test]
async fn order_totals_are_computed_server_side() {
    let server = TestServer::spawn().await;
    let catalog = seed(&server).await;
    let alice = mint_jwt("alice", &[]);

    // Client-sent money fields are ignored.
    let mut forged = checkout(json!([
        {"battery_id": catalog.mega, "quantity": 2, "unit_price": "0.01", "total_price": "0.02"}
    ]));
    forged["subtotal"] = json!("0.01");
    forged["shipping_cost"] = json!("0.00");
    forged["tax_amount"] = json!("0.00");
    forged["total_amount"] = json!("0.01");

    let (status, order) = server.post("/orders", &alice.token, forged).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["user_name"], "alice");
    assert_eq!(order["subtotal"], "600.00");
    assert_eq!(order["shipping_cost"], "0.00");
    assert_eq!(order["tax_amount"], "60.00");
    assert_eq!(order["total_amount"], "660.00");
    assert_eq!(order["items"][0]["battery_name"], "Mega-Tron");
    assert_eq!(order["items"][0]["unit_price"], "300.00");
    assert_eq!(order["items"][0]["total_price"], "600.00");

    let (status, small) = server
        .post(
            "/orders",
            &alice.token,
            checkout(json!([{"battery": catalog.commercial, "quantity": 1}])),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(small["subtotal"], "100.00");
    assert_eq!(small["shipping_cost"], "50.00");
    assert_eq!(small["tax_amount"], "10.00");
    assert_eq!(small["total_amount"], "160.00");

    let (_, mine) = server.get("/orders", Some(&alice.token)).await;
    assert_eq!(mine["count"], 2);
}

#[tokio::test]
async fn amounts_beyond_the_storable_range_are_rejected() {
    let server = TestServer::spawn().await;
    let catalog = seed(&server).await;
    let admin = mint_jwt("admin", &["admin"]);
    let bob = mint_jwt("bob", &[]);

    let (_, category) = server
        .post("/admin/categories", &admin.token, json!({"name": "Solar"}))
        .await;
    let (status, body) = server
        .post(
            "/admin/batteries",
            &admin.token,
            json!({
                "name": "Gold Plated",
                "brand_id": catalog.brand,
                "category_id": category["id"],
                "model_number": "GP-1",
                "voltage": "12",
                "amp_hours": "50",
                "condition": "new",
                "price": "100000000",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");

    // 1,000,000 x 300.00
    let (status, body) = server
        .post(
            "/orders",
            &bob.token,
            checkout(json!([{"battery_id": catalog.mega, "quantity": 1_000_000}])),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_error");

    let (status, body) = server
        .post(
            "/orders",
            &bob.token,
            checkout(json!([{"battery_id": catalog.mega, "quantity": 4_000_000_000u64}])),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (_, orders) = server.get("/orders", Some(&bob.token)).await;
    assert_eq!(orders["count"], 0);
}

#[tokio::test]
async fn unknown_battery_aborts_the_whole_order() {
    let server = TestServer::spawn().await;
    let catalog = seed(&server).await;
    let bob = mint_jwt("bob", &[]);

    let (status, body) = server
        .post(
            "/orders",
            &bob.token,
            checkout(json!([
                {"battery_id": catalog.mega, "quantity": 1},
                {"battery_id": UserId::new(), "quantity": 1},
            ])),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (_, orders) = server.get("/orders", Some(&bob.token)).await;
    assert_eq!(orders["count"], 0);

    for items in [json!([]), json!([{"battery_id": catalog.mega, "quantity": 0}])] {
        let (status, body) = server.post("/orders", &bob.token, checkout(items)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    let mut blank = checkout(json!([{"battery_id": catalog.mega, "quantity": 1}]));
    blank["shipping_city"] = json!("  ");
    let (status, _) = server.post("/orders", &bob.token, blank).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn orders_are_private_and_staff_drive_status() {
    let server = TestServer::spawn().await;
    let catalog = seed(&server).await;
    let alice = mint_jwt("alice", &[]);
    let mallory = mint_jwt("mallory", &[]);
    let staff = mint_jwt("sam", &["staff"]);

    let (_, order) = server
        .post(
            "/orders",
            &alice.token,
            checkout(json!([{"battery_id": catalog.mega, "quantity": 1}])),
        )
        .await;
    let path = format!("/orders/{}", order["id"].as_str().unwrap());

    let (status, _) = server.get(&path, Some(&mallory.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, theirs) = server.get("/orders", Some(&mallory.token)).await;
    assert_eq!(theirs["count"], 0);

    let (status, _) = server
        .send(reqwest::Method::PATCH, &path, &alice.token, json!({"status": "processing"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, all) = server.get("/orders", Some(&staff.token)).await;
    assert_eq!(all["count"], 1);

    let (status, body) = server
        .send(reqwest::Method::PATCH, &path, &staff.token, json!({"status": "delivered"}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invariant_violation");

    for next in ["processing", "shipped"] {
        let (status, body) = server
            .send(reqwest::Method::PATCH, &path, &staff.token, json!({"status": next}))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], next);
    }

    let (_, shipped) = server.get(&path, Some(&alice.token)).await;
    assert_eq!(shipped["status"], "shipped");
    assert!(shipped["shipped_at"].is_string());
    assert_eq!(shipped["delivered_at"], Value::Null);
    assert_eq!(shipped["total_amount"], order["total_amount"]);

    let (status, _) = server
        .send(reqwest::Method::PATCH, &path, &staff.token, json!({"status": "cancelled"}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn reviews_are_unique_and_marked_verified() {
    let server = TestServer::spawn().await;
    let catalog = seed(&server).await;
    let buyer = mint_jwt("buyer", &[]);
    let browser = mint_jwt("browser", &[]);

    server
        .post(
            "/orders",
            &buyer.token,
            checkout(json!([{"battery_id": catalog.mega, "quantity": 1}])),
        )
        .await;

    let review = |rating: u8| {
        json!({"battery": catalog.mega, "rating": rating, "title": "Solid", "comment": "Starts every time."})
    };

    let (status, created) = server.post("/reviews", &buyer.token, review(5)).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["is_verified_purchase"], true);
    assert_eq!(created["user_name"], "buyer");

    let (status, body) = server.post("/reviews", &buyer.token, review(4)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, other) = server.post("/reviews", &browser.token, review(4)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(other["is_verified_purchase"], false);

    let (status, _) = server.post("/reviews", &browser.token, review(6)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, detail) = server.get(&format!("/batteries/{}", catalog.mega), None).await;
    assert_eq!(detail["review_count"], 2);
    assert_eq!(detail["average_rating"], 4.5);

    let (_, reviews) = server
        .get(&format!("/batteries/{}/reviews", catalog.mega), None)
        .await;
    assert_eq!(reviews["count"], 2);
}

#[tokio::test]
async fn wishlist_add_is_idempotent_and_owner_scoped() {
    let server = TestServer::spawn().await;
    let catalog = seed(&server).await;
    let alice = mint_jwt("alice", &[]);
    let bob = mint_jwt("bob", &[]);

    let (status, entry) = server
        .post("/wishlist", &alice.token, json!({"battery_id": catalog.mega}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(entry["battery"]["name"], "Mega-Tron");

    let (status, again) = server
        .post("/wishlist", &alice.token, json!({"battery": catalog.mega}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["id"], entry["id"]);

    let (_, list) = server.get("/wishlist", Some(&alice.token)).await;
    assert_eq!(list["count"], 1);

    let path = format!("/wishlist/{}", entry["id"].as_str().unwrap());
    let (status, _) = server
        .send(reqwest::Method::DELETE, &path, &bob.token, Value::Null)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server
        .send(reqwest::Method::DELETE, &path, &alice.token, Value::Null)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = server.get("/wishlist", Some(&alice.token)).await;
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn users_me_reflects_token_profile() {
    let server = TestServer::spawn().await;
    let carol = mint_jwt("carol", &[]);

    let (status, me) = server.get("/users/me", Some(&carol.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], carol.id.to_string());
    assert_eq!(me["username"], "carol");
    assert_eq!(me["email"], "carol@example.com");
    assert_eq!(me["first_name"], "CAROL");
    assert_eq!(me["last_name"], "");
    let joined = me["date_joined"].clone();

    let (_, again) = server.get("/users/me", Some(&carol.token)).await;
    assert_eq!(again["date_joined"], joined);
}
