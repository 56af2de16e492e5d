mod common;

use axum::http::{Method, StatusCode};
use common::{body_bytes, body_json, TestApp};
use fitmarket_api::entities::Role;
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = TestApp::new().await;
    for uri in ["/api/v1/order", "/api/v1/partner", "/api/v1/trainer"] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn signup_then_login_issues_a_usable_token() {
    let app = TestApp::new().await;

    let signup = app
        .request(
            Method::POST,
            "/api/v1/user/signup",
            Some(json!({
                "name": "Rita",
                "email": "Rita@Example.com",
                "contactNumber": "555-0142",
                "password": "correct-horse"
            })),
            None,
        )
        .await;
    assert_eq!(signup.status(), StatusCode::CREATED);
    let body = body_json(signup).await;
    assert_eq!(body["data"]["email"], "rita@example.com");
    assert_eq!(body["data"]["role"], "user");

    let duplicate = app
        .request(
            Method::POST,
            "/api/v1/user/signup",
            Some(json!({
                "name": "Rita",
                "email": "rita@example.com",
                "password": "correct-horse"
            })),
            None,
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let bad_login = app
        .request(
            Method::POST,
            "/api/v1/user/login",
            Some(json!({ "email": "rita@example.com", "password": "wrong-horse" })),
            None,
        )
        .await;
    assert_eq!(bad_login.status(), StatusCode::UNAUTHORIZED);

    let login = app
        .request(
            Method::POST,
            "/api/v1/user/login",
            Some(json!({ "email": "rita@example.com", "password": "correct-horse" })),
            None,
        )
        .await;
    assert_eq!(login.status(), StatusCode::OK);
    let body = body_json(login).await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let me = app
        .request(Method::GET, "/api/v1/user/me", None, Some(&token))
        .await;
    assert_eq!(me.status(), StatusCode::OK);
    assert_eq!(body_json(me).await["data"]["name"], "Rita");

    // user listing is admin only
    let users = app
        .request(Method::GET, "/api/v1/user", None, Some(&token))
        .await;
    assert_eq!(users.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn order_placement_and_bill_over_http() {
    let app = TestApp::new().await;
    let buyer = app.create_user("buyer@example.com", Role::User).await;
    let token = app.token_for(&buyer);
    let product = app.create_product("Kettlebell", dec!(35.50)).await;

    let placed = app
        .request(
            Method::POST,
            "/api/v1/order",
            Some(json!({
                "isGenerate": true,
                "name": "Buyer",
                "email": "buyer@example.com",
                "contactNumber": "555-0100",
                "country": "US",
                "state": "CA",
                "city": "Oakland",
                "postalCode": "94607",
                "address": "1 Broadway",
                "paymentMethod": "cash",
                "productDetails": [{ "productId": product.id, "quantity": 2 }]
            })),
            Some(&token),
        )
        .await;
    assert_eq!(placed.status(), StatusCode::OK);
    let body = body_json(placed).await;
    let uuid = body["data"]["uuid"].as_str().unwrap().to_string();
    assert!(!uuid.is_empty());

    let listed = body_json(
        app.request(Method::GET, "/api/v1/order", None, Some(&token))
            .await,
    )
    .await;
    let order = &listed["data"][0];
    assert_eq!(order["uuid"], uuid.as_str());
    assert_eq!(order["details"][0]["quantity"], 2);
    let id = order["id"].as_i64().unwrap();

    let pending = app
        .request(Method::GET, "/api/v1/order/status/pending", None, Some(&token))
        .await;
    assert_eq!(pending.status(), StatusCode::OK);

    // status toggling is admin only
    let toggle = app
        .request(
            Method::PUT,
            &format!("/api/v1/order/status/{id}"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(toggle.status(), StatusCode::UNAUTHORIZED);

    let bill = app
        .request(
            Method::GET,
            &format!("/api/v1/order/bill/{id}"),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(bill.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(bill).await).unwrap();
    assert!(text.ends_with(&format!("{uuid}.pdf")));
    assert!(app.bill_dir.path().join(format!("{uuid}.pdf")).exists());
}

#[tokio::test]
async fn invalid_order_payload_is_rejected() {
    let app = TestApp::new().await;
    let buyer = app.create_user("buyer@example.com", Role::User).await;
    let token = app.token_for(&buyer);

    let response = app
        .request(
            Method::POST,
            "/api/v1/order",
            Some(json!({ "name": "Buyer", "productDetails": [] })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["message"].as_str().is_some());
}
