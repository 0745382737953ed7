//! Authentication and role checks across the HTTP surface.

mod common;

use axum::http::{header, Method, StatusCode};
use common::{id_of, response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::new().await;

    for uri in [
        "/api/v1/requests",
        "/api/v1/products",
        "/api/v1/users",
        "/api/v1/profile",
        "/api/v1/notifications",
    ] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    let response = app
        .request(Method::GET, "/api/v1/requests", Some("not-a-jwt"), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_INVALID_TOKEN");
}

#[tokio::test]
async fn public_routes_answer_without_a_token() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"]["status"], "up");

    let response = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");

    let response = app
        .request(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_issues_a_usable_token() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "RUI@example.com", "password": "s3cure-Passw0rd" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["user"]["email"], "rui@example.com");
    assert_eq!(body["user"]["role"], "requester");
    assert!(body["user"].get("password_hash").is_none());
    let token = body["token"].as_str().unwrap().to_string();

    let response = app
        .request(Method::GET, "/api/v1/profile", Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let profile = response_json(response).await;
    assert_eq!(profile["id"], app.requester.user.id.to_string());
}

#[tokio::test]
async fn wrong_password_and_unknown_email_fail_alike() {
    let app = TestApp::new().await;

    for body in [
        json!({ "email": "rui@example.com", "password": "wrong-password" }),
        json!({ "email": "nobody@example.com", "password": "s3cure-Passw0rd" }),
    ] {
        let response = app
            .request(Method::POST, "/api/v1/auth/login", None, Some(body))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = response_json(response).await;
        assert_eq!(body["error"]["code"], "AUTH_INVALID_CREDENTIALS");
    }
}

#[tokio::test]
async fn requesters_are_kept_out_of_admin_operations() {
    let app = TestApp::new().await;
    let paper = app.seed_product("A4 paper").await;
    let created = app.create_request(&[(paper.id, 2)]).await;
    let request_id = id_of(&created["request"]);
    let item_id = id_of(&created["items"][0]);

    let attempts = [
        (
            Method::PATCH,
            format!("/api/v1/requests/{request_id}/items/{item_id}/review"),
            Some(json!({ "status": "approved" })),
        ),
        (
            Method::PATCH,
            format!("/api/v1/requests/{request_id}/review"),
            Some(json!({ "status": "approved" })),
        ),
        (
            Method::POST,
            format!("/api/v1/requests/{request_id}/toggle-urgent"),
            None,
        ),
        (
            Method::POST,
            format!("/api/v1/requests/{request_id}/complete"),
            None,
        ),
        (Method::GET, "/api/v1/users".to_string(), None),
        (
            Method::POST,
            "/api/v1/sectors".to_string(),
            Some(json!({ "name": "Finance" })),
        ),
        (
            Method::POST,
            "/api/v1/suppliers".to_string(),
            Some(json!({ "name": "Papelaria Central" })),
        ),
        (Method::GET, "/api/v1/notifications/stats".to_string(), None),
    ];

    for (method, uri, body) in attempts {
        let response = app.as_requester(method.clone(), &uri, body).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{method} {uri}");
    }

    // Nothing moved
    let body = response_json(
        app.as_requester(Method::GET, &format!("/api/v1/requests/{request_id}"), None)
            .await,
    )
    .await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["priority"], "normal");
}

#[tokio::test]
async fn requests_of_other_requesters_are_hidden() {
    let app = TestApp::new().await;
    let paper = app.seed_product("A4 paper").await;
    let created = app.create_request(&[(paper.id, 2)]).await;
    let request_id = id_of(&created["request"]);
    let stranger = app.other_requester("lia@example.com").await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/requests/{request_id}"),
            Some(&stranger.token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/requests/{request_id}"),
            Some(&stranger.token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let listed = response_json(
        app.request(Method::GET, "/api/v1/requests", Some(&stranger.token), None)
            .await,
    )
    .await;
    assert!(listed.as_array().unwrap().is_empty());

    // Admins see everything
    let response = app
        .as_admin(Method::GET, &format!("/api/v1/requests/{request_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn notification_stream_accepts_a_query_token() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/notifications?token={}", app.requester.token),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"), "{content_type}");

    let response = app
        .request(Method::GET, "/api/v1/notifications?token=garbage", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The query token only works on the stream
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/requests?token={}", app.requester.token),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admins_can_inspect_and_push_notifications() {
    let app = TestApp::new().await;
    let mut subscription = app.state.notifications.subscribe(
        app.requester.user.id,
        app.requester.user.name.clone(),
        false,
    );

    let response = app
        .as_admin(Method::GET, "/api/v1/notifications/stats", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = response_json(response).await;
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["requesters"], 1);

    let response = app
        .as_admin(
            Method::POST,
            "/api/v1/notifications/send",
            Some(json!({
                "user_ids": [app.requester.user.id],
                "type": "info",
                "title": "Inventory",
                "message": "Stock count on Friday"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let delivered = tokio::time::timeout(std::time::Duration::from_secs(1), subscription.recv())
        .await
        .expect("notification delivered in time");
    assert_eq!(delivered.as_deref(), Some("info:Inventory:Stock count on Friday"));
}

#[tokio::test]
async fn review_notifies_the_requester() {
    let app = TestApp::new().await;
    let paper = app.seed_product("A4 paper").await;
    let created = app.create_request(&[(paper.id, 2)]).await;
    let request_id = id_of(&created["request"]);
    let item_id = id_of(&created["items"][0]);

    let mut subscription = app.state.notifications.subscribe(
        app.requester.user.id,
        app.requester.user.name.clone(),
        false,
    );
    app.review_item(&request_id, &item_id, "approved").await;

    let message = tokio::time::timeout(std::time::Duration::from_secs(2), subscription.recv())
        .await
        .expect("notification delivered in time")
        .expect("hub still open");
    assert!(!message.is_empty());
}
