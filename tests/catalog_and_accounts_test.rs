//! Catalog, budgets and account management over HTTP.

mod common;

use axum::http::{Method, StatusCode};
use common::{id_of, response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn sector_names_are_unique() {
    let app = TestApp::new().await;

    let response = app
        .as_admin(Method::POST, "/api/v1/sectors", Some(json!({ "name": "Finance" })))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .as_admin(Method::POST, "/api/v1/sectors", Some(json!({ "name": "Finance" })))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn supplier_cnpj_is_checked_and_normalized() {
    let app = TestApp::new().await;

    let response = app
        .as_admin(
            Method::POST,
            "/api/v1/suppliers",
            Some(json!({ "name": "Papelaria Central", "cnpj": "11222333000181" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let supplier = response_json(response).await;
    assert_eq!(supplier["cnpj"], "11.222.333/0001-81");

    // Same digits, different punctuation
    let response = app
        .as_admin(
            Method::POST,
            "/api/v1/suppliers",
            Some(json!({ "name": "Outra Papelaria", "cnpj": "11.222.333/0001-81" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .as_admin(
            Method::POST,
            "/api/v1/suppliers",
            Some(json!({ "name": "Bad Digits", "cnpj": "11222333000182" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .as_requester(
            Method::GET,
            &format!("/api/v1/suppliers/{}", id_of(&supplier)),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn requesters_only_see_products_of_their_sector() {
    let app = TestApp::new().await;
    let paper = app.seed_product("A4 paper").await;
    let stranger = app.other_requester("lia@example.com").await;

    let listed = response_json(app.as_requester(Method::GET, "/api/v1/products", None).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let listed = response_json(
        app.request(Method::GET, "/api/v1/products", Some(&stranger.token), None)
            .await,
    )
    .await;
    assert!(listed.as_array().unwrap().is_empty());

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}", paper.id),
            Some(&stranger.token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn referenced_products_cannot_be_deleted() {
    let app = TestApp::new().await;
    let paper = app.seed_product("A4 paper").await;
    let toner = app.seed_product("Toner").await;
    app.create_request(&[(paper.id, 2)]).await;

    let response = app
        .as_admin(Method::DELETE, &format!("/api/v1/products/{}", paper.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .as_admin(Method::DELETE, &format!("/api/v1/products/{}", toner.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn budgets_attach_to_items_and_are_soft_deleted() {
    let app = TestApp::new().await;
    let paper = app.seed_product("A4 paper").await;
    let created = app.create_request(&[(paper.id, 10)]).await;
    let request_id = id_of(&created["request"]);
    let item_id = id_of(&created["items"][0]);

    let supplier = response_json(
        app.as_admin(
            Method::POST,
            "/api/v1/suppliers",
            Some(json!({ "name": "Papelaria Central" })),
        )
        .await,
    )
    .await;
    let budgets_uri = format!("/api/v1/requests/{request_id}/items/{item_id}/budgets");

    let response = app
        .as_admin(
            Method::POST,
            &budgets_uri,
            Some(json!({ "supplier_id": id_of(&supplier), "unit_price": "0" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .as_admin(
            Method::POST,
            &budgets_uri,
            Some(json!({ "supplier_id": id_of(&supplier), "unit_price": "12.50" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let budget = response_json(response).await;

    let response = app
        .as_requester(
            Method::POST,
            &budgets_uri,
            Some(json!({ "supplier_id": id_of(&supplier), "unit_price": "9.90" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let list_uri = format!("/api/v1/requests/{request_id}/budgets");
    let listed = response_json(app.as_requester(Method::GET, &list_uri, None).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let response = app
        .as_admin(
            Method::DELETE,
            &format!("/api/v1/budgets/{}", id_of(&budget)),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let listed = response_json(app.as_requester(Method::GET, &list_uri, None).await).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admins_manage_accounts_with_guards() {
    let app = TestApp::new().await;

    let response = app
        .as_admin(
            Method::POST,
            "/api/v1/users",
            Some(json!({
                "name": "Duda",
                "email": "rui@example.com",
                "password": "another-pass",
                "role": "requester",
                "sector_id": app.sector.id
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Admins cannot delete themselves, so the last admin stays
    let response = app
        .as_admin(
            Method::DELETE,
            &format!("/api/v1/users/{}", app.admin.user.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let paper = app.seed_product("A4 paper").await;
    app.create_request(&[(paper.id, 1)]).await;
    let requester_uri = format!("/api/v1/users/{}", app.requester.user.id);
    let response = app.as_admin(Method::DELETE, &requester_uri, None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .as_admin(Method::POST, &format!("{requester_uri}/promote"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let promoted = response_json(response).await;
    assert_eq!(promoted["role"], "admin");

    let response = app
        .as_admin(Method::POST, &format!("{requester_uri}/promote"), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn profile_password_change_rules() {
    let app = TestApp::new().await;

    let attempts = [
        json!({
            "current_password": "s3cure-Passw0rd",
            "new_password": "qwerty",
            "confirm_password": "qwerty"
        }),
        json!({
            "current_password": "s3cure-Passw0rd",
            "new_password": "brand-new-pass",
            "confirm_password": "brand-new-typo"
        }),
        json!({
            "current_password": "not-my-password",
            "new_password": "brand-new-pass",
            "confirm_password": "brand-new-pass"
        }),
    ];
    for body in attempts {
        let response = app
            .as_requester(Method::POST, "/api/v1/profile/password", Some(body))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .as_requester(
            Method::POST,
            "/api/v1/profile/password",
            Some(json!({
                "current_password": "s3cure-Passw0rd",
                "new_password": "brand-new-pass",
                "confirm_password": "brand-new-pass"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "rui@example.com", "password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .as_requester(
            Method::PATCH,
            "/api/v1/profile",
            Some(json!({ "name": "Rui Renamed" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["name"], "Rui Renamed");
}
