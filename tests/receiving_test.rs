//! Receiving against approved items: receipt guards, progress and totals.

mod common;

use axum::http::{Method, StatusCode};
use common::{id_of, response_json, TestApp};
use serde_json::{json, Value};

struct Approved {
    request_id: String,
    approved_item: String,
    rejected_item: String,
}

/// A request with one approved item (12 units) and one rejected item.
async fn approved_request(app: &TestApp) -> Approved {
    let gloves = app.seed_product("Nitrile gloves").await;
    let masks = app.seed_product("Masks").await;
    let created = app.create_request(&[(gloves.id, 12), (masks.id, 5)]).await;
    let request_id = id_of(&created["request"]);
    let approved_item = id_of(&created["items"][0]);
    let rejected_item = id_of(&created["items"][1]);

    app.review_item(&request_id, &approved_item, "approved").await;
    app.review_item(&request_id, &rejected_item, "rejected").await;

    Approved {
        request_id,
        approved_item,
        rejected_item,
    }
}

fn receipts_uri(request_id: &str, item_id: &str) -> String {
    format!("/api/v1/requests/{request_id}/items/{item_id}/receipts")
}

async fn receive(app: &TestApp, request_id: &str, item_id: &str, body: Value) -> axum::response::Response {
    app.as_admin(Method::POST, &receipts_uri(request_id, item_id), Some(body))
        .await
}

#[tokio::test]
async fn partial_then_complete_delivery() {
    let app = TestApp::new().await;
    let fixture = approved_request(&app).await;

    let response = receive(
        &app,
        &fixture.request_id,
        &fixture.approved_item,
        json!({ "quantity_received": 5, "invoice_number": "NF-1001" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let receipt = response_json(response).await;
    assert_eq!(receipt["quantity_received"], 5);
    assert_eq!(receipt["rejected_quantity"], 0);
    assert_eq!(receipt["receipt_condition"], "good");
    assert_eq!(receipt["purchase_request_id"], fixture.request_id.as_str());
    assert_eq!(receipt["received_by"], app.admin.user.id.to_string());

    let status_uri = format!("/api/v1/requests/{}/receipts/status", fixture.request_id);
    let body = response_json(app.as_requester(Method::GET, &status_uri, None).await).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1, "only approved items are tracked");
    assert_eq!(items[0]["item_id"], fixture.approved_item.as_str());
    assert_eq!(items[0]["product_name"], "Nitrile gloves");
    assert_eq!(items[0]["quantity_received"], 5);
    assert_eq!(items[0]["quantity_pending"], 7);
    assert_eq!(items[0]["status"], "partial");
    assert_eq!(body["summary"]["partial"], 1);

    // Two damaged units are sent back, so nine count toward the order
    let response = receive(
        &app,
        &fixture.request_id,
        &fixture.approved_item,
        json!({
            "quantity_received": 9,
            "rejected_quantity": 2,
            "invoice_number": "NF-1002",
            "receipt_condition": "partial_damage",
            "quality_checked": true,
            "quality_notes": "two boxes crushed"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(app.as_admin(Method::GET, &status_uri, None).await).await;
    assert_eq!(body["items"][0]["quantity_received"], 12);
    assert_eq!(body["items"][0]["quantity_pending"], 0);
    assert_eq!(body["items"][0]["status"], "complete");
    assert_eq!(body["summary"]["complete"], 1);
    assert_eq!(body["summary"]["total_items"], 1);

    let summary_uri = format!("/api/v1/requests/{}/receipts/summary", fixture.request_id);
    let body = response_json(app.as_admin(Method::GET, &summary_uri, None).await).await;
    assert_eq!(body["total_receipts"], 2);
    assert_eq!(body["total_quantity"], 14);
    assert_eq!(body["total_rejected"], 2);
    assert_eq!(body["unique_suppliers"], 0);

    let listed = response_json(
        app.as_requester(
            Method::GET,
            &receipts_uri(&fixture.request_id, &fixture.approved_item),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn receiving_more_than_ordered_is_refused() {
    let app = TestApp::new().await;
    let fixture = approved_request(&app).await;

    receive(
        &app,
        &fixture.request_id,
        &fixture.approved_item,
        json!({ "quantity_received": 10, "invoice_number": "NF-2001" }),
    )
    .await;

    let response = receive(
        &app,
        &fixture.request_id,
        &fixture.approved_item,
        json!({ "quantity_received": 3, "invoice_number": "NF-2002" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("Ordered: 12"), "{message}");
    assert!(message.contains("Already received: 10"), "{message}");
    assert!(message.contains("Trying to receive: 3"), "{message}");

    // Rejections free up room
    let response = receive(
        &app,
        &fixture.request_id,
        &fixture.approved_item,
        json!({ "quantity_received": 3, "rejected_quantity": 1, "invoice_number": "NF-2003" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn rejected_items_cannot_be_received() {
    let app = TestApp::new().await;
    let fixture = approved_request(&app).await;

    let response = receive(
        &app,
        &fixture.request_id,
        &fixture.rejected_item,
        json!({ "quantity_received": 1, "invoice_number": "NF-3001" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn pending_request_cannot_be_received() {
    let app = TestApp::new().await;
    let paper = app.seed_product("A4 paper").await;
    let created = app.create_request(&[(paper.id, 4)]).await;
    let request_id = id_of(&created["request"]);
    let item_id = id_of(&created["items"][0]);

    let response = receive(
        &app,
        &request_id,
        &item_id,
        json!({ "quantity_received": 1, "invoice_number": "NF-4001" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn completed_request_still_accepts_deliveries() {
    let app = TestApp::new().await;
    let fixture = approved_request(&app).await;

    let response = app
        .as_admin(
            Method::POST,
            &format!("/api/v1/requests/{}/complete", fixture.request_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = receive(
        &app,
        &fixture.request_id,
        &fixture.approved_item,
        json!({ "quantity_received": 12, "invoice_number": "NF-5001" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn receipt_input_is_validated() {
    let app = TestApp::new().await;
    let fixture = approved_request(&app).await;

    for body in [
        json!({ "quantity_received": 0, "invoice_number": "NF-6001" }),
        json!({ "quantity_received": 2, "invoice_number": "" }),
        json!({ "quantity_received": 2, "rejected_quantity": 3, "invoice_number": "NF-6002" }),
    ] {
        let response = receive(&app, &fixture.request_id, &fixture.approved_item, body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn requesters_cannot_record_receipts() {
    let app = TestApp::new().await;
    let fixture = approved_request(&app).await;

    let response = app
        .as_requester(
            Method::POST,
            &receipts_uri(&fixture.request_id, &fixture.approved_item),
            Some(json!({ "quantity_received": 1, "invoice_number": "NF-7001" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn item_must_belong_to_the_request_in_the_path() {
    let app = TestApp::new().await;
    let fixture = approved_request(&app).await;
    let other = approved_request(&app).await;

    let response = receive(
        &app,
        &other.request_id,
        &fixture.approved_item,
        json!({ "quantity_received": 1, "invoice_number": "NF-8001" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn simultaneous_receipts_never_exceed_the_order() {
    let app = TestApp::new().await;
    let fixture = approved_request(&app).await;
    let uri = receipts_uri(&fixture.request_id, &fixture.approved_item);

    // Four deliveries of 8 against an order of 12: only one fits
    let attempts = (0..4).map(|n| {
        app.as_admin(
            Method::POST,
            &uri,
            Some(json!({ "quantity_received": 8, "invoice_number": format!("NF-90{n}") })),
        )
    });
    let responses = futures::future::join_all(attempts).await;

    let created = responses
        .iter()
        .filter(|r| r.status() == StatusCode::CREATED)
        .count();
    assert_eq!(created, 1);
    assert!(responses
        .iter()
        .filter(|r| r.status() != StatusCode::CREATED)
        .all(|r| r.status() == StatusCode::BAD_REQUEST || r.status() == StatusCode::CONFLICT));

    let status_uri = format!("/api/v1/requests/{}/receipts/status", fixture.request_id);
    let body = response_json(app.as_admin(Method::GET, &status_uri, None).await).await;
    assert_eq!(body["items"][0]["quantity_received"], 8);
    assert_eq!(body["items"][0]["quantity_pending"], 4);
}
