//! End-to-end tests for a table's order: opening, line edits, status
//! changes and the automatic cancel when the last line goes.

mod common;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use cafe_pos_api::{
    entities::{order, OrderStatus},
    errors::ServiceError,
};
use chrono::Utc;
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};

struct Menu {
    espresso: i32,
    croissant: i32,
}

async fn seed_menu(app: &TestApp) -> Menu {
    let coffee = app.seed_category("Coffee").await;
    let espresso = app.seed_product(coffee.id, "Espresso", dec!(2.50)).await;
    let croissant = app.seed_product(coffee.id, "Croissant", dec!(3.00)).await;
    Menu {
        espresso: espresso.id,
        croissant: croissant.id,
    }
}

async fn open_order(app: &TestApp, table_id: i32) -> i32 {
    let response = app
        .as_staff(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "tableId": table_id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    body["data"]["id"].as_i64().expect("order id") as i32
}

async fn add_item(app: &TestApp, order_id: i32, product_id: i32, quantity: i32) -> Value {
    let response = app
        .as_staff(
            Method::POST,
            &format!("/api/v1/orders/{}/items", order_id),
            Some(json!({ "productId": product_id, "quantity": quantity })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await
}

#[tokio::test]
async fn test_create_order_opens_tab_for_current_user() {
    let app = TestApp::new().await;
    let table = app.seed_table("T1").await;

    let response = app
        .as_staff(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "tableId": table.id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["tableId"], table.id);
    assert_eq!(body["data"]["tableName"], "T1");
    assert_eq!(body["data"]["userId"], app.staff.id);
    assert_eq!(body["data"]["status"], "Ordering");
    assert_eq!(decimal(&body["data"]["totalAmount"]), dec!(0));

    let tables = app
        .as_staff(Method::GET, &format!("/api/v1/tables/{}", table.id), None)
        .await;
    let tables = response_json(tables).await;
    assert_eq!(tables["data"]["occupied"], true);
    assert_eq!(tables["data"]["currentOrderId"], body["data"]["id"]);
}

#[tokio::test]
async fn test_second_order_on_occupied_table_conflicts() {
    let app = TestApp::new().await;
    let table = app.seed_table("T1").await;
    open_order(&app, table.id).await;

    let response = app
        .as_staff(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "tableId": table.id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["kind"], "conflict");

    let orders = app
        .as_staff(
            Method::GET,
            &format!("/api/v1/orders?status=Ordering&tableId={}", table.id),
            None,
        )
        .await;
    let orders = response_json(orders).await;
    assert_eq!(orders["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_order_on_unknown_table_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .as_staff(Method::POST, "/api/v1/orders", Some(json!({ "tableId": 999 })))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_table_is_free_again_after_payment() {
    let app = TestApp::new().await;
    let menu = seed_menu(&app).await;
    let table = app.seed_table("T1").await;

    let order_id = open_order(&app, table.id).await;
    add_item(&app, order_id, menu.espresso, 1).await;
    let paid = app
        .as_cashier(
            Method::POST,
            "/api/v1/payments",
            Some(json!({ "orderId": order_id, "paymentType": "Card" })),
        )
        .await;
    assert_eq!(paid.status(), StatusCode::CREATED);

    let second = open_order(&app, table.id).await;
    assert_ne!(second, order_id);
}

#[tokio::test]
async fn test_adding_same_product_merges_quantity() {
    let app = TestApp::new().await;
    let menu = seed_menu(&app).await;
    let table = app.seed_table("T1").await;
    let order_id = open_order(&app, table.id).await;

    let first = add_item(&app, order_id, menu.espresso, 2).await;
    assert_eq!(first["data"]["merged"], false);
    assert_eq!(first["data"]["quantity"], 2);

    let second = add_item(&app, order_id, menu.espresso, 3).await;
    assert_eq!(second["data"]["merged"], true);
    assert_eq!(second["data"]["id"], first["data"]["id"]);
    assert_eq!(second["data"]["quantity"], 5);
    assert_eq!(decimal(&second["data"]["subtotal"]), dec!(12.50));

    let items = app
        .as_staff(
            Method::GET,
            &format!("/api/v1/orders/{}/items", order_id),
            None,
        )
        .await;
    let items = response_json(items).await;
    let items = items["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 5);
}

#[tokio::test]
async fn test_order_detail_reports_live_totals() {
    let app = TestApp::new().await;
    let menu = seed_menu(&app).await;
    let table = app.seed_table("T1").await;
    let order_id = open_order(&app, table.id).await;

    add_item(&app, order_id, menu.espresso, 2).await;
    add_item(&app, order_id, menu.croissant, 1).await;

    let response = app
        .as_staff(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;

    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["summary"]["itemCount"], 2);
    assert_eq!(body["data"]["summary"]["totalQuantity"], 3);
    assert_eq!(decimal(&body["data"]["summary"]["itemsTotal"]), dec!(8.00));
    assert_eq!(decimal(&body["data"]["order"]["totalAmount"]), dec!(8.00));
}

#[tokio::test]
async fn test_unavailable_product_cannot_be_added() {
    let app = TestApp::new().await;
    let menu = seed_menu(&app).await;
    let table = app.seed_table("T1").await;
    let order_id = open_order(&app, table.id).await;

    let deleted = app
        .as_manager(
            Method::DELETE,
            &format!("/api/v1/products/{}", menu.croissant),
            None,
        )
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);

    let response = app
        .as_staff(
            Method::POST,
            &format!("/api/v1/orders/{}/items", order_id),
            Some(json!({ "productId": menu.croissant, "quantity": 1 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let restored = app
        .as_manager(
            Method::POST,
            &format!("/api/v1/products/{}/restore", menu.croissant),
            None,
        )
        .await;
    assert_eq!(restored.status(), StatusCode::OK);
    add_item(&app, order_id, menu.croissant, 1).await;
}

#[tokio::test]
async fn test_zero_quantity_is_rejected() {
    let app = TestApp::new().await;
    let menu = seed_menu(&app).await;
    let table = app.seed_table("T1").await;
    let order_id = open_order(&app, table.id).await;

    let response = app
        .as_staff(
            Method::POST,
            &format!("/api/v1/orders/{}/items", order_id),
            Some(json!({ "productId": menu.espresso, "quantity": 0 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["kind"], "validation_error");
}

#[tokio::test]
async fn test_update_item_replaces_quantity_and_notes() {
    let app = TestApp::new().await;
    let menu = seed_menu(&app).await;
    let table = app.seed_table("T1").await;
    let order_id = open_order(&app, table.id).await;
    let added = add_item(&app, order_id, menu.espresso, 1).await;
    let item_id = added["data"]["id"].as_i64().unwrap();

    let response = app
        .as_staff(
            Method::PUT,
            &format!("/api/v1/orders/{}/items/{}", order_id, item_id),
            Some(json!({ "quantity": 4, "notes": "extra shot" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["quantity"], 4);
    assert_eq!(body["data"]["notes"], "extra shot");
    assert_eq!(decimal(&body["data"]["subtotal"]), dec!(10.00));
}

#[tokio::test]
async fn test_removing_last_item_cancels_order() {
    let app = TestApp::new().await;
    let menu = seed_menu(&app).await;
    let table = app.seed_table("T2").await;
    let order_id = open_order(&app, table.id).await;
    let added = add_item(&app, order_id, menu.croissant, 1).await;
    let item_id = added["data"]["id"].as_i64().unwrap();

    let response = app
        .as_staff(
            Method::DELETE,
            &format!("/api/v1/orders/{}/items/{}", order_id, item_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["orderCancelled"], true);
    assert_eq!(body["data"]["remainingItems"], 0);

    let order = app
        .as_staff(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    let order = response_json(order).await;
    assert_eq!(order["data"]["order"]["status"], "Cancelled");
    assert_eq!(decimal(&order["data"]["order"]["totalAmount"]), dec!(0));

    // The table is free again
    open_order(&app, table.id).await;
}

#[tokio::test]
async fn test_removing_one_of_two_items_keeps_order_open() {
    let app = TestApp::new().await;
    let menu = seed_menu(&app).await;
    let table = app.seed_table("T1").await;
    let order_id = open_order(&app, table.id).await;
    let added = add_item(&app, order_id, menu.espresso, 1).await;
    add_item(&app, order_id, menu.croissant, 1).await;

    let response = app
        .as_staff(
            Method::DELETE,
            &format!(
                "/api/v1/orders/{}/items/{}",
                order_id,
                added["data"]["id"].as_i64().unwrap()
            ),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["orderCancelled"], false);
    assert_eq!(body["data"]["remainingItems"], 1);
}

#[tokio::test]
async fn test_same_status_update_is_a_no_op() {
    let app = TestApp::new().await;
    let table = app.seed_table("T1").await;
    let order_id = open_order(&app, table.id).await;

    let before = response_json(
        app.as_staff(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
            .await,
    )
    .await;

    let response = app
        .as_staff(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "status": "Ordering" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["alreadyInStatus"], true);
    assert_eq!(body["data"]["order"]["status"], "Ordering");
    assert_eq!(
        body["data"]["order"]["updatedAt"],
        before["data"]["order"]["updatedAt"]
    );
}

#[tokio::test]
async fn test_unknown_status_is_a_validation_error() {
    let app = TestApp::new().await;
    let table = app.seed_table("T1").await;
    let order_id = open_order(&app, table.id).await;

    let response = app
        .as_staff(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "status": "Shipped" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["kind"], "validation_error");
}

#[tokio::test]
async fn test_marking_paid_without_payment_is_refused() {
    let app = TestApp::new().await;
    let menu = seed_menu(&app).await;
    let table = app.seed_table("T1").await;
    let order_id = open_order(&app, table.id).await;
    add_item(&app, order_id, menu.espresso, 1).await;

    let response = app
        .as_staff(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "status": "Paid" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["kind"], "missing_payment");
}

#[tokio::test]
async fn test_cancelled_order_is_frozen() {
    let app = TestApp::new().await;
    let menu = seed_menu(&app).await;
    let table = app.seed_table("T1").await;
    let order_id = open_order(&app, table.id).await;
    let added = add_item(&app, order_id, menu.espresso, 2).await;
    let item_id = added["data"]["id"].as_i64().unwrap();

    let cancelled = app
        .as_staff(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "status": "Cancelled" })),
        )
        .await;
    assert_eq!(cancelled.status(), StatusCode::OK);
    let cancelled = response_json(cancelled).await;
    assert_eq!(cancelled["data"]["order"]["status"], "Cancelled");
    assert_eq!(decimal(&cancelled["data"]["order"]["totalAmount"]), dec!(5.00));

    let attempts = [
        (
            Method::POST,
            format!("/api/v1/orders/{}/items", order_id),
            Some(json!({ "productId": menu.croissant, "quantity": 1 })),
        ),
        (
            Method::PUT,
            format!("/api/v1/orders/{}/items/{}", order_id, item_id),
            Some(json!({ "quantity": 3 })),
        ),
        (
            Method::DELETE,
            format!("/api/v1/orders/{}/items/{}", order_id, item_id),
            None,
        ),
        (
            Method::PUT,
            format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "status": "Ordering" })),
        ),
    ];

    for (method, uri, body) in attempts {
        let response = app.as_staff(method.clone(), &uri, body).await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "{} {} should be refused",
            method,
            uri
        );
        let body = response_json(response).await;
        assert_eq!(body["kind"], "invalid_state");
        assert!(body["message"].as_str().unwrap().contains("Cancelled"));
    }

    // Repeating the terminal status is still fine
    let again = app
        .as_staff(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order_id),
            Some(json!({ "status": "Cancelled" })),
        )
        .await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(response_json(again).await["data"]["alreadyInStatus"], true);
}

#[tokio::test]
async fn test_scenario_add_then_remove_cancels() {
    let app = TestApp::new().await;
    let menu = seed_menu(&app).await;
    let table = app.seed_table("T2").await;

    let order_id = open_order(&app, table.id).await;
    let added = add_item(&app, order_id, menu.croissant, 1).await;

    let removed = app
        .as_staff(
            Method::DELETE,
            &format!(
                "/api/v1/orders/{}/items/{}",
                order_id,
                added["data"]["id"].as_i64().unwrap()
            ),
            None,
        )
        .await;
    let removed = response_json(removed).await;
    assert_eq!(removed["data"]["orderCancelled"], true);

    let orders = app
        .as_staff(Method::GET, "/api/v1/orders?status=Cancelled", None)
        .await;
    let orders = response_json(orders).await;
    let orders = orders["data"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], order_id);
}

async fn list_orders(app: &TestApp, query: &str) -> Vec<Value> {
    let response = app
        .as_staff(Method::GET, &format!("/api/v1/orders{}", query), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await["data"]
        .as_array()
        .expect("order list")
        .clone()
}

#[tokio::test]
async fn test_order_list_sorts_by_display_date_and_freezes_paid_totals() {
    let app = TestApp::new().await;
    let menu = seed_menu(&app).await;
    let t1 = app.seed_table("T1").await;
    let t2 = app.seed_table("T2").await;

    let first = open_order(&app, t1.id).await;
    let second = open_order(&app, t2.id).await;
    add_item(&app, first, menu.espresso, 2).await;
    add_item(&app, second, menu.croissant, 1).await;

    // The first tab is settled after the second one was opened
    let paid = app
        .as_cashier(
            Method::POST,
            "/api/v1/payments",
            Some(json!({ "orderId": first, "paymentType": "Cash", "discountPercentage": 10 })),
        )
        .await;
    assert_eq!(paid.status(), StatusCode::CREATED);
    add_item(&app, second, menu.espresso, 1).await;

    let payments = app
        .as_cashier(Method::GET, &format!("/api/v1/payments/order/{}", first), None)
        .await;
    let payments = response_json(payments).await;
    let payment_date = payments["data"][0]["paymentDate"].clone();

    let orders = list_orders(&app, "").await;
    assert_eq!(orders.len(), 2);

    assert_eq!(orders[0]["id"], first);
    assert_eq!(orders[0]["status"], "Paid");
    assert_eq!(orders[0]["displayDate"], payment_date);
    assert_eq!(decimal(&orders[0]["totalAmount"]), dec!(4.50));

    assert_eq!(orders[1]["id"], second);
    assert_eq!(orders[1]["status"], "Ordering");
    assert_eq!(orders[1]["displayDate"], orders[1]["orderDate"]);
    assert_eq!(decimal(&orders[1]["totalAmount"]), dec!(5.50));

    let paid_only = list_orders(&app, "?status=Paid").await;
    assert_eq!(paid_only.len(), 1);
    assert_eq!(paid_only[0]["id"], first);

    let open_only = list_orders(&app, "?status=Ordering").await;
    assert_eq!(open_only.len(), 1);
    assert_eq!(open_only[0]["id"], second);

    let on_t2 = list_orders(&app, &format!("?tableId={}", t2.id)).await;
    assert_eq!(on_t2.len(), 1);
    assert_eq!(on_t2[0]["tableName"], "T2");

    assert!(list_orders(&app, "?status=Cancelled").await.is_empty());
}

#[tokio::test]
async fn test_database_allows_one_open_order_per_table() {
    let app = TestApp::new().await;
    let table = app.seed_table("T1").await;
    open_order(&app, table.id).await;

    let raw_order = |status: OrderStatus| order::ActiveModel {
        table_id: Set(table.id),
        user_id: Set(app.staff.id),
        order_date: Set(Utc::now()),
        status: Set(status),
        total_amount: Set(None),
        updated_at: Set(None),
        ..Default::default()
    };

    let err = raw_order(OrderStatus::Ordering)
        .insert(&*app.state.db)
        .await
        .expect_err("second open order must violate the partial index");
    assert_matches!(
        ServiceError::from_db_conflict(err, "table busy"),
        ServiceError::Conflict(msg) if msg == "table busy"
    );

    // Closed orders are outside the index
    raw_order(OrderStatus::Cancelled)
        .insert(&*app.state.db)
        .await
        .expect("closed orders may share a table");
}

#[tokio::test]
async fn test_malformed_requests_use_the_error_body() {
    let app = TestApp::new().await;

    let bad_id = app.as_staff(Method::GET, "/api/v1/orders/abc", None).await;
    assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(bad_id).await["kind"], "validation_error");

    let bad_filter = app
        .as_staff(Method::GET, "/api/v1/orders?status=Shipped", None)
        .await;
    assert_eq!(bad_filter.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(bad_filter).await["kind"], "validation_error");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/orders")
        .header("authorization", format!("Bearer {}", app.staff.token))
        .header("content-type", "application/json")
        .body(Body::from("{\"tableId\": "))
        .unwrap();
    let bad_json = app.send(request).await;
    assert_eq!(bad_json.status(), StatusCode::BAD_REQUEST);
    let body = response_json(bad_json).await;
    assert_eq!(body["kind"], "validation_error");
    assert!(body["timestamp"].is_string());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/orders")
        .header("authorization", format!("Bearer {}", app.staff.token))
        .body(Body::from("{\"tableId\": 1}"))
        .unwrap();
    let no_content_type = app.send(request).await;
    assert_eq!(no_content_type.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(no_content_type).await["kind"], "validation_error");
}
