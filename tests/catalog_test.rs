//! Floor plan and menu management.

mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn test_manager_creates_and_updates_tables() {
    let app = TestApp::new().await;

    let created = app
        .as_manager(
            Method::POST,
            "/api/v1/tables",
            Some(json!({ "name": "Patio 1", "capacity": 2 })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = response_json(created).await;
    let table_id = created["data"]["id"].as_i64().unwrap();
    assert_eq!(created["data"]["occupied"], false);
    assert!(created["data"]["currentOrderId"].is_null());

    let updated = app
        .as_manager(
            Method::PUT,
            &format!("/api/v1/tables/{}", table_id),
            Some(json!({ "capacity": 6 })),
        )
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let updated = response_json(updated).await;
    assert_eq!(updated["data"]["capacity"], 6);
    assert_eq!(updated["data"]["name"], "Patio 1");

    let duplicate = app
        .as_manager(
            Method::POST,
            "/api/v1/tables",
            Some(json!({ "name": "Patio 1", "capacity": 4 })),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_staff_reads_but_cannot_edit_tables() {
    let app = TestApp::new().await;
    app.seed_table("T1").await;

    let listed = app.as_staff(Method::GET, "/api/v1/tables", None).await;
    assert_eq!(listed.status(), StatusCode::OK);
    assert_eq!(response_json(listed).await["data"].as_array().unwrap().len(), 1);

    let create = app
        .as_staff(
            Method::POST,
            "/api/v1/tables",
            Some(json!({ "name": "T2", "capacity": 4 })),
        )
        .await;
    assert_eq!(create.status(), StatusCode::FORBIDDEN);

    let create = app
        .as_cashier(
            Method::POST,
            "/api/v1/tables",
            Some(json!({ "name": "T2", "capacity": 4 })),
        )
        .await;
    assert_eq!(create.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_table_with_order_history_cannot_be_deleted() {
    let app = TestApp::new().await;
    let used = app.seed_table("T1").await;
    let unused = app.seed_table("T2").await;
    let order = app
        .state
        .services
        .orders
        .create_order(used.id, app.staff.id)
        .await
        .unwrap();

    let busy = app
        .as_staff(Method::GET, &format!("/api/v1/tables/{}", used.id), None)
        .await;
    let busy = response_json(busy).await;
    assert_eq!(busy["data"]["occupied"], true);
    assert_eq!(busy["data"]["currentOrderId"], order.id);

    let refused = app
        .as_manager(Method::DELETE, &format!("/api/v1/tables/{}", used.id), None)
        .await;
    assert_eq!(refused.status(), StatusCode::CONFLICT);

    let deleted = app
        .as_manager(Method::DELETE, &format!("/api/v1/tables/{}", unused.id), None)
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = app
        .as_staff(Method::GET, &format!("/api/v1/tables/{}", unused.id), None)
        .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_crud_and_soft_delete() {
    let app = TestApp::new().await;
    let category = app.seed_category("Coffee").await;

    let created = app
        .as_manager(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Flat White", "price": "3.40", "categoryId": category.id })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = response_json(created).await;
    let product_id = created["data"]["id"].as_i64().unwrap();
    assert_eq!(created["data"]["categoryName"], "Coffee");
    assert_eq!(decimal(&created["data"]["price"]), dec!(3.40));

    let updated = app
        .as_manager(
            Method::PUT,
            &format!("/api/v1/products/{}", product_id),
            Some(json!({ "price": "3.60" })),
        )
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    assert_eq!(decimal(&response_json(updated).await["data"]["price"]), dec!(3.60));

    let deleted = app
        .as_manager(Method::DELETE, &format!("/api/v1/products/{}", product_id), None)
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);

    let visible = app.as_staff(Method::GET, "/api/v1/products", None).await;
    assert!(response_json(visible).await["data"].as_array().unwrap().is_empty());

    let all = app
        .as_staff(Method::GET, "/api/v1/products?includeUnavailable=true", None)
        .await;
    let all = response_json(all).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 1);
    assert_eq!(all["data"][0]["available"], false);
}

#[tokio::test]
async fn test_non_positive_price_is_rejected() {
    let app = TestApp::new().await;
    let category = app.seed_category("Coffee").await;

    let response = app
        .as_manager(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "name": "Free Water", "price": "0", "categoryId": category.id })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(response).await["kind"], "validation_error");
}

#[tokio::test]
async fn test_products_filter_by_category() {
    let app = TestApp::new().await;
    let coffee = app.seed_category("Coffee").await;
    let food = app.seed_category("Food").await;
    app.seed_product(coffee.id, "Latte", dec!(3.50)).await;
    app.seed_product(food.id, "Bagel", dec!(2.90)).await;
    app.seed_product(food.id, "Muffin", dec!(2.40)).await;

    let response = app
        .as_staff(
            Method::GET,
            &format!("/api/v1/products?categoryId={}", food.id),
            None,
        )
        .await;
    let body = response_json(response).await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Bagel", "Muffin"]);
}

#[tokio::test]
async fn test_category_with_available_products_cannot_be_deleted() {
    let app = TestApp::new().await;
    let category = app.seed_category("Tea").await;
    let product = app.seed_product(category.id, "Green Tea", dec!(2.20)).await;

    let refused = app
        .as_manager(
            Method::DELETE,
            &format!("/api/v1/categories/{}", category.id),
            None,
        )
        .await;
    assert_eq!(refused.status(), StatusCode::CONFLICT);

    app.state
        .services
        .catalog
        .delete_product(product.id)
        .await
        .unwrap();

    let deleted = app
        .as_manager(
            Method::DELETE,
            &format!("/api/v1/categories/{}", category.id),
            None,
        )
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);

    // Products cannot come back while their category is gone
    let restore_product = app
        .as_manager(
            Method::POST,
            &format!("/api/v1/products/{}/restore", product.id),
            None,
        )
        .await;
    assert_eq!(restore_product.status(), StatusCode::BAD_REQUEST);

    let restored = app
        .as_manager(
            Method::POST,
            &format!("/api/v1/categories/{}/restore", category.id),
            None,
        )
        .await;
    assert_eq!(restored.status(), StatusCode::OK);
    assert_eq!(response_json(restored).await["data"]["available"], true);

    let restore_product = app
        .as_manager(
            Method::POST,
            &format!("/api/v1/products/{}/restore", product.id),
            None,
        )
        .await;
    assert_eq!(restore_product.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_category_listing_hides_deleted_by_default() {
    let app = TestApp::new().await;
    let kept = app.seed_category("Coffee").await;
    let dropped = app.seed_category("Seasonal").await;
    app.seed_product(kept.id, "Mocha", dec!(3.90)).await;
    app.state
        .services
        .catalog
        .delete_category(dropped.id)
        .await
        .unwrap();

    let listed = app.as_staff(Method::GET, "/api/v1/categories", None).await;
    let listed = response_json(listed).await;
    let listed = listed["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "Coffee");
    assert_eq!(listed[0]["productCount"], 1);

    let all = app
        .as_staff(Method::GET, "/api/v1/categories?includeUnavailable=true", None)
        .await;
    assert_eq!(response_json(all).await["data"].as_array().unwrap().len(), 2);
}
