mod common;

use axum::http::{Method, StatusCode};
use common::{cart_line, checkout_body, response_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set, Unchanged,
};
use serde_json::json;
use storebot_api::entities::{
    customer, item, order_item, stock_movement, Customer, Item, Order, OrderItem, StockMovement,
};
use storebot_api::services::checkout::decrement_stock;
use uuid::Uuid;

#[tokio::test]
async fn checkout_creates_order_with_items_totals_and_stock_movements() {
    let app = TestApp::new().await;
    let project = app.seed_project("Plov House", None).await;
    let plov = app
        .seed_item(project.id, "Plov", dec!(1000), 10, true)
        .await;
    let non = app.seed_item(project.id, "Non", dec!(500), 4, true).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/projects/{}/checkout", project.id),
            Some(checkout_body(vec![cart_line(&plov, 2), cart_line(&non, 1)])),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["success"], json!(true));

    let order_id: Uuid = serde_json::from_value(body["order_id"].clone()).unwrap();
    let order = Order::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("order persisted");
    assert_eq!(order.subtotal, dec!(2500));
    assert_eq!(order.shipping_cost, dec!(4000));
    assert_eq!(order.tax_amount, dec!(0));
    assert_eq!(order.discount_amount, dec!(0));
    assert_eq!(order.total_amount, dec!(6500));
    assert_eq!(order.shipping_address["address"], "12 Amir Temur Avenue");

    let lines = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(lines.len(), 2);
    let plov_line = lines.iter().find(|l| l.item_id == plov.id).unwrap();
    assert_eq!(plov_line.quantity, 2);
    assert_eq!(plov_line.total_price, dec!(2000));
    assert_eq!(plov_line.item_snapshot["name"], "Plov");

    let refreshed_plov = Item::find_by_id(plov.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed_plov.stock_quantity, 8);
    let refreshed_non = Item::find_by_id(non.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed_non.stock_quantity, 3);

    let movements = StockMovement::find()
        .filter(stock_movement::Column::ItemId.eq(plov.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, stock_movement::MovementType::Out);
    assert_eq!(movements[0].reason, stock_movement::REASON_SALE);
    assert_eq!(movements[0].quantity, 2);
    assert_eq!(movements[0].reference_id, Some(order_id));
}

#[tokio::test]
async fn checkout_uses_project_delivery_fee_override() {
    let app = TestApp::new().await;
    let project = app.seed_project("Fee Override", Some(dec!(5000))).await;
    let item = app
        .seed_item(project.id, "Lagman", dec!(2000), 5, true)
        .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/projects/{}/checkout", project.id),
            Some(checkout_body(vec![cart_line(&item, 1)])),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let order_id: Uuid = serde_json::from_value(body["order_id"].clone()).unwrap();
    let order = Order::find_by_id(order_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.shipping_cost, dec!(5000));
    assert_eq!(order.total_amount, dec!(7000));
}

#[tokio::test]
async fn checkout_rejects_partial_availability_and_writes_nothing() {
    let app = TestApp::new().await;
    let project = app.seed_project("Short Stock", None).await;
    let item = app.seed_item(project.id, "Samsa", dec!(800), 2, true).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/projects/{}/checkout", project.id),
            Some(checkout_body(vec![cart_line(&item, 5)])),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(
        body["error"],
        json!("Insufficient stock: Samsa: only 2 available (requested 5)")
    );
    assert_eq!(body["stock_errors"][0]["name"], "Samsa");
    assert_eq!(body["stock_errors"][0]["available_quantity"], 2);

    // Nothing was written and stock is untouched.
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(OrderItem::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(StockMovement::find().count(&*app.state.db).await.unwrap(), 0);
    let refreshed = Item::find_by_id(item.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.stock_quantity, 2);
}

#[tokio::test]
async fn checkout_rejects_inactive_item() {
    let app = TestApp::new().await;
    let project = app.seed_project("Inactive", None).await;
    let item = app
        .seed_item(project.id, "Manti", dec!(1200), 10, false)
        .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/projects/{}/checkout", project.id),
            Some(checkout_body(vec![cart_line(&item, 1)])),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    assert_eq!(
        body["error"],
        json!("Insufficient stock: Manti is no longer available")
    );
}

#[tokio::test]
async fn checkout_rejects_unknown_item_as_unavailable() {
    let app = TestApp::new().await;
    let project = app.seed_project("Ghost Item", None).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/projects/{}/checkout", project.id),
            Some(checkout_body(vec![json!({
                "item_id": Uuid::new_v4(),
                "quantity": 1,
                "unit_price": "1000",
                "display_name": "Vanished",
            })])),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    assert_eq!(
        body["error"],
        json!("Insufficient stock: Vanished is no longer available")
    );
}

#[tokio::test]
async fn checkout_rejects_empty_cart() {
    let app = TestApp::new().await;
    let project = app.seed_project("Empty Cart", None).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/projects/{}/checkout", project.id),
            Some(checkout_body(vec![])),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn checkout_returns_not_found_for_unknown_project() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/projects/{}/checkout", Uuid::new_v4()),
            Some(checkout_body(vec![json!({
                "item_id": Uuid::new_v4(),
                "quantity": 1,
                "unit_price": "1000",
                "display_name": "Anything",
            })])),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn decrement_clamps_stock_at_zero_when_stock_moved_underneath() {
    let app = TestApp::new().await;
    let project = app.seed_project("Race", None).await;
    let item = app.seed_item(project.id, "Chuchvara", dec!(900), 3, true).await;

    let remaining = decrement_stock(&*app.state.db, item.id, 5).await.unwrap();
    assert_eq!(remaining, 0);

    let refreshed = Item::find_by_id(item.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.stock_quantity, 0);
}

#[tokio::test]
async fn first_orders_of_different_tenants_share_the_same_day_number() {
    let app = TestApp::new().await;
    let project_a = app.seed_project("Tenant One", None).await;
    let project_b = app.seed_project("Tenant Two", None).await;
    let item_a = app.seed_item(project_a.id, "Plov", dec!(1500), 10, true).await;
    let item_b = app.seed_item(project_b.id, "Lagman", dec!(2000), 10, true).await;

    let mut numbers = Vec::new();
    for (project, item) in [(&project_a, &item_a), (&project_b, &item_b)] {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/projects/{}/checkout", project.id),
                Some(checkout_body(vec![cart_line(item, 1)])),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = response_json(response).await;
        numbers.push(body["order_number"].as_str().unwrap().to_string());
    }

    // The business key is scoped per tenant, so both tenants' first orders
    // of the day carry sequence 0001.
    let today = chrono::Utc::now().format("%Y%m%d").to_string();
    assert_eq!(numbers[0], format!("ORD-{}-0001", today));
    assert_eq!(numbers[1], numbers[0]);
}

#[tokio::test]
async fn mid_pipeline_failure_rolls_the_whole_checkout_back() {
    use chrono::Utc;
    use storebot_api::entities::order;

    let app = TestApp::new().await;
    let project = app.seed_project("Collision", None).await;
    let item = app.seed_item(project.id, "Halva", dec!(600), 10, true).await;

    // Pre-seed one order today already holding the next sequence number:
    // the generator counts 1 existing order, derives sequence 0002, and
    // trips the per-project unique index inside the checkout transaction.
    let seeded_customer = storebot_api::entities::customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project.id),
        telegram_id: Set(None),
        telegram_username: Set(None),
        first_name: Set("Seed".to_string()),
        last_name: Set(None),
        phone: Set(None),
        created_via: Set(storebot_api::entities::customer::CreatedVia::Direct),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(&*app.state.db)
    .await
    .unwrap();
    let today = Utc::now().format("%Y%m%d").to_string();
    order::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project.id),
        customer_id: Set(seeded_customer.id),
        order_number: Set(format!("ORD-{}-0002", today)),
        status: Set(order::OrderStatus::Pending),
        payment_method: Set(order::PaymentMethod::Cash),
        payment_status: Set(order::PaymentStatus::Pending),
        subtotal: Set(dec!(0)),
        shipping_cost: Set(dec!(0)),
        tax_amount: Set(dec!(0)),
        discount_amount: Set(dec!(0)),
        total_amount: Set(dec!(0)),
        shipping_address: Set(json!({})),
        confirmed_at: Set(None),
        paid_at: Set(None),
        delivered_at: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(&*app.state.db)
    .await
    .unwrap();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/projects/{}/checkout", project.id),
            Some(checkout_body(vec![cart_line(&item, 2)])),
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["error"], json!("Failed to create order"));

    // Everything inside the transaction rolled back: only the pre-seeded
    // customer and order remain.
    assert_eq!(
        Customer::find()
            .filter(customer::Column::ProjectId.eq(project.id))
            .count(&*app.state.db)
            .await
            .unwrap(),
        1
    );
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 1);
    assert_eq!(OrderItem::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(StockMovement::find().count(&*app.state.db).await.unwrap(), 0);
    let refreshed = Item::find_by_id(item.id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.stock_quantity, 10);
}

#[tokio::test]
async fn repeat_telegram_checkout_reuses_and_overwrites_customer() {
    let app = TestApp::new().await;
    let project = app.seed_project("Repeat Customer", None).await;
    let item = app
        .seed_item(project.id, "Shashlik", dec!(2500), 20, true)
        .await;

    let mut first = checkout_body(vec![cart_line(&item, 1)]);
    first["telegram"] = json!({ "telegram_id": 777, "username": "aziz_uz" });
    let first_response = app
        .request(
            Method::POST,
            &format!("/api/v1/projects/{}/checkout", project.id),
            Some(first),
        )
        .await;
    assert_eq!(first_response.status(), StatusCode::CREATED);

    let mut second = checkout_body(vec![cart_line(&item, 1)]);
    second["telegram"] = json!({ "telegram_id": 777, "username": "aziz_uz" });
    second["customer"]["first_name"] = json!("Azizbek");
    second["customer"]["phone"] = json!("+998907778899");
    let second_response = app
        .request(
            Method::POST,
            &format!("/api/v1/projects/{}/checkout", project.id),
            Some(second),
        )
        .await;
    assert_eq!(second_response.status(), StatusCode::CREATED);

    let customers = Customer::find()
        .filter(customer::Column::ProjectId.eq(project.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].first_name, "Azizbek");
    assert_eq!(customers[0].phone.as_deref(), Some("+998907778899"));
    assert_eq!(customers[0].created_via, customer::CreatedVia::Telegram);
}

#[tokio::test]
async fn fallback_checkouts_without_identity_create_distinct_customers() {
    let app = TestApp::new().await;
    let project = app.seed_project("Walk In", None).await;
    let item = app.seed_item(project.id, "Tea", dec!(500), 20, true).await;

    for _ in 0..2 {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/projects/{}/checkout", project.id),
                Some(checkout_body(vec![cart_line(&item, 1)])),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let customers = Customer::find()
        .filter(customer::Column::ProjectId.eq(project.id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(customers.len(), 2);
    assert!(customers
        .iter()
        .all(|c| c.created_via == customer::CreatedVia::Direct));
}

#[tokio::test]
async fn order_numbers_are_date_stamped_and_sequential_per_project() {
    let app = TestApp::new().await;
    let project = app.seed_project("Numbers", None).await;
    let item = app.seed_item(project.id, "Bread", dec!(300), 50, true).await;

    let mut numbers = Vec::new();
    for _ in 0..2 {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/projects/{}/checkout", project.id),
                Some(checkout_body(vec![cart_line(&item, 1)])),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = response_json(response).await;
        numbers.push(body["order_number"].as_str().unwrap().to_string());
    }

    let today = chrono::Utc::now().format("%Y%m%d").to_string();
    assert_eq!(numbers[0], format!("ORD-{}-0001", today));
    assert_eq!(numbers[1], format!("ORD-{}-0002", today));
}

#[tokio::test]
async fn order_item_snapshot_survives_catalog_edits() {
    let app = TestApp::new().await;
    let project = app.seed_project("Snapshots", None).await;
    let item = app
        .seed_item(project.id, "Honey Cake", dec!(3500), 5, true)
        .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/projects/{}/checkout", project.id),
            Some(checkout_body(vec![cart_line(&item, 1)])),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let order_id: Uuid = serde_json::from_value(body["order_id"].clone()).unwrap();

    // Rename and reprice the catalog item after the sale.
    item::ActiveModel {
        id: Unchanged(item.id),
        name: Set("Medovik".to_string()),
        price: Set(dec!(9999)),
        ..Default::default()
    }
    .update(&*app.state.db)
    .await
    .unwrap();

    let lines = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(lines[0].item_snapshot["name"], "Honey Cake");
    assert_eq!(lines[0].unit_price, dec!(3500));
}

#[tokio::test]
async fn committed_checkout_evicts_cached_listings() {
    use storebot_api::cache::CacheTag;

    let app = TestApp::new().await;
    let project = app.seed_project("Cache", None).await;
    let item = app.seed_item(project.id, "Kefir", dec!(700), 5, true).await;

    app.state
        .cache
        .set("items:stale", "[]", CacheTag::Items)
        .await
        .unwrap();
    app.state
        .cache
        .set("orders:stale", "[]", CacheTag::Orders)
        .await
        .unwrap();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/projects/{}/checkout", project.id),
            Some(checkout_body(vec![cart_line(&item, 1)])),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    assert!(!app.state.cache.contains("items:stale").await);
    assert!(!app.state.cache.contains("orders:stale").await);
}
