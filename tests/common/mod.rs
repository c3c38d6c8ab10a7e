use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use storebot_api::{
    config::AppConfig,
    db,
    entities::{item, project},
    events::{self, EventSender},
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

/// Helper harness for spinning up an application state backed by an
/// in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        // One connection keeps the whole test on a single in-memory database.
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), Arc::new(cfg), event_sender);

        let router = Router::new()
            .route(
                "/health",
                get(|| async { Json(json!({ "status": "ok" })) }),
            )
            .nest("/api/v1", storebot_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Seed a tenant project. `delivery_fee` of `None` falls back to the
    /// configured default.
    pub async fn seed_project(&self, name: &str, delivery_fee: Option<Decimal>) -> project::Model {
        let now = Utc::now();
        project::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            telegram_bot_username: Set(Some(format!("{}_bot", name.to_lowercase()))),
            currency: Set("UZS".to_string()),
            delivery_fee: Set(delivery_fee),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed project for tests")
    }

    /// Seed a catalog item with the given price and stock.
    pub async fn seed_item(
        &self,
        project_id: Uuid,
        name: &str,
        price: Decimal,
        stock_quantity: i32,
        is_active: bool,
    ) -> item::Model {
        let now = Utc::now();
        item::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(project_id),
            category_id: Set(None),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            image_url: Set(None),
            stock_quantity: Set(stock_quantity),
            is_active: Set(is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed item for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Read a response body as JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to read response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("response body was not valid JSON")
}

/// Standard checkout payload used across tests.
pub fn checkout_body(cart: Vec<Value>) -> Value {
    json!({
        "cart": cart,
        "customer": {
            "first_name": "Aziz",
            "phone": "+998901112233",
            "address": "12 Amir Temur Avenue",
            "city": "Tashkent"
        },
        "payment_method": "cash"
    })
}

pub fn cart_line(item: &item::Model, quantity: i32) -> Value {
    json!({
        "item_id": item.id,
        "quantity": quantity,
        "unit_price": item.price,
        "display_name": item.name,
    })
}
