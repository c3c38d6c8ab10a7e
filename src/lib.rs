//! Order creation and fulfillment service for a multi-tenant Telegram
//! storefront platform. Each project (tenant) sells a catalog of items;
//! shoppers check out through the bot, the Mini App, or a plain web form,
//! and merchants drive the order lifecycle from their dashboard.

pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::{
    cache::ListingCache,
    config::AppConfig,
    events::EventSender,
    handlers::AppServices,
    services::{CheckoutService, OrderService},
};

/// Shared application state threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: EventSender,
    pub services: AppServices,
    pub cache: ListingCache,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: EventSender,
    ) -> Self {
        let cache = ListingCache::new(Some(Duration::from_secs(config.cache_ttl_secs)));
        let services = AppServices {
            checkout: Arc::new(CheckoutService::new(
                db.clone(),
                event_sender.clone(),
                cache.clone(),
                config.delivery_fee,
            )),
            orders: Arc::new(OrderService::new(
                db.clone(),
                event_sender.clone(),
                cache.clone(),
            )),
        };

        Self {
            db,
            config,
            event_sender,
            services,
            cache,
        }
    }
}

/// Pagination query for listing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

/// Versioned API routes.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/:project_id/checkout",
            post(handlers::checkout::create_order),
        )
        .route(
            "/projects/:project_id/orders",
            get(handlers::orders::list_orders),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/status",
            put(handlers::orders::update_order_status),
        )
        .route(
            "/orders/:id/payment-status",
            put(handlers::orders::update_payment_status),
        )
}
