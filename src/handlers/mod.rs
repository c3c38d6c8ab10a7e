//! Axum handlers for the order API surface.

pub mod checkout;
pub mod orders;

use std::sync::Arc;

use crate::services::{CheckoutService, OrderService};

/// Service bundle shared through application state.
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
}
