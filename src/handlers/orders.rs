use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    entities::order::{OrderStatus, PaymentStatus},
    AppState, ListQuery,
};

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

/// GET /api/v1/orders/:id
#[instrument(skip(state))]
pub async fn get_order(State(state): State<AppState>, Path(order_id): Path<Uuid>) -> Response {
    let order = match state.services.orders.get_order(order_id).await {
        Ok(order) => order,
        Err(err) => return err.into_response(),
    };
    let items = match state.services.orders.get_order_items(order_id).await {
        Ok(items) => items,
        Err(err) => return err.into_response(),
    };

    Json(json!({
        "success": true,
        "order": order,
        "items": items,
    }))
    .into_response()
}

/// GET /api/v1/projects/:project_id/orders
#[instrument(skip(state), fields(project_id = %project_id))]
pub async fn list_orders(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Response {
    match state
        .services
        .orders
        .list_orders(project_id, query.page, query.limit)
        .await
    {
        Ok(page) => Json(json!({
            "success": true,
            "orders": page.orders,
            "total": page.total,
            "page": page.page,
            "limit": page.limit,
        }))
        .into_response(),
        Err(err) => err.into_response(),
    }
}

/// PUT /api/v1/orders/:id/status
#[instrument(skip(state, request))]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Response {
    match state
        .services
        .orders
        .update_order_status(order_id, request.status)
        .await
    {
        Ok(order) => Json(json!({
            "success": true,
            "order": order,
        }))
        .into_response(),
        Err(err) => err.into_response(),
    }
}

/// PUT /api/v1/orders/:id/payment-status
#[instrument(skip(state, request))]
pub async fn update_payment_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdatePaymentStatusRequest>,
) -> Response {
    match state
        .services
        .orders
        .update_payment_status(order_id, request.payment_status)
        .await
    {
        Ok(order) => Json(json!({
            "success": true,
            "order": order,
        }))
        .into_response(),
        Err(err) => err.into_response(),
    }
}
