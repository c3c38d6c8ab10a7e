use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::{errors::ServiceError, services::checkout::CheckoutInput, AppState};

/// POST /api/v1/projects/:project_id/checkout
///
/// Runs the full checkout pipeline. Stock failures come back as 422 with
/// per-item `stock_errors`; anything unexpected is collapsed to a generic
/// message so shoppers never see infrastructure detail.
#[instrument(skip(state, input), fields(project_id = %project_id))]
pub async fn create_order(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(input): Json<CheckoutInput>,
) -> Response {
    match state.services.checkout.create_order(project_id, input).await {
        Ok(result) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "order_id": result.order_id,
                "order_number": result.order_number,
                "customer_id": result.customer_id,
                "total_amount": result.total_amount,
            })),
        )
            .into_response(),
        Err(
            err @ (ServiceError::DatabaseError(_)
            | ServiceError::InternalError(_)
            | ServiceError::EventError(_)),
        ) => {
            error!(project_id = %project_id, error = %err, "Checkout failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Failed to create order",
                })),
            )
                .into_response()
        }
        Err(err) => err.into_response(),
    }
}
