use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::Item,
    errors::{ServiceError, StockShortage},
};

/// One requested cart line, as supplied by the storefront. Transient and
/// client-held; never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CartLine {
    pub item_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be a positive integer"))]
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[validate(length(min = 1, message = "Item name is required"))]
    pub display_name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Per-line availability verdict against live inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockVerdict {
    pub item_id: Uuid,
    pub requested_quantity: i32,
    pub available_quantity: i32,
    pub max_allowed_quantity: i32,
    pub is_active: bool,
    pub is_valid: bool,
}

/// Aggregated validation outcome for a whole cart.
#[derive(Debug, Clone)]
pub struct StockValidation {
    pub valid: bool,
    pub verdicts: Vec<StockVerdict>,
    pub errors: Vec<String>,
    pub shortages: Vec<StockShortage>,
}

/// Checks requested quantities against live `stock_quantity` and the item
/// active flag. Advisory only: no row locking or reservation happens here,
/// so the later decrement re-checks under its own guard.
#[instrument(skip(conn, lines), fields(line_count = lines.len()))]
pub async fn validate<C: ConnectionTrait>(
    conn: &C,
    lines: &[CartLine],
) -> Result<StockValidation, ServiceError> {
    let mut verdicts = Vec::with_capacity(lines.len());
    let mut errors = Vec::new();
    let mut shortages = Vec::new();

    for line in lines {
        if line.quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Quantity for {} must be a positive integer",
                line.display_name
            )));
        }

        // A deleted item behaves exactly like an inactive one.
        let item = Item::find_by_id(line.item_id).one(conn).await?;
        let (available, is_active) = match &item {
            Some(item) => (item.stock_quantity, item.is_active),
            None => (0, false),
        };

        let verdict = StockVerdict {
            item_id: line.item_id,
            requested_quantity: line.quantity,
            available_quantity: available,
            max_allowed_quantity: if is_active {
                available.min(line.quantity)
            } else {
                0
            },
            is_active,
            is_valid: is_active && available >= line.quantity,
        };

        if let Some(message) = shortage_message(&line.display_name, &verdict) {
            errors.push(message);
            shortages.push(StockShortage {
                name: line.display_name.clone(),
                available_quantity: verdict.available_quantity,
            });
        }

        verdicts.push(verdict);
    }

    Ok(StockValidation {
        valid: errors.is_empty(),
        verdicts,
        errors,
        shortages,
    })
}

/// Human-readable message for an invalid line; `None` when the line passes.
/// The three failure messages are mutually exclusive: inactive wins over
/// out-of-stock, which wins over partial availability.
pub fn shortage_message(name: &str, verdict: &StockVerdict) -> Option<String> {
    if verdict.is_valid {
        return None;
    }

    if !verdict.is_active {
        Some(format!("{} is no longer available", name))
    } else if verdict.available_quantity == 0 {
        Some(format!("{} is out of stock", name))
    } else {
        Some(format!(
            "{}: only {} available (requested {})",
            name, verdict.available_quantity, verdict.requested_quantity
        ))
    }
}
