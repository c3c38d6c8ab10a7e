use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    cache::{CacheTag, ListingCache},
    entities::{
        item, order,
        order::{OrderStatus, PaymentMethod, PaymentStatus},
        order_item,
        stock_movement::{self, MovementType, REASON_SALE},
        Item, Project,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        customers::{self, ContactInfo, TelegramIdentity},
        order_numbers,
        stock_validation::{self, CartLine},
        totals,
    },
};

/// Full checkout payload from the storefront (bot, Mini App, or web form).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutInput {
    #[validate(length(min = 1, message = "Cart must not be empty"))]
    pub cart: Vec<CartLine>,
    #[validate]
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub telegram: Option<TelegramIdentity>,
}

/// Contact and delivery details captured into the order's address snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CustomerInfo {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub total_amount: Decimal,
}

/// Orchestrates the checkout pipeline: advisory stock gate, then one
/// transaction covering customer resolution, order-number generation, the
/// order and line-item inserts, and the stock decrement with its audit
/// trail. Cache invalidation and events fire only after the commit.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    cache: ListingCache,
    default_delivery_fee: Decimal,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        cache: ListingCache,
        default_delivery_fee: Decimal,
    ) -> Self {
        Self {
            db,
            event_sender,
            cache,
            default_delivery_fee,
        }
    }

    #[instrument(skip(self, input), fields(project_id = %project_id, line_count = input.cart.len()))]
    pub async fn create_order(
        &self,
        project_id: Uuid,
        input: CheckoutInput,
    ) -> Result<CheckoutResult, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let project = Project::find_by_id(project_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Project {} not found", project_id)))?;

        if !project.is_active {
            return Err(ServiceError::InvalidOperation(
                "Project is not accepting orders".to_string(),
            ));
        }

        // Advisory gate: nothing is written when any line fails.
        let validation = stock_validation::validate(&*self.db, &input.cart).await?;
        if !validation.valid {
            counter!("storebot_checkout.rejected_stock", 1);
            return Err(ServiceError::InsufficientStock {
                message: validation.errors.join("; "),
                shortages: validation.shortages,
            });
        }

        let delivery_fee = project.delivery_fee.unwrap_or(self.default_delivery_fee);
        let order_totals = totals::calculate(&input.cart, delivery_fee);

        let contact = ContactInfo {
            first_name: input.customer.first_name.clone(),
            last_name: input.customer.last_name.clone(),
            phone: input.customer.phone.clone(),
        };

        let txn = self.db.begin().await?;

        let resolved =
            customers::resolve_for_checkout(&txn, project_id, input.telegram.as_ref(), &contact)
                .await?;
        let order_number = order_numbers::generate(&txn, project_id).await?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_active = order::ActiveModel {
            id: Set(order_id),
            project_id: Set(project_id),
            customer_id: Set(resolved.id),
            order_number: Set(order_number.clone()),
            status: Set(OrderStatus::Pending),
            payment_method: Set(input.payment_method),
            payment_status: Set(PaymentStatus::Pending),
            subtotal: Set(order_totals.subtotal),
            shipping_cost: Set(order_totals.shipping_cost),
            tax_amount: Set(order_totals.tax_amount),
            discount_amount: Set(order_totals.discount_amount),
            total_amount: Set(order_totals.total_amount),
            shipping_address: Set(json!({
                "address": input.customer.address,
                "city": input.customer.city,
                "phone": input.customer.phone,
                "notes": input.customer.notes,
            })),
            confirmed_at: Set(None),
            paid_at: Set(None),
            delivered_at: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        order_active.insert(&txn).await?;

        for line in &input.cart {
            // Snapshot comes from the cart's display data, not a re-fetch;
            // later catalog edits must not rewrite order history.
            let order_item_active = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                item_id: Set(line.item_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                total_price: Set(line.unit_price * Decimal::from(line.quantity)),
                item_snapshot: Set(json!({
                    "name": line.display_name,
                    "price": line.unit_price,
                    "original_price": line.original_price,
                    "image_url": line.image_url,
                })),
                created_at: Set(now),
            };
            order_item_active.insert(&txn).await?;
        }

        let mut depleted_items = Vec::new();
        for line in &input.cart {
            let remaining = decrement_stock(&txn, line.item_id, line.quantity).await?;
            if remaining == 0 {
                depleted_items.push(line.item_id);
            }

            let movement = stock_movement::ActiveModel {
                id: Set(Uuid::new_v4()),
                project_id: Set(project_id),
                item_id: Set(line.item_id),
                movement_type: Set(MovementType::Out),
                reason: Set(REASON_SALE.to_string()),
                quantity: Set(line.quantity),
                reference_id: Set(Some(order_id)),
                notes: Set(Some(format!("Order {}", order_number))),
                created_at: Set(now),
            };
            movement.insert(&txn).await?;
        }

        txn.commit().await?;

        counter!("storebot_checkout.orders_created", 1);

        // Downstream listing caches are stale now.
        self.cache.invalidate(&CacheTag::CHECKOUT).await;

        if let Err(e) = self.event_sender.send(Event::OrderCreated(order_id)).await {
            warn!(order_id = %order_id, error = %e, "Failed to send order created event");
        }
        let customer_event = if resolved.created {
            Event::CustomerCreated(resolved.id)
        } else {
            Event::CustomerUpdated(resolved.id)
        };
        if let Err(e) = self.event_sender.send(customer_event).await {
            warn!(customer_id = %resolved.id, error = %e, "Failed to send customer event");
        }
        for item_id in depleted_items {
            if let Err(e) = self
                .event_sender
                .send(Event::StockDepleted { item_id, order_id })
                .await
            {
                warn!(item_id = %item_id, error = %e, "Failed to send stock depleted event");
            }
        }

        info!(
            order_id = %order_id,
            order_number = %order_number,
            customer_id = %resolved.id,
            total_amount = %order_totals.total_amount,
            "Checkout completed"
        );

        Ok(CheckoutResult {
            order_id,
            order_number,
            customer_id: resolved.id,
            total_amount: order_totals.total_amount,
        })
    }
}

/// Decrements an item's stock counter, returning the remaining quantity.
///
/// The primary path is a conditional update guarded by
/// `stock_quantity >= quantity`; an affected-row count of zero means stock
/// moved under us since the advisory check, in which case the counter is
/// clamped at zero and the oversell is logged rather than silently absorbed.
pub async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
    quantity: i32,
) -> Result<i32, ServiceError> {
    let now = Utc::now();

    let result = Item::update_many()
        .col_expr(
            item::Column::StockQuantity,
            Expr::col(item::Column::StockQuantity).sub(quantity),
        )
        .col_expr(item::Column::UpdatedAt, Expr::value(now))
        .filter(item::Column::Id.eq(item_id))
        .filter(item::Column::StockQuantity.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(
            item_id = %item_id,
            quantity,
            "Stock changed between validation and decrement; clamping at zero"
        );
        counter!("storebot_checkout.stock_clamped", 1);

        Item::update_many()
            .col_expr(item::Column::StockQuantity, Expr::value(0))
            .col_expr(item::Column::UpdatedAt, Expr::value(now))
            .filter(item::Column::Id.eq(item_id))
            .exec(conn)
            .await?;

        return Ok(0);
    }

    let remaining = Item::find_by_id(item_id)
        .one(conn)
        .await?
        .map(|item| item.stock_quantity)
        .unwrap_or(0);

    Ok(remaining)
}
