use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    cache::{CacheTag, ListingCache},
    entities::{
        order::{self, OrderStatus, PaymentMethod, PaymentStatus},
        order_item, Order, OrderItem,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Listing row for the merchant dashboard. Flat and serializable so whole
/// pages can sit in the listing cache as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for OrderSummary {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            customer_id: model.customer_id,
            status: model.status,
            payment_method: model.payment_method,
            payment_status: model.payment_status,
            total_amount: model.total_amount,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<OrderSummary>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Read access and lifecycle transitions for persisted orders.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    cache: ListingCache,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender, cache: ListingCache) -> Self {
        Self {
            db,
            event_sender,
            cache,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    #[instrument(skip(self))]
    pub async fn get_order_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        Ok(items)
    }

    /// Paginated listing for one tenant, newest first. Pages are cached as
    /// JSON under the orders tag and evicted whenever a checkout commits or
    /// an order transitions.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn list_orders(
        &self,
        project_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<OrderPage, ServiceError> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let cache_key = format!("orders:{}:{}:{}", project_id, page, limit);

        if let Some(cached) = self.cache.get(&cache_key).await {
            if let Ok(page) = serde_json::from_str::<OrderPage>(&cached) {
                counter!("storebot_orders.list_cache_hits", 1);
                return Ok(page);
            }
        }

        let paginator = Order::find()
            .filter(order::Column::ProjectId.eq(project_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let orders = paginator
            .fetch_page(page - 1)
            .await?
            .into_iter()
            .map(OrderSummary::from)
            .collect();

        let result = OrderPage {
            orders,
            total,
            page,
            limit,
        };

        if let Ok(serialized) = serde_json::to_string(&result) {
            if let Err(e) = self.cache.set(&cache_key, &serialized, CacheTag::Orders).await {
                warn!(error = %e, "Failed to cache order listing");
            }
        }

        Ok(result)
    }

    /// Transitions an order's lifecycle status. Cancelled is terminal; any
    /// further transition is rejected. Moving into Confirmed or Delivered
    /// stamps the matching timestamp once, and cancelling an unpaid order
    /// cancels its payment as well.
    #[instrument(skip(self), fields(order_id = %order_id, ?new_status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let existing = self.get_order(order_id).await?;
        let old_status = existing.status;

        if old_status.is_terminal() {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} is cancelled and cannot change status",
                existing.order_number
            )));
        }
        if old_status == new_status {
            return Ok(existing);
        }

        let now = Utc::now();
        let payment_status = existing.payment_status;
        let confirmed_at = existing.confirmed_at;
        let delivered_at = existing.delivered_at;
        let mut active: order::ActiveModel = existing.into();
        active.status = Set(new_status);
        active.updated_at = Set(Some(now));
        match new_status {
            // Lifecycle timestamps record the first entry into a state and
            // are never overwritten on re-entry.
            OrderStatus::Confirmed => {
                if confirmed_at.is_none() {
                    active.confirmed_at = Set(Some(now));
                }
            }
            OrderStatus::Delivered => {
                if delivered_at.is_none() {
                    active.delivered_at = Set(Some(now));
                }
            }
            OrderStatus::Cancelled => {
                if payment_status == PaymentStatus::Pending {
                    active.payment_status = Set(PaymentStatus::Cancelled);
                }
            }
            OrderStatus::Pending => {}
        }
        let updated = active.update(&*self.db).await?;

        counter!("storebot_orders.status_transitions", 1);
        self.cache.invalidate(&[CacheTag::Orders]).await;

        if let Err(e) = self
            .event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await
        {
            warn!(order_id = %order_id, error = %e, "Failed to send status change event");
        }

        info!(
            order_id = %order_id,
            ?old_status,
            ?new_status,
            "Order status updated"
        );
        Ok(updated)
    }

    /// Transitions an order's payment status. Marking Paid stamps `paid_at`;
    /// cancelled orders accept no payment updates.
    #[instrument(skip(self), fields(order_id = %order_id, ?new_status))]
    pub async fn update_payment_status(
        &self,
        order_id: Uuid,
        new_status: PaymentStatus,
    ) -> Result<order::Model, ServiceError> {
        let existing = self.get_order(order_id).await?;

        if existing.status.is_terminal() {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} is cancelled and cannot change payment status",
                existing.order_number
            )));
        }
        if existing.payment_status == new_status {
            return Ok(existing);
        }

        let now = Utc::now();
        let paid_at = existing.paid_at;
        let mut active: order::ActiveModel = existing.into();
        active.payment_status = Set(new_status);
        active.updated_at = Set(Some(now));
        if new_status == PaymentStatus::Paid && paid_at.is_none() {
            active.paid_at = Set(Some(now));
        }
        let updated = active.update(&*self.db).await?;

        self.cache.invalidate(&[CacheTag::Orders]).await;

        if let Err(e) = self
            .event_sender
            .send(Event::PaymentStatusChanged {
                order_id,
                payment_status: new_status,
            })
            .await
        {
            warn!(order_id = %order_id, error = %e, "Failed to send payment status event");
        }

        info!(order_id = %order_id, ?new_status, "Payment status updated");
        Ok(updated)
    }
}
