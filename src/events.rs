use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::order::{OrderStatus, PaymentStatus};

/// Cloneable handle for emitting domain events from services.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Domain events emitted by the order pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    PaymentStatusChanged {
        order_id: Uuid,
        payment_status: PaymentStatus,
    },

    // Customer events
    CustomerCreated(Uuid),
    CustomerUpdated(Uuid),

    // Inventory events
    StockDepleted {
        item_id: Uuid,
        order_id: Uuid,
    },
}

/// Background event processing loop. Downstream consumers (notifications,
/// bot messaging) hang off this; the core only logs.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "Order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    ?old_status,
                    ?new_status,
                    "Order status changed"
                );
            }
            Event::PaymentStatusChanged {
                order_id,
                payment_status,
            } => {
                info!(order_id = %order_id, ?payment_status, "Payment status changed");
            }
            Event::CustomerCreated(customer_id) => {
                info!(customer_id = %customer_id, "Customer created");
            }
            Event::CustomerUpdated(customer_id) => {
                info!(customer_id = %customer_id, "Customer updated");
            }
            Event::StockDepleted { item_id, order_id } => {
                warn!(item_id = %item_id, order_id = %order_id, "Item stock depleted");
            }
        }
    }

    info!("Event processing loop stopped");
}
