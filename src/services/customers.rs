use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        customer::{self, CreatedVia},
        Customer,
    },
    errors::ServiceError,
};

/// External chat-platform identity, present when the checkout originated
/// from the bot or Mini App channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramIdentity {
    pub telegram_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Caller-supplied contact details for the order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContactInfo {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedCustomer {
    pub id: Uuid,
    pub created: bool,
}

/// Finds or creates the customer for a checkout, inside the caller's
/// transaction.
///
/// With a Telegram identity the lookup key is (project, telegram_id); a hit
/// overwrites the stored contact fields with the newest submission
/// (last-write-wins, no merging). Without an identity a fresh customer row
/// is always inserted - the fallback path never reuses prior records.
#[instrument(skip(conn, contact), fields(project_id = %project_id))]
pub async fn resolve_for_checkout<C: ConnectionTrait>(
    conn: &C,
    project_id: Uuid,
    identity: Option<&TelegramIdentity>,
    contact: &ContactInfo,
) -> Result<ResolvedCustomer, ServiceError> {
    let now = Utc::now();

    if let Some(identity) = identity {
        let existing = Customer::find()
            .filter(customer::Column::ProjectId.eq(project_id))
            .filter(customer::Column::TelegramId.eq(identity.telegram_id))
            .one(conn)
            .await?;

        if let Some(existing) = existing {
            let customer_id = existing.id;
            let mut active: customer::ActiveModel = existing.into();
            active.first_name = Set(contact.first_name.clone());
            active.last_name = Set(contact
                .last_name
                .clone()
                .or_else(|| identity.last_name.clone()));
            active.phone = Set(contact.phone.clone());
            active.telegram_username = Set(identity.username.clone());
            active.updated_at = Set(now);
            active.update(conn).await?;

            info!(customer_id = %customer_id, "Reused existing customer for Telegram identity");
            return Ok(ResolvedCustomer {
                id: customer_id,
                created: false,
            });
        }
    }

    let customer_id = Uuid::new_v4();
    let active = customer::ActiveModel {
        id: Set(customer_id),
        project_id: Set(project_id),
        telegram_id: Set(identity.map(|i| i.telegram_id)),
        telegram_username: Set(identity.and_then(|i| i.username.clone())),
        first_name: Set(contact.first_name.clone()),
        last_name: Set(contact
            .last_name
            .clone()
            .or_else(|| identity.and_then(|i| i.last_name.clone()))),
        phone: Set(contact.phone.clone()),
        created_via: Set(if identity.is_some() {
            CreatedVia::Telegram
        } else {
            CreatedVia::Direct
        }),
        created_at: Set(now),
        updated_at: Set(now),
    };
    active.insert(conn).await?;

    info!(customer_id = %customer_id, "Created new customer");
    Ok(ResolvedCustomer {
        id: customer_id,
        created: true,
    })
}
