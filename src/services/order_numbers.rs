use chrono::{NaiveDate, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    entities::{order, Order},
    errors::ServiceError,
};

const ORDER_NUMBER_PREFIX: &str = "ORD";

/// Derives the next human-readable order number for a tenant:
/// `ORD-YYYYMMDD-NNNN`, where NNNN is the count of the tenant's orders in
/// the current UTC calendar day plus one, zero-padded to four digits.
///
/// The count is read inside the caller's transaction; a same-day collision
/// between concurrent checkouts surfaces as a unique-constraint violation
/// on the order insert and rolls the whole checkout back.
pub async fn generate<C: ConnectionTrait>(
    conn: &C,
    project_id: Uuid,
) -> Result<String, ServiceError> {
    let now = Utc::now();
    let today = now.date_naive();

    let day_start = today
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ServiceError::InternalError("invalid day start".to_string()))?
        .and_utc();
    let day_end = today
        .and_hms_milli_opt(23, 59, 59, 999)
        .ok_or_else(|| ServiceError::InternalError("invalid day end".to_string()))?
        .and_utc();

    let todays_orders = Order::find()
        .filter(order::Column::ProjectId.eq(project_id))
        .filter(order::Column::CreatedAt.between(day_start, day_end))
        .count(conn)
        .await?;

    Ok(format_order_number(today, todays_orders + 1))
}

fn format_order_number(date: NaiveDate, sequence: u64) -> String {
    format!(
        "{}-{}-{:04}",
        ORDER_NUMBER_PREFIX,
        date.format("%Y%m%d"),
        sequence
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_zero_padded_sequence() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(format_order_number(date, 1), "ORD-20240307-0001");
        assert_eq!(format_order_number(date, 42), "ORD-20240307-0042");
        assert_eq!(format_order_number(date, 12345), "ORD-20240307-12345");
    }
}
