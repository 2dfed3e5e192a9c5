use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::Database;
use crate::error::CoreError;

/// One sales ledger row. Field order is a compatibility contract for
/// downstream consumers and must not change.
#[derive(Debug, Clone, Serialize)]
pub struct SalesRow {
    pub reservation_id: i64,
    pub event_id: i64,
    pub rank: String,
    pub num: i64,
    pub price: i64,
    pub user_id: i64,
    pub sold_at: String,
    pub canceled_at: String,
}

const REPORT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Full historical ledger for one event, or for all events when `event_id`
/// is `None`. Canceled reservations are included with `canceled_at` set;
/// rows come back ordered by reservation id.
pub async fn export_sales(
    db: &Database,
    event_id: Option<i64>,
) -> Result<Vec<SalesRow>, CoreError> {
    type Row = (
        i64,
        i64,
        String,
        i64,
        i64,
        i64,
        DateTime<Utc>,
        Option<DateTime<Utc>>,
    );

    let rows: Vec<Row> = match event_id {
        Some(event_id) => {
            sqlx::query_as(
                r#"
                SELECT r.id, r.event_id, s.rank, s.num, s.price + e.price AS price,
                       r.user_id, r.reserved_at, r.canceled_at
                FROM reservations r
                  INNER JOIN sheets s ON s.id = r.sheet_id
                  INNER JOIN events e ON e.id = r.event_id
                WHERE r.event_id = ?1
                ORDER BY r.id
                "#,
            )
            .bind(event_id)
            .fetch_all(&db.pool)
            .await?
        }
        None => {
            sqlx::query_as(
                r#"
                SELECT r.id, r.event_id, s.rank, s.num, s.price + e.price AS price,
                       r.user_id, r.reserved_at, r.canceled_at
                FROM reservations r
                  INNER JOIN sheets s ON s.id = r.sheet_id
                  INNER JOIN events e ON e.id = r.event_id
                ORDER BY r.id
                "#,
            )
            .fetch_all(&db.pool)
            .await?
        }
    };

    Ok(rows
        .into_iter()
        .map(
            |(reservation_id, event_id, rank, num, price, user_id, reserved_at, canceled_at)| {
                SalesRow {
                    reservation_id,
                    event_id,
                    rank,
                    num,
                    price,
                    user_id,
                    sold_at: reserved_at.format(REPORT_TIME_FORMAT).to_string(),
                    canceled_at: canceled_at
                        .map(|t| t.format(REPORT_TIME_FORMAT).to_string())
                        .unwrap_or_default(),
                }
            },
        )
        .collect())
}
