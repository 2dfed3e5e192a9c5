use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One binding of a sheet to a user for one event run. Never deleted:
/// cancellation only sets `canceled_at`, so the row stays queryable for
/// history and sales reports.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub event_id: i64,
    pub sheet_id: i64,
    pub user_id: i64,
    pub reserved_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        self.canceled_at.is_none()
    }
}
