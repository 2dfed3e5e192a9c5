use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::database::Database;
use crate::error::CoreError;
use crate::models::Rank;

/// What a successful allocation hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct AllocatedSeat {
    pub id: i64,
    pub sheet_rank: String,
    pub sheet_num: i64,
}

// A write unit can lose a race on the active-holder index or abort when the
// engine reports write contention; both are retried a bounded number of
// times before surfacing as internal.
const MAX_WRITE_ATTEMPTS: u32 = 10;
const RETRY_BACKOFF: Duration = Duration::from_millis(5);

/* ---------- ALLOCATION ---------- */

/// Binds one currently-free sheet of `rank` to a new reservation for
/// `user_id`, picking uniformly at random among all free sheets. Fails with
/// `sold_out` when the rank has no free sheet left for this event.
pub async fn allocate(
    db: &Database,
    event_id: i64,
    rank: &str,
    user_id: i64,
) -> Result<AllocatedSeat, CoreError> {
    let on_sale: Option<i64> =
        sqlx::query_scalar("SELECT id FROM events WHERE id = ?1 AND public_fg = 1 AND closed_fg = 0")
            .bind(event_id)
            .fetch_optional(&db.pool)
            .await?;
    if on_sale.is_none() {
        return Err(CoreError::InvalidEvent);
    }
    let rank = Rank::from_param(rank).ok_or(CoreError::InvalidRank)?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        match try_bind_random_sheet(db, event_id, rank, user_id).await {
            Ok(Some(seat)) => {
                debug!(
                    "reserved sheet {}{} of event {} for user {} (reservation {})",
                    seat.sheet_rank, seat.sheet_num, event_id, user_id, seat.id
                );
                return Ok(seat);
            }
            Ok(None) => return Err(CoreError::SoldOut),
            Err(e) if is_write_conflict(&e) && attempt < MAX_WRITE_ATTEMPTS => {
                debug!("allocation attempt {} lost a race, retrying: {:?}", attempt, e);
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// The candidate scan, the unbiased pick and the bind run as one atomic
/// statement, so no other writer can see the chosen sheet as free once this
/// commits. Zero rows inserted means the candidate set was empty.
async fn try_bind_random_sheet(
    db: &Database,
    event_id: i64,
    rank: Rank,
    user_id: i64,
) -> Result<Option<AllocatedSeat>, sqlx::Error> {
    let inserted: Option<(i64, i64)> = sqlx::query_as(
        r#"
        INSERT INTO reservations (event_id, sheet_id, user_id, reserved_at)
        SELECT ?1, s.id, ?2, ?3
        FROM sheets s
        WHERE s.rank = ?4
          AND NOT EXISTS (
              SELECT 1 FROM reservations r
              WHERE r.event_id = ?1
                AND r.sheet_id = s.id
                AND r.canceled_at IS NULL
          )
        ORDER BY RANDOM()
        LIMIT 1
        RETURNING id, sheet_id
        "#,
    )
    .bind(event_id)
    .bind(user_id)
    .bind(Utc::now())
    .bind(rank.as_str())
    .fetch_optional(&db.pool)
    .await?;

    let Some((reservation_id, sheet_id)) = inserted else {
        return Ok(None);
    };

    let sheet_num: i64 = sqlx::query_scalar("SELECT num FROM sheets WHERE id = ?1")
        .bind(sheet_id)
        .fetch_one(&db.pool)
        .await?;

    Ok(Some(AllocatedSeat {
        id: reservation_id,
        sheet_rank: rank.as_str().to_string(),
        sheet_num,
    }))
}

/* ---------- CANCELLATION ---------- */

enum CancelOutcome {
    Done,
    NotReserved,
    NotPermitted,
}

/// Soft-cancels the active reservation on (event, rank, num) if it belongs
/// to `user_id`. The sheet becomes an allocation candidate again the moment
/// the cancel commits.
pub async fn cancel(
    db: &Database,
    event_id: i64,
    rank: &str,
    num: i64,
    user_id: i64,
) -> Result<(), CoreError> {
    let on_sale: Option<i64> =
        sqlx::query_scalar("SELECT id FROM events WHERE id = ?1 AND public_fg = 1 AND closed_fg = 0")
            .bind(event_id)
            .fetch_optional(&db.pool)
            .await?;
    if on_sale.is_none() {
        return Err(CoreError::InvalidEvent);
    }
    let rank = Rank::from_param(rank).ok_or(CoreError::InvalidRank)?;

    let sheet_id: Option<i64> = sqlx::query_scalar("SELECT id FROM sheets WHERE rank = ?1 AND num = ?2")
        .bind(rank.as_str())
        .bind(num)
        .fetch_optional(&db.pool)
        .await?;
    let Some(sheet_id) = sheet_id else {
        return Err(CoreError::InvalidSheet);
    };

    let mut attempt = 0;
    loop {
        attempt += 1;
        match try_cancel(db, event_id, sheet_id, user_id).await {
            Ok(CancelOutcome::Done) => {
                debug!(
                    "canceled reservation on sheet {}{} of event {} for user {}",
                    rank, num, event_id, user_id
                );
                return Ok(());
            }
            Ok(CancelOutcome::NotReserved) => return Err(CoreError::NotReserved),
            Ok(CancelOutcome::NotPermitted) => return Err(CoreError::NotPermitted),
            Err(e) if is_write_conflict(&e) && attempt < MAX_WRITE_ATTEMPTS => {
                debug!("cancel attempt {} hit write contention, retrying: {:?}", attempt, e);
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Fetch-classify-update as one unit; every non-success path rolls back.
async fn try_cancel(
    db: &Database,
    event_id: i64,
    sheet_id: i64,
    user_id: i64,
) -> Result<CancelOutcome, sqlx::Error> {
    let mut tx = db.pool.begin().await?;

    let holder: Option<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT id, user_id
        FROM reservations
        WHERE event_id = ?1 AND sheet_id = ?2 AND canceled_at IS NULL
        "#,
    )
    .bind(event_id)
    .bind(sheet_id)
    .fetch_optional(&mut *tx)
    .await?;

    match holder {
        None => {
            tx.rollback().await?;
            Ok(CancelOutcome::NotReserved)
        }
        Some((_, holder_id)) if holder_id != user_id => {
            tx.rollback().await?;
            Ok(CancelOutcome::NotPermitted)
        }
        Some((reservation_id, _)) => {
            sqlx::query("UPDATE reservations SET canceled_at = ?1 WHERE id = ?2")
                .bind(Utc::now())
                .bind(reservation_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(CancelOutcome::Done)
        }
    }
}

/* ---------- helpers ---------- */

fn is_write_conflict(e: &sqlx::Error) -> bool {
    let Some(db_err) = e.as_database_error() else {
        return false;
    };
    if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
        return true;
    }
    // SQLITE_BUSY / SQLITE_LOCKED family, including the snapshot-upgrade
    // abort a deferred transaction hits when it turns writer too late.
    matches!(db_err.code().as_deref(), Some("5" | "6" | "261" | "517"))
}
