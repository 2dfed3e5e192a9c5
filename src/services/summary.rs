use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::BTreeMap;

use crate::database::Database;
use crate::error::CoreError;
use crate::models::{Event, Rank};

/* ---------- shapes ---------- */

#[derive(Debug, Clone, Serialize)]
pub struct RankSummary {
    pub total: i64,
    pub remains: i64,
    pub price: i64,
}

/// Per-event aggregate block. `total`/`remains` are derived from live
/// reservation state, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub id: i64,
    pub title: String,
    pub price: i64,
    pub public: bool,
    pub closed: bool,
    pub total: i64,
    pub remains: i64,
    pub sheets: BTreeMap<String, RankSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetStatus {
    pub num: i64,
    pub reserved: bool,
    pub mine: bool,
    pub reserved_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankDetail {
    pub rank: String,
    pub total: i64,
    pub remains: i64,
    pub price: i64,
    pub detail: Vec<SheetStatus>,
}

/// Seat-map view of one event: every sheet with its occupancy, grouped per
/// rank in display order.
#[derive(Debug, Clone, Serialize)]
pub struct EventDetail {
    pub id: i64,
    pub title: String,
    pub price: i64,
    pub public: bool,
    pub closed: bool,
    pub total: i64,
    pub remains: i64,
    pub sheets: Vec<RankDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationDigest {
    pub id: i64,
    pub event: Event,
    pub sheet_rank: String,
    pub sheet_num: i64,
    pub price: i64,
    pub reserved_at: i64,
    pub canceled_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub user_id: i64,
    pub recent_reservations: Vec<ReservationDigest>,
    pub total_price: i64,
    pub recent_events: Vec<EventSummary>,
}

/* ---------- events ---------- */

pub async fn summarize_event(
    db: &Database,
    event_id: i64,
) -> Result<Option<EventSummary>, CoreError> {
    // One transaction so sheet counts and reservation counts come from the
    // same snapshot.
    let mut tx = db.pool.begin().await?;

    let event = fetch_event(&mut tx, event_id).await?;
    let Some(event) = event else {
        tx.rollback().await?;
        return Ok(None);
    };

    let summary = summarize_in(&mut tx, &event).await?;
    tx.commit().await?;
    Ok(Some(summary))
}

/// Aggregate block for every event, ordered by id. `public_only` narrows to
/// what users may see.
pub async fn list_events(db: &Database, public_only: bool) -> Result<Vec<EventSummary>, CoreError> {
    let mut tx = db.pool.begin().await?;

    let sql = if public_only {
        "SELECT id, title, price, public_fg, closed_fg FROM events WHERE public_fg = 1 ORDER BY id"
    } else {
        "SELECT id, title, price, public_fg, closed_fg FROM events ORDER BY id"
    };
    let events = sqlx::query_as::<_, Event>(sql).fetch_all(&mut *tx).await?;

    let mut out = Vec::with_capacity(events.len());
    for event in &events {
        out.push(summarize_in(&mut tx, event).await?);
    }
    tx.commit().await?;
    Ok(out)
}

/// Seat map with per-sheet occupancy. `viewer` marks the caller's own
/// active reservations as `mine`.
pub async fn event_with_sheets(
    db: &Database,
    event_id: i64,
    viewer: Option<i64>,
) -> Result<Option<EventDetail>, CoreError> {
    let mut tx = db.pool.begin().await?;

    let event = fetch_event(&mut tx, event_id).await?;
    let Some(event) = event else {
        tx.rollback().await?;
        return Ok(None);
    };

    let rows: Vec<(String, i64, i64, Option<i64>, Option<DateTime<Utc>>)> = sqlx::query_as(
        r#"
        SELECT s.rank, s.num, s.price, r.user_id, r.reserved_at
        FROM sheets s
          LEFT JOIN reservations r
            ON r.canceled_at IS NULL
              AND r.event_id = ?1
              AND r.sheet_id = s.id
        ORDER BY s.rank, s.num
        "#,
    )
    .bind(event_id)
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;

    let mut per_rank: BTreeMap<String, RankDetail> = BTreeMap::new();
    let mut total = 0;
    let mut remains = 0;
    for (rank, num, sheet_price, holder, reserved_at) in rows {
        let entry = per_rank.entry(rank.clone()).or_insert_with(|| RankDetail {
            rank,
            total: 0,
            remains: 0,
            price: event.price + sheet_price,
            detail: Vec::new(),
        });
        entry.total += 1;
        total += 1;
        let reserved = holder.is_some();
        if !reserved {
            entry.remains += 1;
            remains += 1;
        }
        entry.detail.push(SheetStatus {
            num,
            reserved,
            mine: viewer.is_some() && holder == viewer,
            reserved_at: reserved_at.map(|t| t.timestamp()),
        });
    }

    // Display order is S, A, B, C rather than alphabetical.
    let sheets = Rank::ALL
        .iter()
        .filter_map(|r| per_rank.remove(r.as_str()))
        .collect();

    Ok(Some(EventDetail {
        id: event.id,
        title: event.title,
        price: event.price,
        public: event.public,
        closed: event.closed,
        total,
        remains,
        sheets,
    }))
}

/* ---------- users ---------- */

pub async fn summarize_user(db: &Database, user_id: i64) -> Result<UserSummary, CoreError> {
    let mut tx = db.pool.begin().await?;

    let rows: Vec<(
        i64,
        String,
        i64,
        i64,
        DateTime<Utc>,
        Option<DateTime<Utc>>,
        i64,
        String,
        i64,
        bool,
        bool,
    )> = sqlx::query_as(
        r#"
        SELECT r.id, s.rank, s.num, s.price + e.price AS price,
               r.reserved_at, r.canceled_at,
               e.id, e.title, e.price, e.public_fg, e.closed_fg
        FROM reservations r
          INNER JOIN events e ON e.id = r.event_id
          INNER JOIN sheets s ON s.id = r.sheet_id
        WHERE r.user_id = ?1
        ORDER BY COALESCE(r.canceled_at, r.reserved_at) DESC, r.id DESC
        LIMIT 5
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    let recent_reservations = rows
        .into_iter()
        .map(
            |(id, rank, num, price, reserved_at, canceled_at, eid, title, eprice, public, closed)| {
                ReservationDigest {
                    id,
                    event: Event {
                        id: eid,
                        title,
                        price: eprice,
                        public,
                        closed,
                    },
                    sheet_rank: rank,
                    sheet_num: num,
                    price,
                    reserved_at: reserved_at.timestamp(),
                    canceled_at: canceled_at.map(|t| t.timestamp()),
                }
            },
        )
        .collect();

    // Lifetime spend counts active reservations only.
    let total_price: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(s.price + e.price), 0)
        FROM reservations r
          INNER JOIN events e ON e.id = r.event_id
          INNER JOIN sheets s ON s.id = r.sheet_id
        WHERE r.user_id = ?1 AND r.canceled_at IS NULL
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    let touched: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT event_id
        FROM reservations
        WHERE user_id = ?1
        GROUP BY event_id
        ORDER BY MAX(COALESCE(canceled_at, reserved_at)) DESC, MAX(id) DESC
        LIMIT 5
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut recent_events = Vec::with_capacity(touched.len());
    for event_id in touched {
        if let Some(event) = fetch_event(&mut tx, event_id).await? {
            recent_events.push(summarize_in(&mut tx, &event).await?);
        }
    }
    tx.commit().await?;

    Ok(UserSummary {
        user_id,
        recent_reservations,
        total_price,
        recent_events,
    })
}

/* ---------- internals ---------- */

async fn fetch_event(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        "SELECT id, title, price, public_fg, closed_fg FROM events WHERE id = ?1",
    )
    .bind(event_id)
    .fetch_optional(conn)
    .await
}

/// Per-rank totals/remains in a single grouped statement, so both counts
/// observe the same reservation state.
async fn summarize_in(
    conn: &mut SqliteConnection,
    event: &Event,
) -> Result<EventSummary, sqlx::Error> {
    let rows: Vec<(String, i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT s.rank, COUNT(*) AS total,
               COUNT(*) - COUNT(r.id) AS remains,
               MIN(s.price) AS sheet_price
        FROM sheets s
          LEFT JOIN reservations r
            ON r.canceled_at IS NULL
              AND r.event_id = ?1
              AND r.sheet_id = s.id
        GROUP BY s.rank
        ORDER BY s.rank
        "#,
    )
    .bind(event.id)
    .fetch_all(conn)
    .await?;

    let mut total = 0;
    let mut remains = 0;
    let mut sheets = BTreeMap::new();
    for (rank, rank_total, rank_remains, sheet_price) in rows {
        total += rank_total;
        remains += rank_remains;
        sheets.insert(
            rank,
            RankSummary {
                total: rank_total,
                remains: rank_remains,
                price: event.price + sheet_price,
            },
        );
    }

    Ok(EventSummary {
        id: event.id,
        title: event.title.clone(),
        price: event.price,
        public: event.public,
        closed: event.closed,
        total,
        remains,
        sheets,
    })
}
