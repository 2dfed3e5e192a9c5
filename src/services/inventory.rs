use crate::database::Database;
use crate::error::CoreError;
use crate::models::{Rank, Reservation, Sheet};
use tracing::info;

/// How many sheets one rank gets and at which price delta.
#[derive(Debug, Clone, Copy)]
pub struct RankPlan {
    pub rank: Rank,
    pub sheets: i64,
    pub price: i64,
}

/// The stock venue layout: 1000 sheets across four tiers.
pub fn default_plan() -> Vec<RankPlan> {
    vec![
        RankPlan { rank: Rank::S, sheets: 50, price: 5000 },
        RankPlan { rank: Rank::A, sheets: 150, price: 3000 },
        RankPlan { rank: Rank::B, sheets: 300, price: 1000 },
        RankPlan { rank: Rank::C, sheets: 500, price: 0 },
    ]
}

/// Writes the sheet reference data. Sheets are immutable afterwards and
/// shared across every event, so a non-empty table means a previous
/// provisioning run already happened and this call is a no-op.
pub async fn provision_sheets(db: &Database, plan: &[RankPlan]) -> Result<u64, CoreError> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sheets")
        .fetch_one(&db.pool)
        .await?;
    if existing > 0 {
        info!("sheets already provisioned ({} rows), skipping", existing);
        return Ok(0);
    }

    let mut tx = db.pool.begin().await?;
    let mut inserted: u64 = 0;
    for entry in plan {
        for num in 1..=entry.sheets {
            sqlx::query("INSERT INTO sheets (rank, num, price) VALUES (?1, ?2, ?3)")
                .bind(entry.rank.as_str())
                .bind(num)
                .bind(entry.price)
                .execute(&mut *tx)
                .await?;
            inserted += 1;
        }
    }
    tx.commit().await?;

    info!("🎫 Provisioned {} sheets", inserted);
    Ok(inserted)
}

pub async fn list_sheets_by_rank(db: &Database, rank: Rank) -> Result<Vec<Sheet>, CoreError> {
    let sheets = sqlx::query_as::<_, Sheet>(
        "SELECT id, rank, num, price FROM sheets WHERE rank = ?1 ORDER BY num",
    )
    .bind(rank.as_str())
    .fetch_all(&db.pool)
    .await?;
    Ok(sheets)
}

pub async fn find_sheet(db: &Database, rank: Rank, num: i64) -> Result<Option<Sheet>, CoreError> {
    let sheet = sqlx::query_as::<_, Sheet>(
        "SELECT id, rank, num, price FROM sheets WHERE rank = ?1 AND num = ?2",
    )
    .bind(rank.as_str())
    .bind(num)
    .fetch_optional(&db.pool)
    .await?;
    Ok(sheet)
}

/// The reservation currently holding (event, sheet), if any.
pub async fn get_active_holder(
    db: &Database,
    event_id: i64,
    sheet_id: i64,
) -> Result<Option<Reservation>, CoreError> {
    let holder = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT id, event_id, sheet_id, user_id, reserved_at, canceled_at
        FROM reservations
        WHERE event_id = ?1 AND sheet_id = ?2 AND canceled_at IS NULL
        "#,
    )
    .bind(event_id)
    .bind(sheet_id)
    .fetch_optional(&db.pool)
    .await?;
    Ok(holder)
}
