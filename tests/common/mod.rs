#![allow(dead_code)]

use std::time::Duration;
use tempfile::TempDir;

use ticket_core::database::Database;
use ticket_core::models::{Event, Rank};
use ticket_core::services::{events, inventory};

/// Fresh database in a temp directory, migrated and ready. The directory
/// guard must stay alive for the duration of the test.
pub struct TestDb {
    pub db: Database,
    _dir: TempDir,
}

pub async fn setup() -> TestDb {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("core.db").display());
    let db = Database::new(&url, 8, Duration::from_secs(5))
        .await
        .expect("failed to open database");
    db.run_migrations().await.expect("failed to run migrations");

    TestDb { db, _dir: dir }
}

/// Small venue used by most tests: S×2 @ +5000, A×3 @ +3000, B×5 @ +1000,
/// C×4 @ +0.
pub fn small_plan() -> Vec<inventory::RankPlan> {
    vec![
        inventory::RankPlan { rank: Rank::S, sheets: 2, price: 5000 },
        inventory::RankPlan { rank: Rank::A, sheets: 3, price: 3000 },
        inventory::RankPlan { rank: Rank::B, sheets: 5, price: 1000 },
        inventory::RankPlan { rank: Rank::C, sheets: 4, price: 0 },
    ]
}

pub async fn seed_sheets(db: &Database, plan: &[inventory::RankPlan]) {
    inventory::provision_sheets(db, plan)
        .await
        .expect("failed to provision sheets");
}

pub async fn create_public_event(db: &Database, title: &str, price: i64) -> Event {
    events::create_event(db, title, price, true)
        .await
        .expect("failed to create event")
}
