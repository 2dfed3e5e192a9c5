mod common;

use std::collections::HashSet;
use std::sync::Arc;

use ticket_core::models::Rank;
use ticket_core::services::{events, inventory, reports, reservations, summary};
use ticket_core::CoreError;

#[tokio::test]
async fn allocate_requires_a_public_event() -> anyhow::Result<()> {
    let harness = common::setup().await;
    let db = &harness.db;
    common::seed_sheets(db, &common::small_plan()).await;

    let missing = reservations::allocate(db, 9999, "S", 1).await;
    assert!(matches!(missing, Err(CoreError::InvalidEvent)));

    let draft = events::create_event(db, "draft event", 1000, false).await?;
    let hidden = reservations::allocate(db, draft.id, "S", 1).await;
    assert!(matches!(hidden, Err(CoreError::InvalidEvent)));

    // Event validation comes before rank validation.
    let both_bad = reservations::allocate(db, draft.id, "Z", 1).await;
    assert!(matches!(both_bad, Err(CoreError::InvalidEvent)));
    Ok(())
}

#[tokio::test]
async fn allocate_rejects_unknown_ranks() -> anyhow::Result<()> {
    let harness = common::setup().await;
    let db = &harness.db;
    common::seed_sheets(db, &common::small_plan()).await;
    let event = common::create_public_event(db, "rock night", 1000).await;

    for bad in ["Z", "s", "", "SS"] {
        let result = reservations::allocate(db, event.id, bad, 1).await;
        assert!(matches!(result, Err(CoreError::InvalidRank)), "rank {:?}", bad);
    }
    Ok(())
}

#[tokio::test]
async fn allocate_fills_a_rank_then_sells_out() -> anyhow::Result<()> {
    let harness = common::setup().await;
    let db = &harness.db;
    common::seed_sheets(db, &common::small_plan()).await;
    let event = common::create_public_event(db, "rock night", 1000).await;

    // 3 A-sheets: every allocation binds a distinct seat and the remaining
    // count tracks each commit.
    let mut nums = HashSet::new();
    for expected_remains in (0..3).rev() {
        let seat = reservations::allocate(db, event.id, "A", 7).await?;
        assert_eq!(seat.sheet_rank, "A");
        assert!(nums.insert(seat.sheet_num), "seat {} bound twice", seat.sheet_num);

        let after = summary::summarize_event(db, event.id).await?.unwrap();
        assert_eq!(after.sheets["A"].remains, expected_remains);
    }

    let exhausted = reservations::allocate(db, event.id, "A", 7).await;
    assert!(matches!(exhausted, Err(CoreError::SoldOut)));

    // Other ranks are untouched.
    let after = summary::summarize_event(db, event.id).await?.unwrap();
    assert_eq!(after.sheets["S"].remains, 2);
    assert_eq!(after.sheets["B"].remains, 5);
    Ok(())
}

#[tokio::test]
async fn two_concurrent_allocations_one_seat() -> anyhow::Result<()> {
    let harness = common::setup().await;
    let db = &harness.db;
    common::seed_sheets(
        db,
        &[inventory::RankPlan { rank: Rank::S, sheets: 1, price: 5000 }],
    )
    .await;
    let event = common::create_public_event(db, "tiny venue", 1000).await;

    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let mut handles = Vec::new();
    for user_id in [1, 2] {
        let db = db.clone();
        let barrier = barrier.clone();
        let event_id = event.id;
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            reservations::allocate(&db, event_id, "S", user_id).await
        }));
    }

    let mut won = 0;
    let mut sold_out = 0;
    for outcome in futures::future::join_all(handles).await {
        match outcome? {
            Ok(_) => won += 1,
            Err(CoreError::SoldOut) => sold_out += 1,
            Err(e) => panic!("unexpected failure: {e}"),
        }
    }
    assert_eq!((won, sold_out), (1, 1));
    Ok(())
}

#[tokio::test]
async fn concurrent_allocations_never_double_bind() -> anyhow::Result<()> {
    let harness = common::setup().await;
    let db = &harness.db;
    common::seed_sheets(db, &common::small_plan()).await;
    let event = common::create_public_event(db, "crowded night", 1000).await;

    // 24 callers race for the 5 B-sheets.
    let callers = 24;
    let barrier = Arc::new(tokio::sync::Barrier::new(callers));
    let mut handles = Vec::new();
    for user_id in 0..callers {
        let db = db.clone();
        let barrier = barrier.clone();
        let event_id = event.id;
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            reservations::allocate(&db, event_id, "B", user_id as i64).await
        }));
    }

    let mut bound = HashSet::new();
    let mut sold_out = 0;
    for outcome in futures::future::join_all(handles).await {
        match outcome? {
            Ok(seat) => {
                assert!(
                    bound.insert(seat.sheet_num),
                    "seat B-{} bound to two reservations",
                    seat.sheet_num
                );
            }
            Err(CoreError::SoldOut) => sold_out += 1,
            Err(e) => panic!("unexpected failure: {e}"),
        }
    }
    assert_eq!(bound.len(), 5);
    assert_eq!(sold_out, callers - 5);

    let after = summary::summarize_event(db, event.id).await?.unwrap();
    assert_eq!(after.sheets["B"].remains, 0);
    Ok(())
}

#[tokio::test]
async fn allocation_picks_among_all_available_seats() -> anyhow::Result<()> {
    let harness = common::setup().await;
    let db = &harness.db;
    common::seed_sheets(db, &common::small_plan()).await;
    let event = common::create_public_event(db, "lottery night", 1000).await;

    // Allocate-then-cancel against a fully free 5-seat rank; over enough
    // rounds every seat should come up if the pick is unbiased.
    let mut seen = HashSet::new();
    for _ in 0..100 {
        let seat = reservations::allocate(db, event.id, "B", 1).await?;
        seen.insert(seat.sheet_num);
        reservations::cancel(db, event.id, "B", seat.sheet_num, 1).await?;
        if seen.len() == 5 {
            break;
        }
    }
    assert_eq!(seen.len(), 5, "only seats {seen:?} were ever selected");
    Ok(())
}

#[tokio::test]
async fn cancel_frees_the_seat_for_reallocation() -> anyhow::Result<()> {
    let harness = common::setup().await;
    let db = &harness.db;
    common::seed_sheets(
        db,
        &[inventory::RankPlan { rank: Rank::S, sheets: 1, price: 5000 }],
    )
    .await;
    let event = common::create_public_event(db, "tiny venue", 1000).await;

    let before = summary::summarize_event(db, event.id).await?.unwrap();
    assert_eq!(before.remains, 1);

    let first = reservations::allocate(db, event.id, "S", 42).await?;
    reservations::cancel(db, event.id, "S", first.sheet_num, 42).await?;

    let freed = summary::summarize_event(db, event.id).await?.unwrap();
    assert_eq!(freed.remains, 1);

    // The seat is a candidate again; a new reservation row is created.
    let second = reservations::allocate(db, event.id, "S", 42).await?;
    assert_eq!(second.sheet_num, first.sheet_num);
    assert_ne!(second.id, first.id);

    let after = summary::summarize_event(db, event.id).await?.unwrap();
    assert_eq!(after.remains, 0);
    Ok(())
}

#[tokio::test]
async fn cancel_validates_event_rank_and_sheet() -> anyhow::Result<()> {
    let harness = common::setup().await;
    let db = &harness.db;
    common::seed_sheets(db, &common::small_plan()).await;
    let event = common::create_public_event(db, "rock night", 1000).await;

    let missing_event = reservations::cancel(db, 9999, "S", 1, 1).await;
    assert!(matches!(missing_event, Err(CoreError::InvalidEvent)));

    let bad_rank = reservations::cancel(db, event.id, "X", 1, 1).await;
    assert!(matches!(bad_rank, Err(CoreError::InvalidRank)));

    // Rank S only has 2 sheets in this plan.
    let bad_sheet = reservations::cancel(db, event.id, "S", 99, 1).await;
    assert!(matches!(bad_sheet, Err(CoreError::InvalidSheet)));
    Ok(())
}

#[tokio::test]
async fn cancel_requires_an_active_holder_and_ownership() -> anyhow::Result<()> {
    let harness = common::setup().await;
    let db = &harness.db;
    common::seed_sheets(db, &common::small_plan()).await;
    let event = common::create_public_event(db, "rock night", 1000).await;

    // Nothing reserved yet.
    let empty = reservations::cancel(db, event.id, "S", 1, 1).await;
    assert!(matches!(empty, Err(CoreError::NotReserved)));

    let seat = reservations::allocate(db, event.id, "S", 1).await?;

    // A different user may not release it, and the hold stays in place.
    let foreign = reservations::cancel(db, event.id, "S", seat.sheet_num, 2).await;
    assert!(matches!(foreign, Err(CoreError::NotPermitted)));
    let sheet = inventory::find_sheet(db, Rank::S, seat.sheet_num).await?.unwrap();
    let holder = inventory::get_active_holder(db, event.id, sheet.id).await?;
    assert_eq!(holder.map(|r| r.user_id), Some(1));

    // Owner cancels; a second cancel observes the seat as free again.
    reservations::cancel(db, event.id, "S", seat.sheet_num, 1).await?;
    let again = reservations::cancel(db, event.id, "S", seat.sheet_num, 1).await;
    assert!(matches!(again, Err(CoreError::NotReserved)));
    Ok(())
}

#[tokio::test]
async fn closing_an_event_stops_sales_but_keeps_history() -> anyhow::Result<()> {
    let harness = common::setup().await;
    let db = &harness.db;
    common::seed_sheets(db, &common::small_plan()).await;
    let event = common::create_public_event(db, "farewell show", 2000).await;

    let seat = reservations::allocate(db, event.id, "S", 5).await?;

    // Closing takes two edits: unpublish, then close.
    events::edit_event(db, event.id, false, false).await?;
    events::edit_event(db, event.id, false, true).await?;

    let rejected = reservations::allocate(db, event.id, "S", 6).await;
    assert!(matches!(rejected, Err(CoreError::InvalidEvent)));

    // The sold seat stays on the ledger.
    let rows = reports::export_sales(db, Some(event.id)).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].reservation_id, seat.id);
    assert_eq!(rows[0].canceled_at, "");
    Ok(())
}
