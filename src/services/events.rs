use crate::database::Database;
use crate::error::CoreError;
use crate::models::Event;

/// Events are born draft unless created public; never born closed.
pub async fn create_event(
    db: &Database,
    title: &str,
    price: i64,
    public: bool,
) -> Result<Event, CoreError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO events (title, price, public_fg, closed_fg) VALUES (?1, ?2, ?3, 0) RETURNING id",
    )
    .bind(title)
    .bind(price)
    .bind(public)
    .fetch_one(&db.pool)
    .await?;

    Ok(Event {
        id,
        title: title.to_string(),
        price,
        public,
        closed: false,
    })
}

pub async fn get_event(db: &Database, event_id: i64) -> Result<Option<Event>, CoreError> {
    let event = sqlx::query_as::<_, Event>(
        "SELECT id, title, price, public_fg, closed_fg FROM events WHERE id = ?1",
    )
    .bind(event_id)
    .fetch_optional(&db.pool)
    .await?;
    Ok(event)
}

/// Admin edit of the public/closed flags. Closing forces the event out of
/// the public listing in the same update; a closed event rejects any
/// further edit, and an event that is currently public cannot be closed
/// (unpublish first, then close).
pub async fn edit_event(
    db: &Database,
    event_id: i64,
    public: bool,
    closed: bool,
) -> Result<Event, CoreError> {
    let public = if closed { false } else { public };

    let event = get_event(db, event_id).await?.ok_or(CoreError::NotFound)?;
    if event.closed {
        return Err(CoreError::CannotEditClosedEvent);
    }
    if event.public && closed {
        return Err(CoreError::CannotClosePublicEvent);
    }

    sqlx::query("UPDATE events SET public_fg = ?1, closed_fg = ?2 WHERE id = ?3")
        .bind(public)
        .bind(closed)
        .bind(event_id)
        .execute(&db.pool)
        .await?;

    Ok(Event {
        public,
        closed,
        ..event
    })
}
