use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub price: i64,
    #[sqlx(rename = "public_fg")]
    pub public: bool,
    #[sqlx(rename = "closed_fg")]
    pub closed: bool,
}

impl Event {
    /// On sale means visible and sellable: public and not closed.
    pub fn is_on_sale(&self) -> bool {
        self.public && !self.closed
    }
}
