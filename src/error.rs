use thiserror::Error;

/// Every failure a core operation can surface. Validation and business
/// outcomes carry their wire-level slug as the display form; storage
/// faults are opaque to callers and only logged for operators.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid_event")]
    InvalidEvent,
    #[error("invalid_rank")]
    InvalidRank,
    #[error("invalid_sheet")]
    InvalidSheet,
    #[error("not_found")]
    NotFound,
    #[error("sold_out")]
    SoldOut,
    #[error("not_reserved")]
    NotReserved,
    #[error("not_permitted")]
    NotPermitted,
    #[error("cannot_edit_closed_event")]
    CannotEditClosedEvent,
    #[error("cannot_close_public_event")]
    CannotClosePublicEvent,
    #[error("internal")]
    Storage(#[source] sqlx::Error),
}

impl CoreError {
    /// HTTP-equivalent status for the request layer.
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::InvalidEvent | CoreError::InvalidSheet | CoreError::NotFound => 404,
            CoreError::InvalidRank
            | CoreError::NotReserved
            | CoreError::CannotEditClosedEvent
            | CoreError::CannotClosePublicEvent => 400,
            CoreError::SoldOut => 409,
            CoreError::NotPermitted => 403,
            CoreError::Storage(_) => 500,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("storage error: {:?}", e);
        CoreError::Storage(e)
    }
}
