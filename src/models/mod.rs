pub mod event;
pub mod reservation;
pub mod sheet;

pub use event::Event;
pub use reservation::Reservation;
pub use sheet::{Rank, Sheet};
