use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Seating tier. Sheets of one rank share a price delta on top of the
/// event base price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    S,
    A,
    B,
    C,
}

impl Rank {
    /// Display order used for seat maps.
    pub const ALL: [Rank; 4] = [Rank::S, Rank::A, Rank::B, Rank::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::S => "S",
            Rank::A => "A",
            Rank::B => "B",
            Rank::C => "C",
        }
    }

    /// Parses caller-supplied rank input. Anything but the four known
    /// tiers is invalid.
    pub fn from_param(s: &str) -> Option<Rank> {
        match s {
            "S" => Some(Rank::S),
            "A" => Some(Rank::A),
            "B" => Some(Rank::B),
            "C" => Some(Rank::C),
            _ => None,
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Sheet {
    pub id: i64,
    pub rank: String,
    pub num: i64,
    pub price: i64,
}
