use core::fmt;
use serde::{Deserialize, Serialize};

/// Identifier of a card face, shared by exactly the two cards of a pair.
pub type ShapeId = u16;

/// Counter type for pairs, attempts and matches.
pub type Count = u32;

/// Signed score, may go below zero when penalties outweigh rewards.
pub type Score = i32;

/// Virtual clock resolution used by the timer queue.
pub type Millis = u64;

/// Handle of a dealt card.
///
/// Handles are handed out from a counter that is never rewound, so a handle kept past the card's destruction (or
/// past a round restart) resolves to nothing instead of to some newer card.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardId(u32);

impl CardId {
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub const fn mult(a: Count, b: Count) -> Count {
    a.saturating_mul(b)
}
