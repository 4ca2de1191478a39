//! Game-state and selection-arbitration engine for a turn-based memory match game.
//!
//! The [`MatchEngine`] owns the round: it deals a shuffled deck, accepts card clicks, pairs them into deferred match
//! evaluations, keeps score through a [`ScoreTracker`] and persists progress through a [`ProgressStore`]. Animation,
//! audio and storage media stay outside, behind the [`Presenter`], [`AudioSink`] and [`KeyValueStore`] traits.
//!
//! Every delay runs on a virtual clock owned by the engine; hosts call [`MatchEngine::advance`] with the real time
//! that passed, tests call [`MatchEngine::run_until_idle`].

use serde::{Deserialize, Serialize};

pub use audio::*;
pub use card::*;
pub use deck::*;
pub use engine::*;
pub use error::*;
pub use presenter::*;
pub use progress::*;
pub use schedule::*;
pub use score::*;
pub use store::*;
pub use types::*;

mod audio;
mod card;
mod deck;
mod engine;
mod error;
mod presenter;
mod progress;
mod schedule;
mod score;
mod store;
mod types;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Number of distinct card faces available; pair `k` uses face `k % shape_count`.
    pub shape_count: ShapeId,
    /// How long every card stays face up before play starts.
    pub preview_ms: Millis,
    /// Pause between the second pick and the comparison, and again before a mismatch is turned back.
    pub match_delay_ms: Millis,
    pub match_reward: Score,
    pub mismatch_penalty: Score,
    /// Resume a saved game instead of starting fresh when a save exists.
    pub load_save_on_start: bool,
    /// Base seed; round `n` shuffles with a seed derived from this and `n`.
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            shape_count: 12,
            preview_ms: 2000,
            match_delay_ms: 500,
            match_reward: 100,
            mismatch_penalty: -10,
            load_save_on_start: true,
            seed: 0,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<()> {
        if self.shape_count == 0 {
            return Err(GameError::EmptyShapePool);
        }
        if self.match_reward < 0 {
            return Err(GameError::InvalidConfig("match_reward must be >= 0"));
        }
        Ok(())
    }

    pub(crate) fn round_seed(&self, round: u32) -> u64 {
        self.seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(u64::from(round))
    }
}

/// Rows and columns of the card grid, validated to hold whole pairs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    rows: Count,
    columns: Count,
}

impl GridLayout {
    pub fn new(rows: Count, columns: Count) -> Result<Self> {
        if rows == 0 || columns == 0 {
            return Err(GameError::EmptyGrid);
        }
        let total = mult(rows, columns);
        if total % 2 != 0 {
            return Err(GameError::OddCardCount(total));
        }
        Ok(Self { rows, columns })
    }

    pub const fn rows(&self) -> Count {
        self.rows
    }

    pub const fn columns(&self) -> Count {
        self.columns
    }

    pub const fn total_cards(&self) -> Count {
        mult(self.rows, self.columns)
    }

    pub const fn pair_count(&self) -> Count {
        self.total_cards() / 2
    }

    /// Grid position of the card dealt at `index`, row-major.
    pub const fn position_of(&self, index: usize) -> (Count, Count) {
        let index = index as Count;
        (index / self.columns, index % self.columns)
    }
}
