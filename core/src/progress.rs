use chrono::prelude::*;
use serde::{Deserialize, Serialize};

use crate::*;

/// Progress tuple as persisted between sessions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedProgress {
    pub score: Score,
    pub matches_found: Count,
    pub total_attempts: Count,
    pub best_score: Score,
}

/// Gateway between the game and its [`KeyValueStore`].
///
/// Each save goes out as a single batch, so a reader never observes a score from one save next to attempts from
/// another.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressStore<S> {
    store: S,
}

impl<S: KeyValueStore> ProgressStore<S> {
    pub const SCORE_KEY: &'static str = "memomatch:progress:score";
    pub const MATCHES_KEY: &'static str = "memomatch:progress:matches";
    pub const ATTEMPTS_KEY: &'static str = "memomatch:progress:attempts";
    pub const BEST_SCORE_KEY: &'static str = "memomatch:progress:best_score";
    pub const LAST_PLAYED_KEY: &'static str = "memomatch:progress:last_played";
    pub const HAS_SAVE_KEY: &'static str = "memomatch:progress:has_save";

    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    pub fn has_save(&self) -> bool {
        matches!(self.store.get_int(Self::HAS_SAVE_KEY), Ok(Some(1)))
    }

    pub fn save_progress(
        &mut self,
        score: Score,
        matches_found: Count,
        total_attempts: Count,
    ) -> StorageResult<()> {
        self.save_progress_at(score, matches_found, total_attempts, Utc::now())
    }

    pub fn save_progress_at(
        &mut self,
        score: Score,
        matches_found: Count,
        total_attempts: Count,
        played_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let best_score = self.best_score()?.max(score);

        let mut batch = WriteBatch::new();
        batch
            .put_int(Self::SCORE_KEY, score.into())
            .put_int(Self::MATCHES_KEY, matches_found.into())
            .put_int(Self::ATTEMPTS_KEY, total_attempts.into())
            .put_int(Self::BEST_SCORE_KEY, best_score.into())
            .put_text(Self::LAST_PLAYED_KEY, played_at.to_rfc3339())
            .put_int(Self::HAS_SAVE_KEY, 1);
        self.store.commit(batch)?;

        log::debug!(
            "Progress saved, score: {}, matches: {}, attempts: {}, best: {}",
            score,
            matches_found,
            total_attempts,
            best_score
        );
        Ok(())
    }

    /// Saved progress, or zeros next to the best score when nothing is saved.
    pub fn load_progress(&self) -> StorageResult<SavedProgress> {
        let best_score = self.best_score()?;
        if !self.has_save() {
            log::debug!("No saved game found");
            return Ok(SavedProgress {
                best_score,
                ..Default::default()
            });
        }

        Ok(SavedProgress {
            score: self.read_int(Self::SCORE_KEY)?.unwrap_or(0),
            matches_found: self.read_int(Self::MATCHES_KEY)?.unwrap_or(0),
            total_attempts: self.read_int(Self::ATTEMPTS_KEY)?.unwrap_or(0),
            best_score,
        })
    }

    /// Forgets the saved game. The best score survives.
    pub fn clear_save(&mut self) -> StorageResult<()> {
        let mut batch = WriteBatch::new();
        batch
            .delete(Self::SCORE_KEY)
            .delete(Self::MATCHES_KEY)
            .delete(Self::ATTEMPTS_KEY)
            .delete(Self::LAST_PLAYED_KEY)
            .delete(Self::HAS_SAVE_KEY);
        self.store.commit(batch)?;
        log::debug!("Saved game cleared");
        Ok(())
    }

    pub fn best_score(&self) -> StorageResult<Score> {
        Ok(self.read_int(Self::BEST_SCORE_KEY)?.unwrap_or(0))
    }

    pub fn last_played(&self) -> StorageResult<Option<DateTime<Utc>>> {
        let Some(text) = self.store.get_text(Self::LAST_PLAYED_KEY)? else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(text)
            .map(|time| Some(time.with_timezone(&Utc)))
            .map_err(|_| StorageError::WrongType {
                key: Self::LAST_PLAYED_KEY.to_owned(),
                expected: "an RFC 3339 timestamp",
            })
    }

    fn read_int<T: TryFrom<i64>>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.store.get_int(key)? {
            None => Ok(None),
            Some(raw) => T::try_from(raw).map(Some).map_err(|_| StorageError::WrongType {
                key: key.to_owned(),
                expected: "in range",
            }),
        }
    }
}
