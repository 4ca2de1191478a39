use serde::{Deserialize, Serialize};

use crate::*;

/// Read-only copy of the score counters, handed to displays.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub total_attempts: Count,
    pub matches_found: Count,
    pub current_score: Score,
}

type Listener = Box<dyn FnMut(ScoreSnapshot)>;

/// Attempt, match and score counters.
///
/// The counters only change through [`ScoreTracker::process_match_attempt`], [`ScoreTracker::reset_score`] and
/// [`ScoreTracker::restore_state`]; each of them notifies every subscriber with a fresh snapshot.
pub struct ScoreTracker {
    match_reward: Score,
    mismatch_penalty: Score,
    snapshot: ScoreSnapshot,
    listeners: Vec<Listener>,
}

impl core::fmt::Debug for ScoreTracker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScoreTracker")
            .field("match_reward", &self.match_reward)
            .field("mismatch_penalty", &self.mismatch_penalty)
            .field("snapshot", &self.snapshot)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ScoreTracker {
    pub fn new(match_reward: Score, mismatch_penalty: Score) -> Self {
        Self {
            match_reward,
            mismatch_penalty,
            snapshot: ScoreSnapshot::default(),
            listeners: Vec::new(),
        }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(config.match_reward, config.mismatch_penalty)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(ScoreSnapshot) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn snapshot(&self) -> ScoreSnapshot {
        self.snapshot
    }

    pub fn total_attempts(&self) -> Count {
        self.snapshot.total_attempts
    }

    pub fn matches_found(&self) -> Count {
        self.snapshot.matches_found
    }

    pub fn current_score(&self) -> Score {
        self.snapshot.current_score
    }

    pub fn process_match_attempt(&mut self, is_match: bool) {
        let snapshot = &mut self.snapshot;
        snapshot.total_attempts = snapshot.total_attempts.saturating_add(1);
        if is_match {
            snapshot.matches_found = snapshot.matches_found.saturating_add(1);
            snapshot.current_score = snapshot.current_score.saturating_add(self.match_reward);
        } else {
            snapshot.current_score = snapshot.current_score.saturating_add(self.mismatch_penalty);
        }
        log::debug!(
            "Match attempt processed, is_match: {}, attempts: {}, matches: {}, score: {}",
            is_match,
            snapshot.total_attempts,
            snapshot.matches_found,
            snapshot.current_score
        );
        self.notify();
    }

    pub fn reset_score(&mut self) {
        self.snapshot = ScoreSnapshot::default();
        log::debug!("Score reset");
        self.notify();
    }

    /// Overwrites score and attempts from a saved game; the match count is the state machine's to reconcile.
    pub fn restore_state(&mut self, score: Score, attempts: Count) {
        self.snapshot.current_score = score;
        self.snapshot.total_attempts = attempts;
        log::debug!("Score restored, score: {}, attempts: {}", score, attempts);
        self.notify();
    }

    /// Match count carried over from a saved game, announced by the next notification.
    pub(crate) fn restore_matches(&mut self, matches: Count) {
        self.snapshot.matches_found = matches;
    }

    fn notify(&mut self) {
        if self.listeners.is_empty() {
            log::trace!("No listeners for score updates");
            return;
        }
        let snapshot = self.snapshot;
        for listener in &mut self.listeners {
            listener(snapshot);
        }
    }
}
