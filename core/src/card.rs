use serde::{Deserialize, Serialize};

use crate::*;

/// Valid transitions:
/// - Hidden -> Revealed
/// - Revealed -> Hidden
/// - Revealed -> Matched
/// - Matched -> Removed
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardState {
    Hidden,
    Revealed,
    Matched,
    Removed,
}

impl CardState {
    /// Matched and removed cards never come back into play
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Matched | Self::Removed)
    }
}

impl Default for CardState {
    fn default() -> Self {
        Self::Hidden
    }
}

/// Outcome of asking a card to change state
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TransitionOutcome {
    NoChange,
    Changed,
}

impl TransitionOutcome {
    pub const fn has_update(self) -> bool {
        match self {
            Self::NoChange => false,
            Self::Changed => true,
        }
    }
}

/// Logical state of one dealt card.
///
/// `busy` mirrors the presentation layer: it is raised when a visual transition starts and lowered by
/// [`Card::finish_transition`] once that transition reports completion. While busy the card neither flips nor
/// accepts clicks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    shape: Option<ShapeId>,
    state: CardState,
    busy: bool,
    interactable: bool,
    hide_when_idle: bool,
}

impl Card {
    pub fn new(shape: Option<ShapeId>) -> Self {
        Self {
            shape,
            state: CardState::Hidden,
            busy: false,
            interactable: false,
            hide_when_idle: false,
        }
    }

    pub fn shape_id(&self) -> Option<ShapeId> {
        self.shape
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    pub fn is_revealed(&self) -> bool {
        self.state == CardState::Revealed
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_removed(&self) -> bool {
        self.state == CardState::Removed
    }

    /// Whether a click on this card should reach the arbiter at all
    pub fn accepts_click(&self) -> bool {
        self.interactable && !self.busy && !self.is_removed()
    }

    /// Show the face during the preview window, the card turns itself face down when the preview finishes.
    pub(crate) fn begin_preview(&mut self) -> TransitionOutcome {
        if self.busy || self.state.is_final() {
            return TransitionOutcome::NoChange;
        }
        self.state = CardState::Revealed;
        self.interactable = false;
        self.busy = true;
        self.hide_when_idle = true;
        TransitionOutcome::Changed
    }

    pub fn reveal(&mut self) -> TransitionOutcome {
        if self.busy || self.state != CardState::Hidden {
            return TransitionOutcome::NoChange;
        }
        self.state = CardState::Revealed;
        self.interactable = false;
        self.busy = true;
        TransitionOutcome::Changed
    }

    pub fn hide(&mut self) -> TransitionOutcome {
        if self.busy || self.state != CardState::Revealed {
            return TransitionOutcome::NoChange;
        }
        self.state = CardState::Hidden;
        self.interactable = false;
        self.busy = true;
        self.hide_when_idle = false;
        TransitionOutcome::Changed
    }

    /// Hide now, or as soon as the running transition completes.
    ///
    /// Returns [`TransitionOutcome::Changed`] only when the card turned face down right away.
    pub fn hide_or_defer(&mut self) -> TransitionOutcome {
        if self.busy && self.state == CardState::Revealed {
            self.hide_when_idle = true;
            return TransitionOutcome::NoChange;
        }
        self.hide()
    }

    pub fn mark_matched(&mut self) -> TransitionOutcome {
        if self.state != CardState::Revealed {
            return TransitionOutcome::NoChange;
        }
        self.state = CardState::Matched;
        self.interactable = false;
        self.hide_when_idle = false;
        TransitionOutcome::Changed
    }

    pub fn remove(&mut self) -> TransitionOutcome {
        if self.is_removed() {
            return TransitionOutcome::NoChange;
        }
        self.state = CardState::Removed;
        self.interactable = false;
        self.hide_when_idle = false;
        TransitionOutcome::Changed
    }

    /// Marks a visual transition as started without a state change (match and destroy animations).
    pub(crate) fn set_busy(&mut self) {
        self.busy = true;
    }

    /// Completion signal of the running transition. Returns whether a deferred hide is now due.
    pub(crate) fn finish_transition(&mut self) -> bool {
        if !self.busy {
            return false;
        }
        self.busy = false;
        if self.state.is_final() {
            return false;
        }
        self.interactable = true;
        self.hide_when_idle && self.state == CardState::Revealed
    }
}
