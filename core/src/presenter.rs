use serde::{Deserialize, Serialize};

use crate::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Animation {
    /// Face shown during the preview window, then turned down
    Preview,
    FlipToFront,
    FlipToBack,
    Match,
    Destroy,
}

/// Visual side of the cards.
///
/// The engine asks for an animation and gets back how long it runs; it then schedules the completion itself, so a
/// presenter never has to call back into the engine.
pub trait Presenter {
    fn play(&mut self, card: CardId, animation: Animation) -> Millis;

    /// The card is gone for good, release whatever displays it.
    fn destroy(&mut self, _card: CardId) {}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationTimings {
    pub flip_ms: Millis,
    pub match_ms: Millis,
    pub destroy_ms: Millis,
    pub preview_ms: Millis,
}

impl Default for AnimationTimings {
    fn default() -> Self {
        Self {
            flip_ms: 300,
            match_ms: 400,
            destroy_ms: 300,
            preview_ms: 600,
        }
    }
}

impl AnimationTimings {
    pub const fn duration(&self, animation: Animation) -> Millis {
        use Animation::*;
        match animation {
            Preview => self.preview_ms,
            FlipToFront | FlipToBack => self.flip_ms,
            Match => self.match_ms,
            Destroy => self.destroy_ms,
        }
    }
}

/// Presenter without visuals whose animations take the configured time.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TimedPresenter {
    timings: AnimationTimings,
}

impl TimedPresenter {
    pub fn new(timings: AnimationTimings) -> Self {
        Self { timings }
    }
}

impl Presenter for TimedPresenter {
    fn play(&mut self, card: CardId, animation: Animation) -> Millis {
        log::trace!("card {} animation {:?}", card, animation);
        self.timings.duration(animation)
    }
}

/// Presenter for hosts without visuals: every animation completes immediately.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn play(&mut self, _card: CardId, _animation: Animation) -> Millis {
        0
    }
}
