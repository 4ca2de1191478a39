use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    CardFlip,
    CardMatch,
    CardMismatch,
    GameOver,
}

impl GameEvent {
    /// Name of the sound the audio layer plays for this event
    pub const fn sound_name(self) -> &'static str {
        use GameEvent::*;
        match self {
            CardFlip => "CardFlip",
            CardMatch => "CardMatch",
            CardMismatch => "CardMismatch",
            GameOver => "GameOver",
        }
    }
}

/// Fire-and-forget receiver of game events.
pub trait AudioSink {
    fn play(&mut self, event: GameEvent);
}

impl<F: FnMut(GameEvent)> AudioSink for F {
    fn play(&mut self, event: GameEvent) {
        self(event)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, event: GameEvent) {
        log::trace!("sound {} (muted)", event.sound_name());
    }
}
