use anyhow::Context;
use memomatch_core::{AnimationTimings, GameConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of the `--config` TOML file.
///
/// ```toml
/// [game]
/// preview_ms = 1500
/// match_reward = 50
///
/// [animations]
/// flip_ms = 200
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub game: GameConfig,
    pub animations: AnimationTimings,
}

impl Settings {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let settings: Self = toml::from_str(content).context("Malformed settings")?;
        settings.game.validate()?;
        Ok(settings)
    }

    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            log::debug!("No settings file given, using defaults");
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read settings from {}", path.display()))?;
        let settings =
            Self::parse(&content).with_context(|| format!("Invalid settings in {}", path.display()))?;
        log::debug!("Settings loaded from {}", path.display());
        Ok(settings)
    }
}
