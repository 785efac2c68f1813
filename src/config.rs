use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Host-side configuration of the script bridge: the conventional symbol
/// names scripts rely on, the fallback spawn used when world init is
/// bypassed, and profiler reporting.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptConfig {
    /// Instance symbol of the player character.
    #[serde(default = "ScriptConfig::default_player_instance")]
    pub player_instance: String,
    /// Symbol rebound to the player once the player entity exists.
    #[serde(default = "ScriptConfig::default_hero_symbol")]
    pub hero_symbol: String,
    /// Symbol bound to the active NPC before routine dispatch.
    #[serde(default = "ScriptConfig::default_self_symbol")]
    pub self_symbol: String,
    /// Skip the startup_*/init_* invocations and spawn the fallback NPC
    /// instead.
    #[serde(default)]
    pub fallback_spawn: bool,
    #[serde(default = "ScriptConfig::default_fallback_npc")]
    pub fallback_npc: String,
    #[serde(default = "ScriptConfig::default_fallback_waypoint")]
    pub fallback_waypoint: String,
    #[serde(default = "ScriptConfig::default_profile_top_n")]
    pub profile_top_n: usize,
}

impl ScriptConfig {
    fn default_player_instance() -> String {
        "PC_HERO".to_string()
    }

    fn default_hero_symbol() -> String {
        "HERO".to_string()
    }

    fn default_self_symbol() -> String {
        "SELF".to_string()
    }

    fn default_fallback_npc() -> String {
        "PC_THIEF".to_string()
    }

    fn default_fallback_waypoint() -> String {
        "WP_INTRO_FALL3".to_string()
    }

    const fn default_profile_top_n() -> usize {
        5
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!("config load error: {err:?}; falling back to defaults");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ScriptConfigOverrides) {
        if let Some(fallback_spawn) = overrides.fallback_spawn {
            self.fallback_spawn = fallback_spawn;
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            player_instance: Self::default_player_instance(),
            hero_symbol: Self::default_hero_symbol(),
            self_symbol: Self::default_self_symbol(),
            fallback_spawn: false,
            fallback_npc: Self::default_fallback_npc(),
            fallback_waypoint: Self::default_fallback_waypoint(),
            profile_top_n: Self::default_profile_top_n(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptConfigOverrides {
    pub fallback_spawn: Option<bool>,
}
