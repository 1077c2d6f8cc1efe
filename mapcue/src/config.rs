//! Persistent application configuration.
//!
//! Stored as JSON in a platform-appropriate config directory. Every section
//! falls back to its defaults, so files written by older versions keep loading.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use anyhow::{Context, Result};
use rdev::Key;
use serde::{Deserialize, Serialize};

/// On-disk configuration for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Map region, palette, map-open probe and calibration.
    pub map: nav::LocatorConfig,

    /// Retries around a single screen capture.
    pub capture_retry: vision::RetryPolicy,

    /// A monitor grab answers further captures for this long. Keep it below
    /// `auto_turn.settle_ms` so a tick never sees the view from before its turn.
    pub capture_reuse_ms: u64,

    pub auto_turn: nav::AutoTurnConfig,

    pub feedback: nav::FeedbackConfig,

    pub input: InputConfig,

    pub hotkeys: Hotkeys,

    pub pois: poi::PoiSources,

    /// Cue volume, 0.0 mutes the tones (speech text is still logged).
    pub volume: f32,

    pub speech: SpeechConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map: nav::LocatorConfig::default(),
            capture_retry: vision::RetryPolicy::default(),
            capture_reuse_ms: 30,
            auto_turn: nav::AutoTurnConfig::default(),
            feedback: nav::FeedbackConfig::default(),
            input: InputConfig::default(),
            hotkeys: Hotkeys::default(),
            pois: poi::PoiSources::default(),
            volume: 0.6,
            speech: SpeechConfig::default(),
        }
    }
}

/// Relative mouse movement used to turn the in-game camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Mouse counts per degree of camera rotation (depends on in-game sensitivity).
    pub counts_per_degree: f32,

    /// A turn is split into this many sub-moves.
    pub steps: u32,

    /// Pause between sub-moves.
    pub step_delay_ms: u64,

    pub invert_y: bool,

    /// Camera recentering: look down this far (into the floor stop), then
    /// back up by `recenter_back_deg` to level.
    pub recenter_sweep_deg: f32,
    pub recenter_back_deg: f32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            counts_per_degree: 12.0,
            steps: 10,
            step_delay_ms: 5,
            invert_y: false,
            recenter_sweep_deg: 125.0,
            recenter_back_deg: 68.0,
        }
    }
}

/// Spoken announcements through the system speech engine or screen reader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// When off, announcements only go to the log.
    pub enabled: bool,

    /// A new announcement cuts off the one still being spoken.
    pub interrupt: bool,

    /// 0.0..=1.0 of the engine's range.
    pub volume: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interrupt: true,
            volume: 1.0,
        }
    }
}

/// Global hotkeys, by `rdev` key name (e.g. `"F6"`, `"KeyP"`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hotkeys {
    pub get_directions: Key,
    pub toggle_auto_turn: Key,
    pub cancel: Key,
    pub announce_facing: Key,
    pub next_target: Key,
    pub previous_target: Key,
    pub describe_position: Key,
    pub recenter: Key,
}

impl Default for Hotkeys {
    fn default() -> Self {
        Self {
            get_directions: Key::F6,
            toggle_auto_turn: Key::F7,
            cancel: Key::F8,
            announce_facing: Key::F9,
            next_target: Key::F10,
            previous_target: Key::F11,
            describe_position: Key::F12,
            recenter: Key::Home,
        }
    }
}

impl Config {
    /// Path to the config file.
    pub fn path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("config_dir() unavailable")?;
        Ok(base.join("mapcue.json"))
    }

    /// Load configuration from disk, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        match Self::path().and_then(|path| Self::try_load_from(&path)) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!("failed to load config; using defaults: {err:#}");
                Self::default()
            }
        }
    }

    /// Load configuration from `path`; a missing file yields the defaults.
    pub fn try_load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
        let cfg = serde_json::from_str(&json).with_context(|| format!("parse {:?}", path))?;
        Ok(cfg)
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, json).with_context(|| format!("write {:?}", path))?;
        Ok(())
    }
}

/// The live configuration, swapped wholesale on reload.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig(Arc<RwLock<Config>>);

impl SharedConfig {
    pub fn new(config: Config) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Config> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Config {
        self.read().clone()
    }

    /// Replace the whole config; returns whether anything changed.
    pub fn replace(&self, config: Config) -> bool {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        if *guard == config {
            return false;
        }
        *guard = config;
        true
    }
}
