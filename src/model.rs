use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// End-of-list and end-of-track policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    None,
    One,
    All,
}

impl LoopMode {
    /// Cycles `all -> one -> none -> all`.
    pub fn next(self) -> Self {
        match self {
            Self::All => Self::One,
            Self::One => Self::None,
            Self::None => Self::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "off",
            Self::One => "one",
            Self::All => "all",
        }
    }

    pub fn repeats_track(self) -> bool {
        self == Self::One
    }
}

/// Immutable track descriptor supplied by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub category: String,
    /// Locator handed to the audio backend; a file path for the rodio backend.
    pub source: String,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub play_count: u64,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            category: String::new(),
            source: source.into(),
            duration: None,
            play_count: 0,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }
}

/// Session-level policy replayed onto every new resource and persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub loop_mode: LoopMode,
    #[serde(default)]
    pub shuffle: bool,
}

fn default_volume() -> f32 {
    1.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            muted: false,
            loop_mode: LoopMode::None,
            shuffle: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistedState {
    #[serde(default)]
    pub folders: Vec<PathBuf>,
    #[serde(default)]
    pub settings: Settings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_mode_cycles_all_one_none() {
        assert_eq!(LoopMode::All.next(), LoopMode::One);
        assert_eq!(LoopMode::One.next(), LoopMode::None);
        assert_eq!(LoopMode::None.next(), LoopMode::All);
    }

    #[test]
    fn settings_fill_missing_fields() {
        let settings: Settings = serde_json::from_str(r#"{"muted":true}"#).expect("parse");
        assert!(settings.muted);
        assert_eq!(settings.volume, 1.0);
        assert_eq!(settings.loop_mode, LoopMode::None);
    }

    #[test]
    fn loop_mode_serializes_lowercase() {
        let raw = serde_json::to_string(&LoopMode::All).expect("serialize");
        assert_eq!(raw, "\"all\"");
    }
}
