use crate::model::PersistedState;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::PathBuf;

const APP_DIR: &str = "lull";
const STATE_FILE: &str = "settings.json";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("LULL_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn state_path() -> Result<PathBuf> {
    Ok(config_root()?.join(STATE_FILE))
}

pub fn load_state() -> Result<PersistedState> {
    let path = state_path()?;
    if !path.exists() {
        return Ok(PersistedState::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let state: PersistedState = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(state)
}

pub fn save_state(state: &PersistedState) -> Result<()> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    let path = root.join(STATE_FILE);
    let json = serde_json::to_string_pretty(state)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LoopMode, Settings};
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().expect("tempdir");
        unsafe {
            env::set_var("LULL_CONFIG_DIR", dir.path().to_string_lossy().as_ref());
        }

        let state = PersistedState {
            folders: vec![PathBuf::from("/music")],
            settings: Settings {
                volume: 0.6,
                muted: true,
                loop_mode: LoopMode::All,
                shuffle: true,
            },
        };
        save_state(&state).expect("save");
        let loaded = load_state().expect("load");
        assert_eq!(loaded.settings, state.settings);
        assert_eq!(loaded.folders, state.folders);

        fs::write(state_path().expect("path"), "{ nope").expect("corrupt");
        assert!(load_state().is_err());
    }
}
