//! Persisted settings, loaded from config.json next to the executable.
//!
//! Missing keys are backfilled from defaults so old config files keep
//! working after upgrades. The GitHub token is the only required secret;
//! first-run prompting lives in main.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_gist_id() -> String {
    "a67e5de3271d6d0716b276dc6a8391cb".to_string()
}

fn default_window_title() -> String {
    "메인".to_string()
}

fn default_delivery_tab_id() -> String {
    "198354".to_string()
}

fn default_poll_interval_sec() -> u64 {
    30
}

fn default_tesseract_path() -> String {
    r"C:\Program Files\Tesseract-OCR\tesseract.exe".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Personal access token with the gist scope. Prompted on first run.
    #[serde(default)]
    pub github_token: String,
    /// Gist holding order_status.json, polled by the phone app.
    #[serde(default = "default_gist_id")]
    pub gist_id: String,
    /// Substring of the POS main window title.
    #[serde(default = "default_window_title")]
    pub window_title: String,
    /// Automation id of the delivery tab inside the POS window.
    #[serde(default = "default_delivery_tab_id")]
    pub delivery_tab_id: String,
    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval_sec")]
    pub poll_interval_sec: u64,
    /// Path to the Tesseract executable.
    #[serde(default = "default_tesseract_path")]
    pub tesseract_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_token: String::new(),
            gist_id: default_gist_id(),
            window_title: default_window_title(),
            delivery_tab_id: default_delivery_tab_id(),
            poll_interval_sec: default_poll_interval_sec(),
            tesseract_path: default_tesseract_path(),
        }
    }
}

impl Config {
    /// Loads the config file if it exists. `Ok(None)` means first run.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(config))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_backfilled_from_defaults() {
        let config: Config = serde_json::from_str(r#"{"github_token": "tok"}"#).unwrap();
        assert_eq!(config.github_token, "tok");
        assert_eq!(config.window_title, "메인");
        assert_eq!(config.delivery_tab_id, "198354");
        assert_eq!(config.poll_interval_sec, 30);
        assert!(config.tesseract_path.ends_with("tesseract.exe"));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.github_token = "tok".to_string();
        config.poll_interval_sec = 10;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap().unwrap();
        assert_eq!(loaded.github_token, "tok");
        assert_eq!(loaded.poll_interval_sec, 10);
        assert_eq!(loaded.gist_id, config.gist_id);
    }

    #[test]
    fn test_load_missing_file_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(&dir.path().join("config.json")).unwrap().is_none());
    }
}
