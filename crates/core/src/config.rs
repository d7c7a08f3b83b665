/// Configuration module for the reboot switcher.
///
/// This module provides functionality for:
/// - Loading the user's `config.json` with fallback to defaults
/// - Locating the per-user configuration directory
/// - Resolving the trusted command paths once at startup
///
/// The configuration lives in the platform-specific config directory
/// (`~/.config/asahi-reboot-switcher/` on Linux). It is never written by the
/// tray itself.
use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the volume-management helper
pub const BLESS_COMMAND: &str = "asahi-bless";

/// Application configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Privilege elevation helper
    pub pkexec_path: PathBuf,
    /// Directories trusted to contain `asahi-bless`, in lookup order
    pub bless_search_dirs: Vec<PathBuf>,
    /// Substring identifying the macOS volume by name
    pub macos_marker: String,
    /// Tray icon PNG (None = built-in fallback)
    pub icon_path: Option<PathBuf>,
    /// How often the tray thread drains session updates
    pub update_poll_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            pkexec_path: PathBuf::from("/usr/bin/pkexec"),
            bless_search_dirs: vec![
                PathBuf::from("/usr/local/bin"),
                PathBuf::from("/usr/bin"),
            ],
            macos_marker: "Macintosh".to_string(),
            icon_path: Some(PathBuf::from(
                "/usr/share/icons/hicolor/256x256/apps/asahi-reboot-switcher.png",
            )),
            update_poll_ms: 100,
        }
    }
}

/// Get the application's config directory
/// Returns ~/.config/asahi-reboot-switcher/ on Linux
pub fn get_config_directory() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "asahi-reboot-switcher")
        .ok_or_else(|| anyhow!("Failed to determine user config directory"))?;

    Ok(project_dirs.config_dir().to_path_buf())
}

/// Load application configuration from config.json
/// Returns default config if the file doesn't exist or on error
pub fn load_config() -> AppConfig {
    let Ok(config_dir) = get_config_directory() else {
        return AppConfig::default();
    };

    load_config_from(&config_dir.join("config.json"))
}

/// Load configuration from an explicit path
pub fn load_config_from(path: &Path) -> AppConfig {
    if !path.exists() {
        return AppConfig::default();
    }

    let Ok(contents) = fs::read_to_string(path) else {
        tracing::warn!("Failed to read {:?}, using defaults", path);
        return AppConfig::default();
    };

    match serde_json::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Invalid config {:?}: {}, using defaults", path, e);
            AppConfig::default()
        }
    }
}

/// Trusted executable paths, resolved once at startup and handed to the
/// volume directory and the reboot orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPaths {
    pub pkexec: PathBuf,
    pub bless: PathBuf,
    /// This binary; re-entered under pkexec to forward arguments to asahi-bless
    pub self_exe: PathBuf,
}

impl CommandPaths {
    /// Resolve paths from configuration and the running executable
    pub fn resolve(config: &AppConfig) -> Result<Self> {
        let self_exe = std::env::current_exe()
            .map_err(|e| anyhow!("Failed to locate own executable: {}", e))?;

        Ok(Self::with_self_exe(config, self_exe))
    }

    /// Resolve with an explicit own-executable path
    pub fn with_self_exe(config: &AppConfig, self_exe: PathBuf) -> Self {
        Self {
            pkexec: config.pkexec_path.clone(),
            bless: find_bless(&config.bless_search_dirs),
            self_exe,
        }
    }
}

/// First existing `asahi-bless` under the search dirs; otherwise the first
/// candidate so the failure surfaces when the command is launched
fn find_bless(search_dirs: &[PathBuf]) -> PathBuf {
    let candidates: Vec<PathBuf> = search_dirs.iter().map(|d| d.join(BLESS_COMMAND)).collect();

    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        return found.clone();
    }

    tracing::warn!("{} not found in {:?}", BLESS_COMMAND, search_dirs);
    candidates
        .into_iter()
        .next()
        .unwrap_or_else(|| PathBuf::from(BLESS_COMMAND))
}
