use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

// ── Final (merged) config types ──

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    /// Alias name to expansion, applied to whole trimmed lines.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    /// Default variables by bare name; stored under the `@` prefix.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_job_poll_ms")]
    pub job_poll_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            job_poll_ms: default_job_poll_ms(),
            exec_timeout_secs: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_job_poll_ms() -> u64 {
    20
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    aliases: MapOverlay,
    #[serde(default)]
    defaults: MapOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    log_level: Option<String>,
    job_poll_ms: Option<u64>,
    exec_timeout_secs: Option<u64>,
}

/// A map section in the overlay. Plain `name = "value"` entries are
/// collected into `entries`; `replace` and `remove` are reserved keys.
#[derive(Debug, Deserialize, Default)]
struct MapOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    remove: Vec<String>,
    #[serde(flatten)]
    entries: BTreeMap<String, String>,
}

// ── Merge logic ──

/// Merge a user map into a default map.
/// In replace mode the user map replaces the default entirely; otherwise
/// removals apply first, then user entries add or override.
fn merge_map(base: &mut BTreeMap<String, String>, overlay: MapOverlay) {
    if overlay.replace {
        *base = overlay.entries;
        return;
    }
    for key in &overlay.remove {
        base.remove(key);
    }
    base.extend(overlay.entries);
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge user overlay from ~/.config/replkit/config.toml (if exists)
    pub fn load() -> Self {
        let mut config = Self::default_config();
        if let Some(overlay) = Self::load_overlay() {
            config.apply_overlay(overlay);
        }
        config
    }

    /// Render the merged configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    fn load_overlay() -> Option<ConfigOverlay> {
        let home = std::env::var_os("HOME")?;
        let path = std::path::Path::new(&home).join(".config/replkit/config.toml");
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                eprintln!("replkit: config parse error: {e}");
                None
            }
        }
    }

    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let s = overlay.settings;
        if let Some(v) = s.log_level {
            self.settings.log_level = v;
        }
        if let Some(v) = s.job_poll_ms {
            self.settings.job_poll_ms = v;
        }
        if let Some(v) = s.exec_timeout_secs {
            self.settings.exec_timeout_secs = Some(v);
        }

        merge_map(&mut self.aliases, overlay.aliases);
        merge_map(&mut self.defaults, overlay.defaults);
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}
