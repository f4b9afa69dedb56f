//! Configuration loading and management
//!
//! Handles parsing of `listkeep.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::sort::{SortDirection, SortField, SortSpec};

pub const CONFIG_FILE_NAME: &str = "listkeep.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transient visual-state delays
    #[serde(default)]
    pub transitions: TransitionConfig,

    /// Completion reward settings
    #[serde(default)]
    pub rewards: RewardConfig,

    /// Initial view settings
    #[serde(default)]
    pub view: ViewConfig,
}

/// Delays (milliseconds) before a transient state expires
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    #[serde(default = "default_newly_created_ms")]
    pub newly_created_ms: u64,

    #[serde(default = "default_disappear_ms")]
    pub disappear_ms: u64,

    #[serde(default = "default_reappear_ms")]
    pub reappear_ms: u64,

    #[serde(default = "default_moved_ms")]
    pub moved_ms: u64,

    /// How long a reward gain stays visible
    #[serde(default = "default_recent_gain_ms")]
    pub recent_gain_ms: u64,
}

fn default_newly_created_ms() -> u64 {
    500
}

fn default_disappear_ms() -> u64 {
    500
}

fn default_reappear_ms() -> u64 {
    1500
}

fn default_moved_ms() -> u64 {
    1400
}

fn default_recent_gain_ms() -> u64 {
    4000
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            newly_created_ms: default_newly_created_ms(),
            disappear_ms: default_disappear_ms(),
            reappear_ms: default_reappear_ms(),
            moved_ms: default_moved_ms(),
            recent_gain_ms: default_recent_gain_ms(),
        }
    }
}

impl TransitionConfig {
    pub fn newly_created(&self) -> Duration {
        Duration::from_millis(self.newly_created_ms)
    }

    pub fn disappear(&self) -> Duration {
        Duration::from_millis(self.disappear_ms)
    }

    pub fn reappear(&self) -> Duration {
        Duration::from_millis(self.reappear_ms)
    }

    pub fn moved(&self) -> Duration {
        Duration::from_millis(self.moved_ms)
    }

    pub fn recent_gain(&self) -> Duration {
        Duration::from_millis(self.recent_gain_ms)
    }
}

/// Reward amount range and level curve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Smallest amount awarded per completed task (inclusive)
    #[serde(default = "default_min_amount")]
    pub min_amount: u32,

    /// Largest amount awarded per completed task (inclusive)
    #[serde(default = "default_max_amount")]
    pub max_amount: u32,

    /// Points needed to leave level 1
    #[serde(default = "default_level_base")]
    pub level_base: u64,

    /// Per-level multiplier applied to the base threshold
    #[serde(default = "default_level_growth")]
    pub level_growth: f64,
}

fn default_min_amount() -> u32 {
    10
}

fn default_max_amount() -> u32 {
    25
}

fn default_level_base() -> u64 {
    100
}

fn default_level_growth() -> f64 {
    1.25
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            min_amount: default_min_amount(),
            max_amount: default_max_amount(),
            level_base: default_level_base(),
            level_growth: default_level_growth(),
        }
    }
}

/// Initial view settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Keep completed tasks in the visible list
    #[serde(default)]
    pub show_completed: bool,

    #[serde(default)]
    pub sort_field: SortField,

    #[serde(default)]
    pub sort_direction: SortDirection,
}

impl ViewConfig {
    pub fn sort(&self) -> SortSpec {
        SortSpec {
            field: self.sort_field,
            direction: self.sort_direction,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory, or return defaults
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        self.rewards.validate()
    }
}

impl RewardConfig {
    pub(crate) fn validate(&self) -> crate::error::Result<()> {
        if self.min_amount > self.max_amount {
            return Err(crate::error::Error::InvalidConfig(format!(
                "rewards.min_amount ({}) exceeds rewards.max_amount ({})",
                self.min_amount, self.max_amount
            )));
        }
        if self.level_base == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "rewards.level_base must be positive".to_string(),
            ));
        }
        if !self.level_growth.is_finite() || self.level_growth < 1.0 {
            return Err(crate::error::Error::InvalidConfig(
                "rewards.level_growth must be a finite number >= 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_match_documented_delays() {
        let cfg = Config::default();
        assert_eq!(cfg.transitions.newly_created(), Duration::from_millis(500));
        assert_eq!(cfg.transitions.disappear(), Duration::from_millis(500));
        assert_eq!(cfg.transitions.reappear(), Duration::from_millis(1500));
        assert_eq!(cfg.transitions.moved(), Duration::from_millis(1400));
        assert_eq!(cfg.transitions.recent_gain(), Duration::from_millis(4000));
        assert!(!cfg.view.show_completed);
        assert_eq!(cfg.view.sort(), SortSpec::default());
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        let content = r#"
[transitions]
disappear_ms = 250

[rewards]
min_amount = 5
max_amount = 5
level_growth = 2.0

[view]
show_completed = true
sort_field = "priority"
sort_direction = "desc"
"#;
        fs::write(&path, content).expect("write config");

        let cfg = Config::load(&path).expect("load");
        assert_eq!(cfg.transitions.disappear_ms, 250);
        assert_eq!(cfg.transitions.reappear_ms, 1500);
        assert_eq!(cfg.rewards.min_amount, 5);
        assert_eq!(cfg.rewards.level_base, 100);
        assert!(cfg.view.show_completed);
        assert_eq!(cfg.view.sort_field, SortField::Priority);
        assert_eq!(cfg.view.sort_direction, SortDirection::Desc);
    }

    #[test]
    fn load_rejects_inverted_reward_range() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[rewards]\nmin_amount = 30\nmax_amount = 20\n").expect("write config");

        let err = Config::load(&path).expect_err("invalid range");
        assert!(err.to_string().contains("min_amount"));
    }

    #[test]
    fn load_rejects_shrinking_levels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[rewards]\nlevel_growth = 0.5\n").expect("write config");

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn load_from_dir_defaults_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_dir(dir.path());
        assert_eq!(cfg.rewards.max_amount, 25);
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut cfg = Config::default();
        cfg.view.show_completed = true;
        cfg.save(&path).expect("save");

        let loaded = Config::load(&path).expect("reload");
        assert!(loaded.view.show_completed);
    }
}
