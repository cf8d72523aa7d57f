//! Configuration loading

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::term::state::DEFAULT_HISTORY_LIMIT;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Terminal session settings.
///
/// Loaded from a TOML file the host points at, or built in code. Every
/// field has a default, so an empty file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell command and arguments. `None` falls back to `$SHELL`, then
    /// `/bin/bash`.
    pub shell: Option<Vec<String>>,
    /// Visible rows.
    pub rows: u16,
    /// Visible columns.
    pub cols: u16,
    /// Maximum scrollback lines retained before the oldest is dropped.
    pub history_limit: usize,
    /// Render black foreground text as white. For hosts with dark
    /// backgrounds where pure black output would be invisible.
    pub bright_black_fg: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            rows: 24,
            cols: 80,
            history_limit: DEFAULT_HISTORY_LIMIT,
            bright_black_fg: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file at an explicit path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve the shell command to spawn: the configured command if set,
    /// otherwise `$SHELL`, otherwise `/bin/bash`.
    pub fn shell_command(&self) -> Vec<String> {
        if let Some(shell) = &self.shell {
            if !shell.is_empty() {
                return shell.clone();
            }
        }
        match std::env::var("SHELL") {
            Ok(shell) if !shell.is_empty() => vec![shell],
            _ => vec!["/bin/bash".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry() {
        let config = Config::default();
        assert_eq!(config.rows, 24);
        assert_eq!(config.cols, 80);
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
        assert!(!config.bright_black_fg);
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.rows, 24);
        assert!(config.shell.is_none());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config: Config = toml::from_str(
            r#"
            rows = 40
            shell = ["/bin/zsh", "-l"]
            bright_black_fg = true
            "#,
        )
        .unwrap();
        assert_eq!(config.rows, 40);
        assert_eq!(config.cols, 80);
        assert_eq!(
            config.shell.as_deref(),
            Some(&["/bin/zsh".to_string(), "-l".to_string()][..])
        );
        assert!(config.bright_black_fg);
    }

    #[test]
    fn configured_shell_wins_over_environment() {
        let config = Config {
            shell: Some(vec!["/bin/dash".to_string()]),
            ..Config::default()
        };
        assert_eq!(config.shell_command(), vec!["/bin/dash".to_string()]);
    }

    #[test]
    fn empty_shell_list_falls_back() {
        let config = Config {
            shell: Some(Vec::new()),
            ..Config::default()
        };
        let command = config.shell_command();
        assert!(!command.is_empty());
    }
}
