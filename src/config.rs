//! User-level configuration.
//!
//! Flowspec has two independent configuration surfaces that never merge:
//!
//! - **User config** (`~/.config/flowspec/config.toml`) - personal
//!   preferences, not checked into git: default invoking role, preferred
//!   agent list for `flow init`, and a telemetry opt-in override.
//! - **Workflow document** (`<project>/flowspec_workflow.yml`) - the
//!   project-wide state machine definition, checked into git. See
//!   [`crate::workflow`].
//!
//! User config controls "how flowspec behaves for me"; the workflow
//! document controls "what states and transitions this project uses".

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Override for the user config path, set by `--config` on the CLI.
/// Configuration is otherwise threaded explicitly rather than read from
/// globals; this is the one process-wide override the CLI entry point is
/// allowed to set before any component runs.
static CONFIG_PATH_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Sets the user config path override. Must be called at most once, before
/// any call to [`get_config_path`].
pub fn set_config_path(path: PathBuf) {
    let _ = CONFIG_PATH_OVERRIDE.set(path);
}

/// Resolves the user config file path: the `--config` override if set,
/// otherwise `$XDG_CONFIG_HOME/flowspec/config.toml` (via `etcetera`'s
/// XDG resolution, falling back to `dirs` on platforms without XDG).
pub fn get_config_path() -> PathBuf {
    if let Some(p) = CONFIG_PATH_OVERRIDE.get() {
        return p.clone();
    }
    config_dir().join("config.toml")
}

fn config_dir() -> PathBuf {
    use etcetera::{BaseStrategy, base_strategy::Xdg};
    Xdg::new()
        .map(|s| s.config_dir().join("flowspec"))
        .unwrap_or_else(|_| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("flowspec")
        })
}

/// `$FLOWSPEC_TELEMETRY_ENABLED` override, resolved once and threaded
/// through rather than read ad hoc from several call sites.
pub fn telemetry_env_override() -> Option<bool> {
    match std::env::var("FLOWSPEC_TELEMETRY_ENABLED") {
        Ok(v) if v.eq_ignore_ascii_case("true") => Some(true),
        Ok(v) if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Personal preferences for `flow`, stored at [`get_config_path`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserConfig {
    /// Role namespace used when a command invocation doesn't specify one,
    /// e.g. "dev".
    pub default_role: Option<String>,
    /// Agent keys materialized by `flow init` when `--agent` isn't given.
    pub preferred_agents: Vec<String>,
    /// Local override for whether telemetry lifecycle events are emitted;
    /// `None` defers to the workflow document's setting.
    pub telemetry_enabled: Option<bool>,
    /// Provider token used for archive downloads, if not supplied via
    /// `$GITHUB_TOKEN`.
    pub github_token: Option<String>,
}

impl Default for UserConfig {
    fn default() -> Self {
        UserConfig {
            default_role: None,
            preferred_agents: Vec::new(),
            telemetry_enabled: None,
            github_token: None,
        }
    }
}

impl UserConfig {
    /// Loads the user config, returning the default when the file doesn't
    /// exist. A malformed file is a hard error - user config is optional in
    /// *existence*, not in *validity*.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(UserConfig::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: UserConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Effective telemetry setting, applying precedence: `$FLOWSPEC_TELEMETRY_ENABLED`
    /// env var > user config > workflow document default.
    pub fn effective_telemetry(&self, document_default: bool) -> bool {
        telemetry_env_override()
            .or(self.telemetry_enabled)
            .unwrap_or(document_default)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string_pretty(self)?;
        crate::backlog::atomic_write(path, serialized.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_preferences() {
        let config = UserConfig::default();
        assert!(config.default_role.is_none());
        assert!(config.preferred_agents.is_empty());
        assert!(config.telemetry_enabled.is_none());
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = UserConfig::load(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, UserConfig::default());
    }

    #[test]
    fn telemetry_precedence_env_over_config_over_document() {
        let mut config = UserConfig::default();
        assert!(!config.effective_telemetry(false));
        assert!(config.effective_telemetry(true));

        config.telemetry_enabled = Some(true);
        assert!(config.effective_telemetry(false));

        config.telemetry_enabled = Some(false);
        assert!(!config.effective_telemetry(true));
    }

    #[test]
    fn roundtrip_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = UserConfig::default();
        config.default_role = Some("dev".to_string());
        config.preferred_agents = vec!["claude".to_string(), "gemini".to_string()];
        config.save(&path).unwrap();

        let loaded = UserConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
