use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::{ApprovalConfig, GateConfig};

/// Engine configuration: sessions root plus per-stage approval gates.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sessions_root: PathBuf,
    pub approvals: ApprovalConfig,
}

/// On-disk settings file shape (YAML).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    /// Root directory for session storage
    #[serde(default)]
    pub sessions_root: Option<PathBuf>,
    /// Gate settings keyed by "<phase>.<stage>", e.g. "generate.response"
    #[serde(default)]
    pub approvals: HashMap<String, GateConfig>,
}

fn default_sessions_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gen-forge")
        .join("sessions")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sessions_root: default_sessions_root(),
            approvals: ApprovalConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: SettingsFile = serde_yaml::from_str(&content)?;
        Ok(Self {
            sessions_root: settings.sessions_root.unwrap_or_else(default_sessions_root),
            approvals: ApprovalConfig::from_keyed_map(&settings.approvals)?,
        })
    }

    /// Load configuration, falling back to defaults if the file is absent.
    pub fn load_or_default(path: Option<&PathBuf>) -> anyhow::Result<Self> {
        match path {
            Some(p) if p.exists() => Self::from_file(p),
            _ => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// `AIWF_SESSIONS_ROOT` overrides the settings-file value but is
    /// itself overridden by CLI arguments.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("AIWF_SESSIONS_ROOT")
            && !val.is_empty()
        {
            self.sessions_root = PathBuf::from(val);
        }
        self
    }

    /// Load configuration with environment overrides applied.
    ///
    /// Priority: CLI args (applied by the caller) > env vars > config file
    /// > defaults.
    pub fn load_with_env(path: Option<&PathBuf>) -> anyhow::Result<Self> {
        Self::load_or_default(path).map(|c| c.apply_env_overrides())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WorkflowPhase, WorkflowStage};
    use std::io::Write;

    #[test]
    fn test_defaults_when_no_file() {
        let config = EngineConfig::load_or_default(None).unwrap();
        assert!(config.sessions_root.ends_with("sessions"));
        assert_eq!(
            config
                .approvals
                .get(WorkflowPhase::Plan, WorkflowStage::Prompt)
                .approver,
            "skip"
        );
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "sessions_root: /tmp/forge-sessions\napprovals:\n  generate.response:\n    approver: manual\n    max_retries: 1\n    allow_rewrite: true\n"
        )
        .unwrap();

        let config = EngineConfig::from_file(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.sessions_root, PathBuf::from("/tmp/forge-sessions"));
        let gate = config
            .approvals
            .get(WorkflowPhase::Generate, WorkflowStage::Response);
        assert_eq!(gate.approver, "manual");
        assert_eq!(gate.max_retries, 1);
        assert!(gate.allow_rewrite);
    }

    #[test]
    fn test_bad_approval_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "approvals:\n  ship.response:\n    approver: skip\n").unwrap();
        assert!(EngineConfig::from_file(&file.path().to_path_buf()).is_err());
    }
}
