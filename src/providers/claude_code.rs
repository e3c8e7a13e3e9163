//! Subprocess provider driving the Claude Code CLI in print mode.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{FsAbility, GenerateRequest, ProviderMetadata, ResponseProvider};
use crate::errors::{EngineError, Result};
use crate::models::ProviderResult;

const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 600;

/// Runs `claude -p` as a child process, feeding the prompt on stdin and
/// treating stdout as the response text.
pub struct ClaudeCodeProvider {
    binary: String,
    model: Option<String>,
}

impl ClaudeCodeProvider {
    pub fn new(binary: impl Into<String>, model: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            model,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-p").arg("--output-format").arg("text");
        if let Some(model) = &self.model {
            cmd.arg("--model").arg(model);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Default for ClaudeCodeProvider {
    fn default() -> Self {
        Self::new("claude", None)
    }
}

#[async_trait]
impl ResponseProvider for ClaudeCodeProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "claude-code".to_string(),
            description: "Claude Code CLI in non-interactive print mode".to_string(),
            connection_timeout: Some(30),
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT_SECS),
            fs_ability: FsAbility::LocalWrite,
            supports_system_prompt: true,
        }
    }

    async fn validate(&self) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map_err(|e| EngineError::ProviderValidation {
                key: "claude-code".to_string(),
                message: format!("cannot run '{}': {e}", self.binary),
            })?;
        if !output.status.success() {
            return Err(EngineError::ProviderValidation {
                key: "claude-code".to_string(),
                message: format!("'{} --version' exited with {}", self.binary, output.status),
            });
        }
        Ok(())
    }

    async fn generate(
        &self,
        prompt: &str,
        request: &GenerateRequest,
    ) -> Result<Option<ProviderResult>> {
        let mut cmd = self.command();
        if let Some(system_prompt) = &request.system_prompt {
            cmd.arg("--append-system-prompt").arg(system_prompt);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::Provider(format!("failed to spawn '{}': {e}", self.binary)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| EngineError::Provider(format!("failed to write prompt: {e}")))?;
            drop(stdin);
        }

        let timeout_secs = request
            .response_timeout
            .unwrap_or(DEFAULT_RESPONSE_TIMEOUT_SECS);
        debug!(timeout_secs, "waiting for claude-code response");

        let output = if timeout_secs == 0 {
            child.wait_with_output().await
        } else {
            match tokio::time::timeout(
                Duration::from_secs(timeout_secs),
                child.wait_with_output(),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => return Err(EngineError::Timeout(timeout_secs)),
            }
        }
        .map_err(|e| EngineError::Provider(format!("failed to read output: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Provider(format!(
                "claude-code exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        Ok(Some(ProviderResult::from_response(stdout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_validate_fails_for_missing_binary() {
        let provider = ClaudeCodeProvider::new("definitely-not-a-real-binary", None);
        assert!(matches!(
            provider.validate().await,
            Err(EngineError::ProviderValidation { .. })
        ));
    }

    #[test]
    fn test_metadata_declares_write_ability() {
        let provider = ClaudeCodeProvider::default();
        let metadata = provider.metadata();
        assert_eq!(metadata.name, "claude-code");
        assert_eq!(metadata.fs_ability, FsAbility::LocalWrite);
        assert!(metadata.supports_system_prompt);
    }
}
