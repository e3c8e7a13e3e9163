//! Subprocess provider driving the Gemini CLI in non-interactive mode.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{FsAbility, GenerateRequest, ProviderMetadata, ResponseProvider};
use crate::errors::{EngineError, Result};
use crate::models::ProviderResult;

const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 300;

/// Runs `gemini -p` as a child process. The prompt goes to stdin and
/// stdout becomes the response text; the CLI has no filesystem access
/// here, so file content always flows back through the engine.
pub struct GeminiCliProvider {
    binary: String,
    model: Option<String>,
}

impl GeminiCliProvider {
    pub fn new(binary: impl Into<String>, model: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            model,
        }
    }
}

impl Default for GeminiCliProvider {
    fn default() -> Self {
        Self::new("gemini", None)
    }
}

#[async_trait]
impl ResponseProvider for GeminiCliProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "gemini-cli".to_string(),
            description: "Gemini CLI in non-interactive mode".to_string(),
            connection_timeout: Some(15),
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT_SECS),
            fs_ability: FsAbility::None,
            supports_system_prompt: false,
        }
    }

    async fn validate(&self) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map_err(|e| EngineError::ProviderValidation {
                key: "gemini-cli".to_string(),
                message: format!("cannot run '{}': {e}", self.binary),
            })?;
        if !output.status.success() {
            return Err(EngineError::ProviderValidation {
                key: "gemini-cli".to_string(),
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
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-p");
        if let Some(model) = &self.model {
            cmd.arg("--model").arg(model);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

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
                "gemini-cli exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        Ok(Some(ProviderResult::from_response(stdout)))
    }
}
