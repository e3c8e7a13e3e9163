//! Response providers: pluggable producers of phase responses.
//!
//! A provider may call an external agent, shell out to a CLI, or signal
//! manual mode where the operator writes the response file by hand. It is
//! distinct from approvers (which judge content) and standards providers
//! (which assemble the standards bundle).

mod claude_code;
mod execution;
mod factory;
mod gemini_cli;
mod manual;

pub use claude_code::ClaudeCodeProvider;
pub use execution::ProviderExecutionService;
pub use factory::{
    create_provider, provider_keys, provider_metadata, register_builtin_providers,
    register_provider, restore_providers, snapshot_providers,
};
pub use gemini_cli::GeminiCliProvider;
pub use manual::ManualProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::Result;
use crate::models::ProviderResult;

/// Filesystem capability of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FsAbility {
    None,
    LocalRead,
    LocalWrite,
}

/// Provider metadata for discovery commands and timeout resolution.
///
/// A `None` timeout means "provider default"; `0` means "no timeout";
/// a positive value is seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_timeout: Option<u64>,
    pub fs_ability: FsAbility,
    pub supports_system_prompt: bool,
}

/// Inputs for one generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub context: Map<String, Value>,
    pub system_prompt: Option<String>,
    pub connection_timeout: Option<u64>,
    pub response_timeout: Option<u64>,
}

#[async_trait]
pub trait ResponseProvider: Send + Sync {
    fn metadata(&self) -> ProviderMetadata;

    /// Verify the provider is reachable and configured. Called at
    /// initialization, before any workflow execution.
    async fn validate(&self) -> Result<()>;

    /// Generate a response for the prompt. `Ok(None)` signals that the
    /// provider produces nothing and the response will arrive externally.
    async fn generate(
        &self,
        prompt: &str,
        request: &GenerateRequest,
    ) -> Result<Option<ProviderResult>>;
}
