//! Provider execution service: resolve by key, apply declared timeouts,
//! normalize the outcome.

use serde_json::{Map, Value};

use super::{GenerateRequest, factory::create_provider};
use crate::errors::Result;
use crate::models::ProviderExecutionResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderExecutionService;

impl ProviderExecutionService {
    pub fn new() -> Self {
        Self
    }

    /// Execute the provider registered under `provider_key`.
    ///
    /// Timeouts come from the provider's own metadata and are passed back
    /// to it as hints; enforcement is the provider's responsibility.
    pub async fn execute(
        &self,
        provider_key: &str,
        prompt: &str,
        context: Map<String, Value>,
        system_prompt: Option<String>,
    ) -> Result<ProviderExecutionResult> {
        let provider = create_provider(provider_key)?;
        let metadata = provider.metadata();

        let request = GenerateRequest {
            context,
            system_prompt,
            connection_timeout: metadata.connection_timeout,
            response_timeout: metadata.response_timeout,
        };

        match provider.generate(prompt, &request).await? {
            None => Ok(ProviderExecutionResult::awaiting()),
            Some(raw) => Ok(ProviderExecutionResult::from_raw(raw)),
        }
    }
}
