use async_trait::async_trait;

use super::{FsAbility, GenerateRequest, ProviderMetadata, ResponseProvider};
use crate::errors::Result;
use crate::models::ProviderResult;

/// Human-in-the-loop provider: never generates, the operator writes the
/// response file and re-approves.
pub struct ManualProvider;

#[async_trait]
impl ResponseProvider for ManualProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "manual".to_string(),
            description: "Human-in-the-loop (responses written to disk by the operator)"
                .to_string(),
            connection_timeout: None,
            response_timeout: None,
            fs_ability: FsAbility::None,
            supports_system_prompt: false,
        }
    }

    async fn validate(&self) -> Result<()> {
        Ok(())
    }

    async fn generate(
        &self,
        _prompt: &str,
        _request: &GenerateRequest,
    ) -> Result<Option<ProviderResult>> {
        Ok(None)
    }
}
