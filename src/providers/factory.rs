//! Process-wide response-provider registry.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use super::{
    ClaudeCodeProvider, GeminiCliProvider, ManualProvider, ProviderMetadata, ResponseProvider,
};
use crate::errors::{EngineError, Result};
use crate::registry::Registry;

static PROVIDERS: Lazy<Registry<dyn ResponseProvider>> = Lazy::new(Registry::new);

pub fn register_provider(key: impl Into<String>, provider: Arc<dyn ResponseProvider>) {
    PROVIDERS.register(key, provider);
}

pub fn create_provider(key: &str) -> Result<Arc<dyn ResponseProvider>> {
    PROVIDERS
        .get(key)
        .ok_or_else(|| EngineError::ProviderNotFound(key.to_string()))
}

pub fn provider_keys() -> Vec<String> {
    PROVIDERS.keys()
}

pub fn provider_metadata(key: &str) -> Result<ProviderMetadata> {
    Ok(create_provider(key)?.metadata())
}

pub fn snapshot_providers() -> HashMap<String, Arc<dyn ResponseProvider>> {
    PROVIDERS.snapshot()
}

pub fn restore_providers(snapshot: HashMap<String, Arc<dyn ResponseProvider>>) {
    PROVIDERS.restore(snapshot);
}

/// Register the providers that ship with the engine.
pub fn register_builtin_providers() {
    register_provider("manual", Arc::new(ManualProvider));
    register_provider("claude-code", Arc::new(ClaudeCodeProvider::default()));
    register_provider("gemini-cli", Arc::new(GeminiCliProvider::default()));
}
