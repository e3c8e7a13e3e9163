//! Result types for response-provider execution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Raw result from a response provider.
///
/// `files` keys are paths relative to the iteration `code/` directory.
/// A `Some(content)` value is written by the engine; `None` means the
/// provider already wrote the file itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResult {
    #[serde(default)]
    pub files: BTreeMap<String, Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl ProviderResult {
    pub fn from_response(text: impl Into<String>) -> Self {
        Self {
            files: BTreeMap::new(),
            response: Some(text.into()),
        }
    }
}

/// Normalized provider outcome, independent of provider type.
///
/// When `awaiting_response` is true the provider produced nothing and the
/// workflow must suspend until the operator supplies the response file.
#[derive(Debug, Clone, Default)]
pub struct ProviderExecutionResult {
    pub awaiting_response: bool,
    pub response: Option<String>,
    pub files: BTreeMap<String, Option<String>>,
    pub raw: Option<ProviderResult>,
}

impl ProviderExecutionResult {
    pub fn awaiting() -> Self {
        Self {
            awaiting_response: true,
            ..Self::default()
        }
    }

    pub fn from_raw(raw: ProviderResult) -> Self {
        Self {
            awaiting_response: false,
            response: raw.response.clone(),
            files: raw.files.clone(),
            raw: Some(raw),
        }
    }
}
