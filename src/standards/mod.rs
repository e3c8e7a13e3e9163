//! Standards providers: assemble the standards bundle materialized into
//! each session at initialization.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{EngineError, Result};
use crate::hashing::sha256_hex;
use crate::models::Session;
use crate::registry::Registry;
use crate::storage::SessionFileGateway;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardsMetadata {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_timeout: Option<u64>,
}

#[async_trait]
pub trait StandardsProvider: Send + Sync {
    fn metadata(&self) -> StandardsMetadata;

    async fn validate(&self) -> Result<()>;

    /// Produce the standards bundle text for the given context.
    async fn create_bundle(
        &self,
        context: &Map<String, Value>,
        connection_timeout: Option<u64>,
        response_timeout: Option<u64>,
    ) -> Result<String>;
}

// ----------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------

static STANDARDS: Lazy<Registry<dyn StandardsProvider>> = Lazy::new(Registry::new);

pub fn register_standards_provider(key: impl Into<String>, provider: Arc<dyn StandardsProvider>) {
    STANDARDS.register(key, provider);
}

pub fn create_standards_provider(key: &str) -> Result<Arc<dyn StandardsProvider>> {
    STANDARDS
        .get(key)
        .ok_or_else(|| EngineError::ProviderNotFound(key.to_string()))
}

pub fn standards_provider_keys() -> Vec<String> {
    STANDARDS.keys()
}

pub fn snapshot_standards_providers() -> HashMap<String, Arc<dyn StandardsProvider>> {
    STANDARDS.snapshot()
}

pub fn restore_standards_providers(snapshot: HashMap<String, Arc<dyn StandardsProvider>>) {
    STANDARDS.restore(snapshot);
}

// ----------------------------------------------------------------------
// File bundle provider
// ----------------------------------------------------------------------

/// Concatenates a fixed list of files under a standards root into one
/// bundle. Filenames are lexically sorted and deduplicated; each section
/// is introduced by a `--- filename ---` separator and ends with a
/// newline.
pub struct FileBundleStandardsProvider {
    standards_root: PathBuf,
    files: Vec<String>,
}

impl FileBundleStandardsProvider {
    pub fn new(standards_root: impl Into<PathBuf>, files: Vec<String>) -> Self {
        Self {
            standards_root: standards_root.into(),
            files,
        }
    }

    /// Bundle every regular file directly under `standards_root`.
    pub fn from_dir(standards_root: impl Into<PathBuf>) -> Result<Self> {
        let root = standards_root.into();
        let mut files = Vec::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if entry.path().is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(Self::new(root, files))
    }
}

#[async_trait]
impl StandardsProvider for FileBundleStandardsProvider {
    fn metadata(&self) -> StandardsMetadata {
        StandardsMetadata {
            name: "file-bundle".to_string(),
            description: "Concatenates standards files from a local directory".to_string(),
            connection_timeout: None,
            response_timeout: None,
        }
    }

    async fn validate(&self) -> Result<()> {
        if !self.standards_root.is_dir() {
            return Err(EngineError::ProviderValidation {
                key: "file-bundle".to_string(),
                message: format!(
                    "standards root is not a directory: {}",
                    self.standards_root.display()
                ),
            });
        }
        Ok(())
    }

    async fn create_bundle(
        &self,
        _context: &Map<String, Value>,
        _connection_timeout: Option<u64>,
        _response_timeout: Option<u64>,
    ) -> Result<String> {
        let mut unique: Vec<&String> = self.files.iter().collect();
        unique.sort();
        unique.dedup();

        let mut bundle = String::new();
        for filename in unique {
            let path = self.standards_root.join(filename);
            if !path.is_file() {
                return Err(EngineError::Provider(format!(
                    "standards file not found: {}",
                    path.display()
                )));
            }
            let mut content = fs::read_to_string(&path)?;
            if !content.ends_with('\n') {
                content.push('\n');
            }
            bundle.push_str(&format!("--- {filename} ---\n{content}"));
        }
        Ok(bundle)
    }
}

// ----------------------------------------------------------------------
// Materialization
// ----------------------------------------------------------------------

/// Create the session's standards bundle and record its hash. The
/// profile's standards config is merged over the session context for the
/// bundle call.
pub async fn materialize_standards(
    gateway: &SessionFileGateway,
    session: &mut Session,
    provider: &dyn StandardsProvider,
    standards_config: &Map<String, Value>,
) -> Result<()> {
    let metadata = provider.metadata();
    let mut context = session.context.clone();
    for (key, value) in standards_config {
        context.insert(key.clone(), value.clone());
    }
    let bundle = provider
        .create_bundle(
            &context,
            metadata.connection_timeout,
            metadata.response_timeout,
        )
        .await?;

    gateway.write_standards_bundle(&bundle)?;
    session.standards_hash = Some(sha256_hex(bundle.as_bytes()));
    Ok(())
}
