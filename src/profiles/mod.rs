//! Workflow profiles: pluggable strategies that build prompts and parse
//! responses for a particular code-generation style. The engine treats a
//! profile as opaque; everything prompt-shaped lives behind this trait.

mod context;
mod java_entity;

pub use context::{ContextSchema, FieldRules, FieldType, validate_context};
pub use java_entity::JavaEntityProfile;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ContextError, EngineError, Result};
use crate::models::WorkflowPhase;
use crate::registry::Registry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileMetadata {
    pub name: String,
    pub description: String,
    pub context_schema: ContextSchema,
    pub can_regenerate_prompts: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// One file to materialize from a generation or revision response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOp {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritePlan {
    pub writes: Vec<WriteOp>,
}

/// Outcome of processing a planning/generation/revision response.
#[derive(Debug, Clone)]
pub struct ProcessedResponse {
    pub status: ResponseStatus,
    pub messages: Vec<String>,
    pub write_plan: Option<WritePlan>,
}

impl ProcessedResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Ok,
            messages: vec![message.into()],
            write_plan: None,
        }
    }

    pub fn with_write_plan(mut self, plan: WritePlan) -> Self {
        self.write_plan = Some(plan);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewVerdict {
    Pass,
    Fail,
}

/// Structured outcome of a review response.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub approved: bool,
    pub verdict: ReviewVerdict,
    pub messages: Vec<String>,
}

pub trait WorkflowProfile: Send + Sync {
    fn metadata(&self) -> ProfileMetadata;

    /// Validate the caller-supplied context against this profile's schema.
    fn validate_context(&self, context: &Map<String, Value>) -> Vec<ContextError> {
        validate_context(&self.metadata().context_schema, context)
    }

    fn default_standards_provider_key(&self) -> String;

    fn standards_config(&self) -> Map<String, Value> {
        Map::new()
    }

    fn planning_prompt(&self, context: &Map<String, Value>) -> Result<String>;
    fn generation_prompt(&self, context: &Map<String, Value>) -> Result<String>;
    fn review_prompt(&self, context: &Map<String, Value>) -> Result<String>;
    fn revision_prompt(&self, context: &Map<String, Value>) -> Result<String>;

    fn process_planning_response(&self, text: &str) -> Result<ProcessedResponse>;

    fn process_generation_response(
        &self,
        text: &str,
        session_dir: &Path,
        iteration: u32,
    ) -> Result<ProcessedResponse>;

    fn process_review_response(&self, text: &str) -> Result<ReviewOutcome>;

    fn process_revision_response(
        &self,
        text: &str,
        session_dir: &Path,
        iteration: u32,
    ) -> Result<ProcessedResponse>;

    /// Rebuild a rejected prompt from approver feedback. Profiles that
    /// advertise `can_regenerate_prompts` override this.
    fn regenerate_prompt(
        &self,
        _phase: WorkflowPhase,
        _feedback: &str,
        _context: &Map<String, Value>,
    ) -> Result<String> {
        Err(EngineError::Unsupported("prompt regeneration"))
    }
}

/// Build the prompt for a content-producing phase.
pub fn prompt_for_phase(
    profile: &dyn WorkflowProfile,
    phase: WorkflowPhase,
    context: &Map<String, Value>,
) -> Result<String> {
    match phase {
        WorkflowPhase::Plan => profile.planning_prompt(context),
        WorkflowPhase::Generate => profile.generation_prompt(context),
        WorkflowPhase::Review => profile.review_prompt(context),
        WorkflowPhase::Revise => profile.revision_prompt(context),
        _ => Err(EngineError::Unsupported("prompts for a sentinel phase")),
    }
}

// ----------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------

static PROFILES: Lazy<Registry<dyn WorkflowProfile>> = Lazy::new(Registry::new);

pub fn register_profile(key: impl Into<String>, profile: Arc<dyn WorkflowProfile>) {
    PROFILES.register(key, profile);
}

pub fn create_profile(key: &str) -> Result<Arc<dyn WorkflowProfile>> {
    PROFILES
        .get(key)
        .ok_or_else(|| EngineError::ProfileNotFound(key.to_string()))
}

pub fn profile_keys() -> Vec<String> {
    PROFILES.keys()
}

pub fn snapshot_profiles() -> HashMap<String, Arc<dyn WorkflowProfile>> {
    PROFILES.snapshot()
}

pub fn restore_profiles(snapshot: HashMap<String, Arc<dyn WorkflowProfile>>) {
    PROFILES.restore(snapshot);
}

pub fn register_builtin_profiles() {
    register_profile("java-entity", Arc::new(JavaEntityProfile::new()));
}
