//! Approvers: pluggable judges invoked by the approval gate after each
//! content-producing action.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{EngineError, Result};
use crate::models::{ApprovalResult, WorkflowPhase, WorkflowStage};
use crate::registry::Registry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproverMetadata {
    pub name: String,
    pub description: String,
}

/// Files passed to an approver: path → content, with `None` for files
/// that should exist but do not (approvers may treat missing as a signal).
pub type ApprovalFiles = BTreeMap<String, Option<String>>;

#[async_trait]
pub trait Approver: Send + Sync {
    fn metadata(&self) -> ApproverMetadata;

    async fn evaluate(
        &self,
        phase: WorkflowPhase,
        stage: WorkflowStage,
        files: &ApprovalFiles,
        context: &Map<String, Value>,
    ) -> Result<ApprovalResult>;
}

/// Always approves. The default gate for unattended runs.
pub struct SkipApprover;

#[async_trait]
impl Approver for SkipApprover {
    fn metadata(&self) -> ApproverMetadata {
        ApproverMetadata {
            name: "skip".to_string(),
            description: "Approves everything without inspection".to_string(),
        }
    }

    async fn evaluate(
        &self,
        _phase: WorkflowPhase,
        _stage: WorkflowStage,
        _files: &ApprovalFiles,
        _context: &Map<String, Value>,
    ) -> Result<ApprovalResult> {
        Ok(ApprovalResult::approved())
    }
}

/// Always pends: every gate waits for a human `approve`/`reject`.
pub struct ManualApprover;

#[async_trait]
impl Approver for ManualApprover {
    fn metadata(&self) -> ApproverMetadata {
        ApproverMetadata {
            name: "manual".to_string(),
            description: "Pends every gate for human review".to_string(),
        }
    }

    async fn evaluate(
        &self,
        _phase: WorkflowPhase,
        _stage: WorkflowStage,
        _files: &ApprovalFiles,
        _context: &Map<String, Value>,
    ) -> Result<ApprovalResult> {
        Ok(ApprovalResult::pending())
    }
}

// ----------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------

static APPROVERS: Lazy<Registry<dyn Approver>> = Lazy::new(Registry::new);

pub fn register_approver(key: impl Into<String>, approver: Arc<dyn Approver>) {
    APPROVERS.register(key, approver);
}

pub fn create_approver(key: &str) -> Result<Arc<dyn Approver>> {
    APPROVERS
        .get(key)
        .ok_or_else(|| EngineError::ProviderNotFound(key.to_string()))
}

pub fn approver_keys() -> Vec<String> {
    APPROVERS.keys()
}

pub fn snapshot_approvers() -> HashMap<String, Arc<dyn Approver>> {
    APPROVERS.snapshot()
}

pub fn restore_approvers(snapshot: HashMap<String, Arc<dyn Approver>>) {
    APPROVERS.restore(snapshot);
}

pub fn register_builtin_approvers() {
    register_approver("skip", Arc::new(SkipApprover));
    register_approver("manual", Arc::new(ManualApprover));
}
