//! Approval gate value types and per-stage gate configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::session::{WorkflowPhase, WorkflowStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
    Pending,
}

/// Verdict produced by an approver. Rejections and pending verdicts are
/// values the gate interprets, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalResult {
    pub decision: ApprovalDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_content: Option<String>,
}

impl ApprovalResult {
    pub fn approved() -> Self {
        Self {
            decision: ApprovalDecision::Approved,
            feedback: None,
            suggested_content: None,
        }
    }

    pub fn pending() -> Self {
        Self {
            decision: ApprovalDecision::Pending,
            feedback: None,
            suggested_content: None,
        }
    }

    pub fn rejected(feedback: impl Into<String>) -> Self {
        Self {
            decision: ApprovalDecision::Rejected,
            feedback: Some(feedback.into()),
            suggested_content: None,
        }
    }

    pub fn with_suggestion(mut self, content: impl Into<String>) -> Self {
        self.suggested_content = Some(content.into());
        self
    }
}

/// Gate configuration for one `(phase, stage)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_approver")]
    pub approver: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub allow_rewrite: bool,
}

fn default_approver() -> String {
    "skip".to_string()
}

fn default_max_retries() -> u32 {
    3
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            approver: default_approver(),
            max_retries: default_max_retries(),
            allow_rewrite: false,
        }
    }
}

/// Per-stage approval configuration for the whole pipeline.
///
/// Pairs without an explicit entry fall back to [`GateConfig::default`]
/// (the `skip` approver).
#[derive(Debug, Clone, Default)]
pub struct ApprovalConfig {
    stages: HashMap<(WorkflowPhase, WorkflowStage), GateConfig>,
}

impl ApprovalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, phase: WorkflowPhase, stage: WorkflowStage, config: GateConfig) {
        self.stages.insert((phase, stage), config);
    }

    pub fn with_stage(
        mut self,
        phase: WorkflowPhase,
        stage: WorkflowStage,
        config: GateConfig,
    ) -> Self {
        self.set(phase, stage, config);
        self
    }

    pub fn get(&self, phase: WorkflowPhase, stage: WorkflowStage) -> GateConfig {
        self.stages
            .get(&(phase, stage))
            .cloned()
            .unwrap_or_default()
    }

    /// Build from `"<phase>.<stage>"` keys, as loaded from the settings file.
    /// Unrecognized keys are rejected so typos do not silently disable gates.
    pub fn from_keyed_map(entries: &HashMap<String, GateConfig>) -> anyhow::Result<Self> {
        let mut config = Self::new();
        for (key, gate) in entries {
            let (phase, stage) = parse_stage_key(key)
                .ok_or_else(|| anyhow::anyhow!("unknown approval stage key '{key}'"))?;
            config.set(phase, stage, gate.clone());
        }
        Ok(config)
    }
}

fn parse_stage_key(key: &str) -> Option<(WorkflowPhase, WorkflowStage)> {
    let (phase, stage) = key.split_once('.')?;
    let phase = match phase.to_ascii_lowercase().as_str() {
        "plan" => WorkflowPhase::Plan,
        "generate" => WorkflowPhase::Generate,
        "review" => WorkflowPhase::Review,
        "revise" => WorkflowPhase::Revise,
        _ => return None,
    };
    let stage = match stage.to_ascii_lowercase().as_str() {
        "prompt" => WorkflowStage::Prompt,
        "response" => WorkflowStage::Response,
        _ => return None,
    };
    Some((phase, stage))
}
