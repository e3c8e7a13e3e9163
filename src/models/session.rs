//! Session aggregate: the persistent record of one plan/generate/review/revise run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Coarse pipeline step, plus the INIT/COMPLETE/CANCELLED/ERROR sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowPhase {
    Init,
    Plan,
    Generate,
    Review,
    Revise,
    Complete,
    Cancelled,
    Error,
}

impl WorkflowPhase {
    /// Terminal phases admit no commands other than status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled | Self::Error)
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::Plan => "PLAN",
            Self::Generate => "GENERATE",
            Self::Review => "REVIEW",
            Self::Revise => "REVISE",
            Self::Complete => "COMPLETE",
            Self::Cancelled => "CANCELLED",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Stage within an active phase: the engine-produced request or the
/// external producer's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStage {
    Prompt,
    Response,
}

impl std::fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Prompt => "PROMPT",
            Self::Response => "RESPONSE",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    InProgress,
    Success,
    Error,
    Cancelled,
    Failed,
}

/// Provider role within the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Planner,
    Generator,
    Reviewer,
    Reviser,
}

/// Role-to-provider-key mapping, immutable after session creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAssignments {
    pub planner: String,
    pub generator: String,
    pub reviewer: String,
    pub reviser: String,
}

impl ProviderAssignments {
    /// All four roles use the same provider key.
    pub fn uniform(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            planner: key.clone(),
            generator: key.clone(),
            reviewer: key.clone(),
            reviser: key,
        }
    }

    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::Planner => &self.planner,
            Role::Generator => &self.generator,
            Role::Reviewer => &self.reviewer,
            Role::Reviser => &self.reviser,
        }
    }

    pub fn keys(&self) -> [&str; 4] {
        [&self.planner, &self.generator, &self.reviewer, &self.reviser]
    }
}

/// Approval record for the plan or review response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedApproval {
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// An immutable record of a file the engine wrote and hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub relative_path: String,
    pub phase: WorkflowPhase,
    pub iteration: u32,
    pub sha256: String,
}

/// Transient approval-gate tracking on the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalState {
    pub pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_content: Option<String>,
    pub retry_count: u32,
}

impl ApprovalState {
    /// Reset tracking fields after a successful approval.
    pub fn clear(&mut self) {
        self.pending = false;
        self.feedback = None;
        self.suggested_content = None;
        self.retry_count = 0;
    }
}

/// Timestamped progress note, append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// One end-to-end run of the pipeline for a single entity.
///
/// Mutated only by the orchestrator; persisted after every externally
/// visible state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub profile: String,
    pub providers: ProviderAssignments,
    pub standards_provider: String,
    pub context: Map<String, Value>,
    pub phase: WorkflowPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<WorkflowStage>,
    pub status: WorkflowStatus,
    pub current_iteration: u32,
    #[serde(default)]
    pub plan: HashedApproval,
    #[serde(default)]
    pub review: HashedApproval,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standards_hash: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub approval: ApprovalState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub messages: Vec<SessionMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Unknown fields from newer writers, preserved across load/save.
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Session {
    pub fn new(
        session_id: String,
        profile: String,
        providers: ProviderAssignments,
        standards_provider: String,
        context: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            profile,
            providers,
            standards_provider,
            context,
            phase: WorkflowPhase::Init,
            stage: None,
            status: WorkflowStatus::InProgress,
            current_iteration: 1,
            plan: HashedApproval::default(),
            review: HashedApproval::default(),
            standards_hash: None,
            artifacts: Vec::new(),
            approval: ApprovalState::default(),
            last_error: None,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            extra: Map::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Human-readable `PHASE[STAGE]` label for errors and logs.
    pub fn state_label(&self) -> String {
        match self.stage {
            Some(stage) => format!("{}[{}]", self.phase, stage),
            None => self.phase.to_string(),
        }
    }

    /// Append a timestamped progress note.
    pub fn add_message(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::debug!(session = %self.session_id, "{}", text);
        self.messages.push(SessionMessage {
            timestamp: Utc::now(),
            text,
        });
    }

    /// Move to a new `(phase, stage)` and keep `status` in sync with the
    /// phase: terminal phases pin their status, active phases run as
    /// IN_PROGRESS (which also clears a recoverable ERROR status on resume).
    pub fn enter_state(&mut self, phase: WorkflowPhase, stage: Option<WorkflowStage>) {
        self.phase = phase;
        self.stage = stage;
        self.status = match phase {
            WorkflowPhase::Complete => WorkflowStatus::Success,
            WorkflowPhase::Cancelled => WorkflowStatus::Cancelled,
            WorkflowPhase::Error => WorkflowStatus::Error,
            _ => WorkflowStatus::InProgress,
        };
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Provider role responsible for producing the response of a phase.
pub fn role_for_phase(phase: WorkflowPhase) -> Option<Role> {
    match phase {
        WorkflowPhase::Plan => Some(Role::Planner),
        WorkflowPhase::Generate => Some(Role::Generator),
        WorkflowPhase::Review => Some(Role::Reviewer),
        WorkflowPhase::Revise => Some(Role::Reviser),
        _ => None,
    }
}
