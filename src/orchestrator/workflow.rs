//! Workflow orchestrator: the public command surface and session lifecycle.
//!
//! Each command runs as one logical thread of control: transitions are
//! driven until the session reaches a terminal state, pends on approval,
//! suspends for an external response, or records an error.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::info;
use uuid::Uuid;

use super::artifacts::ArtifactService;
use super::dispatcher::Flow;
use super::gate::ApprovalGateService;
use super::transitions::{WorkflowCommand, lookup};
use crate::errors::{EngineError, Result};
use crate::events::{WorkflowEvent, WorkflowEventEmitter, WorkflowEventType, WorkflowObserver};
use crate::models::{
    ApprovalConfig, ProviderAssignments, Session, WorkflowPhase, WorkflowStage, WorkflowStatus,
};
use crate::profiles::{WorkflowProfile, create_profile};
use crate::providers::{ProviderExecutionService, create_provider};
use crate::standards::{create_standards_provider, materialize_standards};
use crate::storage::{SessionFileGateway, SessionStore};

/// Human override at REVIEW[RESPONSE] when disagreeing with the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOverride {
    Complete,
    Revise,
}

pub struct WorkflowOrchestrator {
    store: SessionStore,
    approval_config: ApprovalConfig,
    artifacts: ArtifactService,
    gate: ApprovalGateService,
    execution: ProviderExecutionService,
    emitter: WorkflowEventEmitter,
}

impl WorkflowOrchestrator {
    pub fn new(sessions_root: impl Into<PathBuf>) -> Self {
        Self {
            store: SessionStore::new(sessions_root),
            approval_config: ApprovalConfig::default(),
            artifacts: ArtifactService::new(),
            gate: ApprovalGateService::new(),
            execution: ProviderExecutionService::new(),
            emitter: WorkflowEventEmitter::new(),
        }
    }

    pub fn with_approval_config(mut self, config: ApprovalConfig) -> Self {
        self.approval_config = config;
        self
    }

    /// Subscribe an observer for all workflow events.
    pub fn subscribe(&mut self, observer: Arc<dyn WorkflowObserver>) {
        self.emitter.subscribe(observer);
    }

    /// Subscribe an observer for a subset of event types.
    pub fn subscribe_filtered(
        &mut self,
        types: impl IntoIterator<Item = WorkflowEventType>,
        observer: Arc<dyn WorkflowObserver>,
    ) {
        self.emitter.subscribe_filtered(types, observer);
    }

    pub(crate) fn store(&self) -> &SessionStore {
        &self.store
    }

    pub(crate) fn approval_config(&self) -> &ApprovalConfig {
        &self.approval_config
    }

    pub(crate) fn artifacts(&self) -> &ArtifactService {
        &self.artifacts
    }

    pub(crate) fn gate(&self) -> &ApprovalGateService {
        &self.gate
    }

    pub(crate) fn execution(&self) -> &ProviderExecutionService {
        &self.execution
    }

    pub(crate) fn emitter(&self) -> &WorkflowEventEmitter {
        &self.emitter
    }

    pub(crate) fn gateway(&self, session: &Session) -> SessionFileGateway {
        SessionFileGateway::new(self.store.session_dir(&session.session_id))
    }

    pub(crate) fn emit_for(&self, session: &Session, event_type: WorkflowEventType) {
        self.emitter.emit(
            &WorkflowEvent::new(event_type, &session.session_id)
                .with_phase(session.phase)
                .with_iteration(session.current_iteration),
        );
    }

    // ------------------------------------------------------------------
    // Public surface
    // ------------------------------------------------------------------

    /// Create a session: validate context and providers, materialize the
    /// standards bundle, persist the INIT record. Any failure removes the
    /// partial session directory so no orphan state remains.
    pub async fn initialize_run(
        &self,
        profile_key: &str,
        providers: ProviderAssignments,
        context: Map<String, Value>,
        standards_provider_key: Option<String>,
    ) -> Result<String> {
        let profile = create_profile(profile_key)?;

        let errors = profile.validate_context(&context);
        if !errors.is_empty() {
            return Err(EngineError::ContextInvalid(errors));
        }

        let standards_key = standards_provider_key
            .unwrap_or_else(|| profile.default_standards_provider_key());

        let session_id = generate_session_id();
        let mut session = Session::new(
            session_id.clone(),
            profile_key.to_string(),
            providers,
            standards_key.clone(),
            context,
        );

        if let Err(e) = self
            .materialize_session(&mut session, profile.as_ref(), &standards_key)
            .await
        {
            let _ = self.store.delete(&session_id);
            return Err(e);
        }

        self.store.save(&session)?;
        info!(session = %session_id, profile = profile_key, "session initialized");
        Ok(session_id)
    }

    async fn materialize_session(
        &self,
        session: &mut Session,
        profile: &dyn WorkflowProfile,
        standards_key: &str,
    ) -> Result<()> {
        let gateway = self.gateway(session);
        gateway.ensure_session_dir()?;

        let unique_keys: BTreeSet<&str> = session.providers.keys().into_iter().collect();
        for key in unique_keys {
            let provider = create_provider(key)?;
            provider.validate().await?;
        }

        let standards = create_standards_provider(standards_key)?;
        standards.validate().await?;
        materialize_standards(&gateway, session, standards.as_ref(), &profile.standards_config())
            .await?;

        session.add_message("Session initialized");
        Ok(())
    }

    /// Start the workflow: INIT → PLAN[PROMPT], then drive as far as the
    /// gates allow.
    pub async fn init(&self, session_id: &str) -> Result<Session> {
        let mut session = self.store.load(session_id)?;
        self.ensure_command(&session, WorkflowCommand::Init)?;
        self.run_command(&mut session, WorkflowCommand::Init).await?;
        Ok(session)
    }

    /// Approve the pending content and advance. At REVIEW[RESPONSE] the
    /// override flags replace the verdict check.
    pub async fn approve(
        &self,
        session_id: &str,
        review_override: Option<ReviewOverride>,
    ) -> Result<Session> {
        let mut session = self.store.load(session_id)?;
        let command = match review_override {
            Some(ReviewOverride::Complete) => WorkflowCommand::ApproveComplete,
            Some(ReviewOverride::Revise) => WorkflowCommand::ApproveRevise,
            None => WorkflowCommand::Approve,
        };
        self.ensure_command(&session, command)?;
        // The human approval supersedes any earlier gate verdict; stale
        // feedback and retry counts must not leak into the next gate.
        session.approval.clear();
        self.run_command(&mut session, command).await?;
        Ok(session)
    }

    /// Reject the current content with feedback; the workflow stays in
    /// place and waits for the operator.
    pub async fn reject(&self, session_id: &str, feedback: &str) -> Result<Session> {
        let mut session = self.store.load(session_id)?;
        self.ensure_command(&session, WorkflowCommand::Reject)?;
        self.run_command(&mut session, WorkflowCommand::Reject).await?;

        session.approval.feedback = Some(feedback.to_string());
        session.approval.pending = true;
        session.add_message(format!("Rejected: {feedback}"));
        self.store.save(&session)?;
        Ok(session)
    }

    /// Cancel from any active state.
    pub async fn cancel(&self, session_id: &str) -> Result<Session> {
        let mut session = self.store.load(session_id)?;
        self.ensure_command(&session, WorkflowCommand::Cancel)?;
        self.run_command(&mut session, WorkflowCommand::Cancel).await?;
        Ok(session)
    }

    /// Read-only view of the session; never mutates on-disk state.
    pub fn status(&self, session_id: &str) -> Result<Session> {
        self.store.load(session_id)
    }

    // ------------------------------------------------------------------
    // Drive loop and error policy
    // ------------------------------------------------------------------

    fn ensure_command(&self, session: &Session, command: WorkflowCommand) -> Result<()> {
        if lookup(session.phase, session.stage, command).is_none() {
            return Err(EngineError::InvalidCommand {
                command: command.to_string(),
                state: session.state_label(),
            });
        }
        Ok(())
    }

    /// Run `drive`, applying the error policy: provider/path/file failures
    /// are recorded on the session (status ERROR, WORKFLOW_FAILED) and the
    /// command returns normally; lookup and corruption failures bubble.
    async fn run_command(&self, session: &mut Session, command: WorkflowCommand) -> Result<()> {
        match self.drive(session, command).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let bubbles = matches!(e, EngineError::ProviderNotFound(_));
                if bubbles || is_recorded_failure(&e) {
                    self.record_failure(session, &e)?;
                    if bubbles {
                        return Err(e);
                    }
                    return Ok(());
                }
                Err(e)
            }
        }
    }

    fn record_failure(&self, session: &mut Session, error: &EngineError) -> Result<()> {
        session.status = WorkflowStatus::Error;
        session.last_error = Some(error.to_string());
        session.add_message(format!("Workflow failed: {error}"));
        self.store.save(session)?;
        self.emitter.emit(
            &WorkflowEvent::new(WorkflowEventType::WorkflowFailed, &session.session_id)
                .with_phase(session.phase)
                .with_iteration(session.current_iteration)
                .with_metadata("error", json!(error.to_string())),
        );
        Ok(())
    }

    /// Execute transitions until the workflow suspends.
    ///
    /// Pre-transition approval side effects run immediately before an
    /// approve-family transition is applied; the verdict-internal
    /// continuation skips them because the review response is already
    /// hashed by then.
    async fn drive(&self, session: &mut Session, initial: WorkflowCommand) -> Result<()> {
        let mut command = initial;
        let mut run_side_effects = initial.is_approval();

        loop {
            let transition = lookup(session.phase, session.stage, command).ok_or_else(|| {
                EngineError::InvalidCommand {
                    command: command.to_string(),
                    state: session.state_label(),
                }
            })?;

            if run_side_effects {
                let gateway = self.gateway(session);
                self.artifacts
                    .handle_pre_transition_approval(session, &gateway, &self.emitter)?;
            }

            let entering_revision = session.phase == WorkflowPhase::Review
                && session.stage == Some(WorkflowStage::Response)
                && transition.phase == WorkflowPhase::Revise
                && transition.stage == Some(WorkflowStage::Prompt);
            if entering_revision {
                session.current_iteration += 1;
                session.add_message(format!("Starting iteration {}", session.current_iteration));
                self.emit_for(session, WorkflowEventType::IterationStarted);
            }

            let phase_changed = transition.phase != session.phase;
            session.enter_state(transition.phase, transition.stage);
            if phase_changed {
                self.emit_for(session, WorkflowEventType::PhaseEntered);
            }
            self.store.save(session)?;

            match self.execute_action(session, transition.action).await? {
                Flow::Continue => {
                    command = WorkflowCommand::Approve;
                    run_side_effects = true;
                }
                Flow::Verdict(next) => {
                    command = next;
                    run_side_effects = false;
                }
                Flow::Suspend => {
                    self.store.save(session)?;
                    return Ok(());
                }
            }
        }
    }
}

/// Failures recorded on the session instead of bubbling to the caller.
fn is_recorded_failure(error: &EngineError) -> bool {
    matches!(
        error,
        EngineError::Provider(_)
            | EngineError::Timeout(_)
            | EngineError::PathInvalid { .. }
            | EngineError::PathEscape { .. }
            | EngineError::MissingFile(_)
            | EngineError::Io(_)
    )
}

/// Timestamp plus a random suffix; unique per session directory.
fn generate_session_id() -> String {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{stamp}-{}", &suffix[..8])
}
