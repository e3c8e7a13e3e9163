//! Artifact service: hashing and code extraction that happens when content
//! is approved, BEFORE the transition into the next phase.
//!
//! Handlers are looked up in a `(phase, stage)` dispatch table; adding a
//! new artifact-producing phase is one table entry plus one handler.

use std::collections::HashMap;
use std::fs;

use once_cell::sync::Lazy;

use crate::errors::{EngineError, Result};
use crate::events::{WorkflowEvent, WorkflowEventEmitter, WorkflowEventType};
use crate::hashing::sha256_hex;
use crate::models::{Artifact, Session, WorkflowPhase, WorkflowStage};
use crate::profiles::create_profile;
use crate::storage::SessionFileGateway;

type Handler = fn(&ArtifactService, &mut Session, &SessionFileGateway, &WorkflowEventEmitter) -> Result<()>;

static APPROVAL_HANDLERS: Lazy<HashMap<(WorkflowPhase, WorkflowStage), Handler>> =
    Lazy::new(|| {
        let mut table: HashMap<(WorkflowPhase, WorkflowStage), Handler> = HashMap::new();
        table.insert(
            (WorkflowPhase::Plan, WorkflowStage::Response),
            ArtifactService::approve_plan_response,
        );
        table.insert(
            (WorkflowPhase::Generate, WorkflowStage::Response),
            ArtifactService::approve_generate_response,
        );
        table.insert(
            (WorkflowPhase::Review, WorkflowStage::Response),
            ArtifactService::approve_review_response,
        );
        table.insert(
            (WorkflowPhase::Revise, WorkflowStage::Response),
            ArtifactService::approve_revise_response,
        );
        table
    });

#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactService;

impl ArtifactService {
    pub fn new() -> Self {
        Self
    }

    /// Run the approval side effects for the session's current state.
    /// States without a handler (prompt stages, INIT) are a no-op.
    pub fn handle_pre_transition_approval(
        &self,
        session: &mut Session,
        gateway: &SessionFileGateway,
        emitter: &WorkflowEventEmitter,
    ) -> Result<()> {
        let Some(stage) = session.stage else {
            return Ok(());
        };
        if let Some(handler) = APPROVAL_HANDLERS.get(&(session.phase, stage)) {
            handler(self, session, gateway, emitter)?;
        }
        Ok(())
    }

    /// Copy the approved planning response to `plan.md` at the session
    /// root. Called when the workflow enters GENERATE.
    pub fn copy_plan_to_session(
        &self,
        session: &mut Session,
        gateway: &SessionFileGateway,
    ) -> Result<()> {
        let source = gateway.response_path(session.current_iteration, WorkflowPhase::Plan)?;
        if !source.exists() {
            return Err(EngineError::MissingFile(source));
        }
        fs::copy(&source, gateway.plan_path())?;
        session.add_message("Copied plan to session");
        Ok(())
    }

    fn approve_plan_response(
        &self,
        session: &mut Session,
        gateway: &SessionFileGateway,
        emitter: &WorkflowEventEmitter,
    ) -> Result<()> {
        let path = gateway.response_path(session.current_iteration, WorkflowPhase::Plan)?;
        if !path.exists() {
            return Err(EngineError::MissingFile(path));
        }
        session.plan.sha256 = Some(sha256_hex(&fs::read(&path)?));
        session.plan.approved = true;
        session.add_message("Plan approved");
        emitter.emit(
            &WorkflowEvent::new(WorkflowEventType::ArtifactApproved, &session.session_id)
                .with_phase(WorkflowPhase::Plan)
                .with_iteration(session.current_iteration),
        );
        Ok(())
    }

    fn approve_review_response(
        &self,
        session: &mut Session,
        gateway: &SessionFileGateway,
        emitter: &WorkflowEventEmitter,
    ) -> Result<()> {
        let path = gateway.response_path(session.current_iteration, WorkflowPhase::Review)?;
        if !path.exists() {
            return Err(EngineError::MissingFile(path));
        }
        session.review.sha256 = Some(sha256_hex(&fs::read(&path)?));
        session.review.approved = true;
        session.add_message("Review approved");
        emitter.emit(
            &WorkflowEvent::new(WorkflowEventType::ArtifactApproved, &session.session_id)
                .with_phase(WorkflowPhase::Review)
                .with_iteration(session.current_iteration),
        );
        Ok(())
    }

    fn approve_generate_response(
        &self,
        session: &mut Session,
        gateway: &SessionFileGateway,
        emitter: &WorkflowEventEmitter,
    ) -> Result<()> {
        self.extract_code(session, gateway, emitter, WorkflowPhase::Generate)
    }

    fn approve_revise_response(
        &self,
        session: &mut Session,
        gateway: &SessionFileGateway,
        emitter: &WorkflowEventEmitter,
    ) -> Result<()> {
        self.extract_code(session, gateway, emitter, WorkflowPhase::Revise)
    }

    /// Shared generation/revision handler: ask the profile for the write
    /// plan, materialize it under `iteration-{n}/code/`, record artifacts.
    fn extract_code(
        &self,
        session: &mut Session,
        gateway: &SessionFileGateway,
        emitter: &WorkflowEventEmitter,
        phase: WorkflowPhase,
    ) -> Result<()> {
        let iteration = session.current_iteration;
        let content = gateway.read_response(iteration, phase)?;

        let profile = create_profile(&session.profile)?;
        let processed = match phase {
            WorkflowPhase::Revise => {
                profile.process_revision_response(&content, gateway.session_dir(), iteration)?
            }
            _ => profile.process_generation_response(&content, gateway.session_dir(), iteration)?,
        };

        let Some(plan) = processed.write_plan.filter(|p| !p.writes.is_empty()) else {
            session.add_message(format!("{phase} approved (no code extracted)"));
            return Ok(());
        };

        let count = plan.writes.len();
        for write in plan.writes {
            let (normalized, _path) =
                gateway.write_code_file(iteration, &write.path, &write.content)?;
            let relative_path = format!("iteration-{iteration}/code/{normalized}");

            session.artifacts.push(Artifact {
                relative_path: relative_path.clone(),
                phase,
                iteration,
                sha256: sha256_hex(write.content.as_bytes()),
            });
            emitter.emit(
                &WorkflowEvent::new(WorkflowEventType::ArtifactCreated, &session.session_id)
                    .with_phase(phase)
                    .with_iteration(iteration)
                    .with_artifact_path(relative_path),
            );
        }

        session.add_message(format!("Extracted {count} code file(s)"));
        emitter.emit(
            &WorkflowEvent::new(WorkflowEventType::ArtifactApproved, &session.session_id)
                .with_phase(phase)
                .with_iteration(iteration),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderAssignments;
    use serde_json::Map;
    use tempfile::tempdir;

    fn setup(id: &str) -> (tempfile::TempDir, Session, SessionFileGateway) {
        let dir = tempdir().unwrap();
        let session = Session::new(
            id.to_string(),
            "java-entity".to_string(),
            ProviderAssignments::uniform("manual"),
            "file-bundle".to_string(),
            Map::new(),
        );
        let gateway = SessionFileGateway::new(dir.path().join(id));
        (dir, session, gateway)
    }

    #[test]
    fn test_plan_approval_hashes_response() {
        let (_dir, mut session, gateway) = setup("s-plan");
        session.enter_state(WorkflowPhase::Plan, Some(WorkflowStage::Response));
        gateway
            .write_response(1, WorkflowPhase::Plan, "the plan")
            .unwrap();

        let emitter = WorkflowEventEmitter::new();
        ArtifactService::new()
            .handle_pre_transition_approval(&mut session, &gateway, &emitter)
            .unwrap();

        assert!(session.plan.approved);
        assert_eq!(
            session.plan.sha256.as_deref(),
            Some(sha256_hex(b"the plan").as_str())
        );
        assert!(!session.review.approved);
    }

    #[test]
    fn test_plan_approval_without_response_fails() {
        let (_dir, mut session, gateway) = setup("s-missing");
        session.enter_state(WorkflowPhase::Plan, Some(WorkflowStage::Response));

        let emitter = WorkflowEventEmitter::new();
        let result = ArtifactService::new().handle_pre_transition_approval(
            &mut session,
            &gateway,
            &emitter,
        );
        assert!(matches!(result, Err(EngineError::MissingFile(_))));
    }

    #[test]
    fn test_prompt_stage_is_noop() {
        let (_dir, mut session, gateway) = setup("s-noop");
        session.enter_state(WorkflowPhase::Generate, Some(WorkflowStage::Prompt));

        let emitter = WorkflowEventEmitter::new();
        ArtifactService::new()
            .handle_pre_transition_approval(&mut session, &gateway, &emitter)
            .unwrap();
        assert!(session.artifacts.is_empty());
    }

    #[test]
    fn test_copy_plan_requires_source() {
        let (_dir, mut session, gateway) = setup("s-copy");
        let service = ArtifactService::new();
        assert!(matches!(
            service.copy_plan_to_session(&mut session, &gateway),
            Err(EngineError::MissingFile(_))
        ));

        gateway
            .write_response(1, WorkflowPhase::Plan, "approved plan")
            .unwrap();
        service.copy_plan_to_session(&mut session, &gateway).unwrap();
        assert_eq!(gateway.read_plan().unwrap(), "approved plan");
    }
}
