//! Action dispatch: executes the action a transition assigns to the new
//! state and reports how the drive loop should proceed.

use serde_json::json;

use super::transitions::{Action, WorkflowCommand};
use super::workflow::WorkflowOrchestrator;
use crate::errors::{EngineError, Result};
use crate::events::{WorkflowEvent, WorkflowEventType};
use crate::models::{Session, WorkflowPhase, role_for_phase};
use crate::profiles::{create_profile, prompt_for_phase};
use crate::storage::phase_files;

/// How the drive loop continues after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Gate approved: auto-continue along the `approve` edge.
    Continue,
    /// Workflow is waiting (pending approval, awaiting response, gate
    /// error, or a terminal state was reached).
    Suspend,
    /// CHECK_VERDICT resolved to an internal follow-up command.
    Verdict(WorkflowCommand),
}

impl WorkflowOrchestrator {
    pub(crate) async fn execute_action(
        &self,
        session: &mut Session,
        action: Action,
    ) -> Result<Flow> {
        match action {
            Action::CreatePrompt => self.action_create_prompt(session).await,
            Action::CallAi => self.action_call_ai(session).await,
            Action::CheckVerdict => self.action_check_verdict(session),
            Action::Finalize => self.action_finalize(session),
            // The state machine already re-entered the same state; the
            // gate loop owns progress from here.
            Action::Halt => Ok(Flow::Suspend),
            Action::Cancel => self.action_cancel(session),
        }
    }

    async fn action_create_prompt(&self, session: &mut Session) -> Result<Flow> {
        let gateway = self.gateway(session);

        if session.phase == WorkflowPhase::Generate {
            self.artifacts().copy_plan_to_session(session, &gateway)?;
        }

        let profile = create_profile(&session.profile)?;
        let prompt = prompt_for_phase(profile.as_ref(), session.phase, &session.context)?;
        gateway.write_prompt(session.current_iteration, session.phase, &prompt)?;

        if let Some((prompt_name, _)) = phase_files(session.phase) {
            self.emitter().emit(
                &WorkflowEvent::new(WorkflowEventType::ArtifactCreated, &session.session_id)
                    .with_phase(session.phase)
                    .with_iteration(session.current_iteration)
                    .with_artifact_path(format!(
                        "iteration-{}/{}",
                        session.current_iteration, prompt_name
                    )),
            );
        }

        self.run_gate_after_action(session).await
    }

    async fn action_call_ai(&self, session: &mut Session) -> Result<Flow> {
        if self.call_provider(session).await? {
            // Awaiting an external response; the gate runs once the
            // operator drops the file and re-approves.
            self.store().save(session)?;
            return Ok(Flow::Suspend);
        }
        self.run_gate_after_action(session).await
    }

    /// Invoke the role's provider for the current phase and persist its
    /// output. Returns true when the provider is awaiting an external
    /// response.
    pub(crate) async fn call_provider(&self, session: &mut Session) -> Result<bool> {
        let gateway = self.gateway(session);
        let phase = session.phase;
        let role = role_for_phase(phase)
            .ok_or(EngineError::Unsupported("provider calls for a sentinel phase"))?;
        let provider_key = session.providers.for_role(role).to_string();

        let prompt = gateway.read_prompt(session.current_iteration, phase)?;

        let mut context = session.context.clone();
        context.insert(
            "session_dir".to_string(),
            json!(gateway.session_dir().to_string_lossy()),
        );
        context.insert("iteration".to_string(), json!(session.current_iteration));

        let result = self
            .execution()
            .execute(&provider_key, &prompt, context, None)
            .await?;

        let (_, response_name) =
            phase_files(phase).ok_or(EngineError::Unsupported("responses for a sentinel phase"))?;

        if result.awaiting_response {
            session.add_message(format!(
                "Awaiting response from '{provider_key}': write iteration-{}/{} and run 'approve'",
                session.current_iteration, response_name
            ));
            self.emit_for(session, WorkflowEventType::ApprovalRequired);
            return Ok(true);
        }

        if let Some(text) = &result.response {
            gateway.write_response(session.current_iteration, phase, text)?;
            self.emitter().emit(
                &WorkflowEvent::new(WorkflowEventType::ArtifactCreated, &session.session_id)
                    .with_phase(phase)
                    .with_iteration(session.current_iteration)
                    .with_artifact_path(format!(
                        "iteration-{}/{}",
                        session.current_iteration, response_name
                    )),
            );
        }

        // Providers without local write access return file content for the
        // engine to place under code/. Entries with no content were written
        // by the provider itself.
        for (relative, content) in &result.files {
            if let Some(content) = content {
                gateway.write_code_file(session.current_iteration, relative, content)?;
            }
        }

        Ok(false)
    }

    /// REVIEW[RESPONSE] only: the reviewer's structured verdict picks the
    /// follow-up edge (PASS completes, FAIL revises).
    fn action_check_verdict(&self, session: &mut Session) -> Result<Flow> {
        let gateway = self.gateway(session);
        let content = gateway.read_response(session.current_iteration, WorkflowPhase::Review)?;

        let profile = create_profile(&session.profile)?;
        let outcome = profile.process_review_response(&content)?;

        if outcome.approved {
            session.add_message("Review verdict PASS");
            Ok(Flow::Verdict(WorkflowCommand::ApproveComplete))
        } else {
            session.add_message("Review verdict FAIL; revising");
            Ok(Flow::Verdict(WorkflowCommand::ApproveRevise))
        }
    }

    fn action_finalize(&self, session: &mut Session) -> Result<Flow> {
        session.add_message("Workflow completed");
        self.emit_for(session, WorkflowEventType::WorkflowCompleted);
        Ok(Flow::Suspend)
    }

    fn action_cancel(&self, session: &mut Session) -> Result<Flow> {
        session.add_message("Workflow cancelled");
        self.emitter().emit(
            &WorkflowEvent::new(WorkflowEventType::WorkflowCompleted, &session.session_id)
                .with_phase(session.phase)
                .with_iteration(session.current_iteration)
                .with_metadata("cancelled", json!(true)),
        );
        Ok(Flow::Suspend)
    }
}
