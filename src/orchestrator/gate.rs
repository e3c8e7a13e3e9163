//! Approval gate service: builds evaluation inputs and invokes the
//! configured approver for the session's current `(phase, stage)`.
//!
//! Verdict interpretation (retry, regeneration, suspension) lives in the
//! orchestrator's gate loop; this service owns what the approver sees.

use serde_json::{Map, Value, json};

use super::dispatcher::Flow;
use super::workflow::WorkflowOrchestrator;
use crate::approval::{ApprovalFiles, create_approver};
use crate::errors::{EngineError, Result};
use crate::events::WorkflowEventType;
use crate::models::{
    ApprovalDecision, ApprovalResult, GateConfig, Session, WorkflowPhase, WorkflowStage,
};
use crate::profiles::create_profile;
use crate::storage::{SessionFileGateway, phase_files};

#[derive(Debug, Clone, Copy, Default)]
pub struct ApprovalGateService;

impl ApprovalGateService {
    pub fn new() -> Self {
        Self
    }

    /// Collect the canonical file set for the current state.
    ///
    /// The prompt or response file of the state, plus `code/**` on the
    /// RESPONSE stage of GENERATE/REVISE, plus `plan.md` during GENERATE
    /// and REVIEW. Files that should exist but do not map to `None`.
    pub fn build_approval_files(
        &self,
        session: &Session,
        gateway: &SessionFileGateway,
    ) -> Result<ApprovalFiles> {
        let mut files = ApprovalFiles::new();
        let Some(stage) = session.stage else {
            return Ok(files);
        };
        let iteration = session.current_iteration;

        if let Some((prompt_name, response_name)) = phase_files(session.phase) {
            let name = match stage {
                WorkflowStage::Prompt => prompt_name,
                WorkflowStage::Response => response_name,
            };
            let path = gateway.iteration_dir(iteration).join(name);
            files.insert(
                path.to_string_lossy().into_owned(),
                gateway.read_optional(&path)?,
            );
        }

        if stage == WorkflowStage::Response
            && matches!(session.phase, WorkflowPhase::Generate | WorkflowPhase::Revise)
        {
            let code_dir = gateway.code_dir(iteration);
            for (relative, content) in gateway.read_code_files(iteration)? {
                let path = code_dir.join(&relative);
                files.insert(path.to_string_lossy().into_owned(), Some(content));
            }
        }

        if matches!(session.phase, WorkflowPhase::Generate | WorkflowPhase::Review) {
            let plan = gateway.plan_path();
            if plan.exists() {
                files.insert(
                    plan.to_string_lossy().into_owned(),
                    gateway.read_optional(&plan)?,
                );
            }
        }

        Ok(files)
    }

    /// Base session context plus the gate's own keys.
    pub fn build_approval_context(
        &self,
        session: &Session,
        gateway: &SessionFileGateway,
        gate: &GateConfig,
    ) -> Map<String, Value> {
        let mut context = session.context.clone();
        context.insert("session_id".to_string(), json!(session.session_id));
        context.insert("phase".to_string(), json!(session.phase.to_string()));
        if let Some(stage) = session.stage {
            context.insert("stage".to_string(), json!(stage.to_string()));
        }
        context.insert("iteration".to_string(), json!(session.current_iteration));
        context.insert("allow_rewrite".to_string(), json!(gate.allow_rewrite));
        context.insert(
            "session_dir".to_string(),
            json!(gateway.session_dir().to_string_lossy()),
        );
        context.insert(
            "plan_file".to_string(),
            json!(gateway.plan_path().to_string_lossy()),
        );
        context
    }

    /// Run the approver configured for the current state.
    pub async fn evaluate(
        &self,
        session: &Session,
        gateway: &SessionFileGateway,
        gate: &GateConfig,
    ) -> Result<ApprovalResult> {
        let Some(stage) = session.stage else {
            return Ok(ApprovalResult::approved());
        };

        let approver = create_approver(&gate.approver)?;
        let files = self.build_approval_files(session, gateway)?;
        let context = self.build_approval_context(session, gateway, gate);

        approver
            .evaluate(session.phase, stage, &files, &context)
            .await
    }
}

/// Outcome of a prompt-stage rejection.
enum PromptRejection {
    /// A regenerated prompt was written; re-run the gate.
    Regenerated,
    /// Workflow paused for the operator.
    Paused,
}

/// Gate errors are recorded on the session and pause the workflow; other
/// failures (path, I/O) bubble to the orchestrator's error policy.
fn is_gate_error(error: &EngineError) -> bool {
    matches!(error, EngineError::Provider(_) | EngineError::Timeout(_))
}

impl WorkflowOrchestrator {
    /// Run the approval gate after CREATE_PROMPT / CALL_AI and interpret
    /// the verdict. Rejections at a PROMPT stage try rewrite or profile
    /// regeneration; rejections at a RESPONSE stage enter the retry loop.
    pub(crate) async fn run_gate_after_action(&self, session: &mut Session) -> Result<Flow> {
        let Some(stage) = session.stage else {
            // No gate for stageless states.
            return Ok(Flow::Suspend);
        };

        loop {
            let gate_config = self.approval_config().get(session.phase, stage);
            let gateway = self.gateway(session);

            let result = match self.gate().evaluate(session, &gateway, &gate_config).await {
                Ok(result) => result,
                Err(e) if is_gate_error(&e) => {
                    return self.record_gate_error(session, &e);
                }
                Err(e) => return Err(e),
            };

            match result.decision {
                ApprovalDecision::Pending => {
                    session.approval.pending = true;
                    if let Some(feedback) = result.feedback {
                        session.add_message(feedback);
                    }
                    self.emit_for(session, WorkflowEventType::ApprovalRequired);
                    self.store().save(session)?;
                    return Ok(Flow::Suspend);
                }
                ApprovalDecision::Approved => {
                    session.approval.clear();
                    self.emit_for(session, WorkflowEventType::ApprovalGranted);
                    return Ok(Flow::Continue);
                }
                ApprovalDecision::Rejected => {
                    session.approval.feedback = result.feedback.clone();
                    session.approval.retry_count += 1;

                    match stage {
                        WorkflowStage::Prompt => {
                            match self.handle_prompt_rejection(session, &result, &gate_config)? {
                                PromptRejection::Regenerated => continue,
                                PromptRejection::Paused => return Ok(Flow::Suspend),
                            }
                        }
                        WorkflowStage::Response => {
                            return self
                                .handle_response_rejection(session, &result, &gate_config)
                                .await;
                        }
                    }
                }
            }
        }
    }

    fn record_gate_error(&self, session: &mut Session, error: &EngineError) -> Result<Flow> {
        session.last_error = Some(format!("Approval gate error: {error}"));
        session.add_message(format!("Approval failed: {error}. Run 'approve' to retry."));
        self.store().save(session)?;
        Ok(Flow::Suspend)
    }

    /// PROMPT-stage rejection: apply suggested content when rewriting is
    /// allowed, otherwise try profile regeneration, otherwise pause.
    fn handle_prompt_rejection(
        &self,
        session: &mut Session,
        result: &ApprovalResult,
        gate_config: &GateConfig,
    ) -> Result<PromptRejection> {
        let gateway = self.gateway(session);

        if gate_config.allow_rewrite
            && let Some(content) = &result.suggested_content
        {
            gateway.write_prompt(session.current_iteration, session.phase, content)?;
            session.approval.pending = true;
            session.add_message("Suggested content applied to prompt file");
            self.store().save(session)?;
            return Ok(PromptRejection::Paused);
        }

        let profile = create_profile(&session.profile)?;
        if profile.metadata().can_regenerate_prompts
            && session.approval.retry_count <= gate_config.max_retries
        {
            let feedback = session.approval.feedback.clone().unwrap_or_default();
            match profile.regenerate_prompt(session.phase, &feedback, &session.context) {
                Ok(prompt) => {
                    gateway.write_prompt(session.current_iteration, session.phase, &prompt)?;
                    session.add_message("Prompt regenerated based on feedback");
                    return Ok(PromptRejection::Regenerated);
                }
                // Profile advertised the capability but does not implement
                // it for this phase; fall through to the pause branch.
                Err(EngineError::Unsupported(_)) => {}
                Err(e) => return Err(e),
            }
        }

        session.approval.pending = true;
        session.add_message(format!(
            "Prompt rejected: {}",
            session.approval.feedback.as_deref().unwrap_or("no feedback")
        ));
        self.store().save(session)?;
        Ok(PromptRejection::Paused)
    }

    /// RESPONSE-stage rejection: regenerate with the same prompt up to
    /// `max_retries` times, re-running the gate after each attempt. On
    /// exhaustion the workflow pauses for the operator; it is not an error.
    async fn handle_response_rejection(
        &self,
        session: &mut Session,
        result: &ApprovalResult,
        gate_config: &GateConfig,
    ) -> Result<Flow> {
        if gate_config.allow_rewrite
            && let Some(content) = &result.suggested_content
        {
            // Stored for the operator; never auto-applied to responses.
            session.approval.suggested_content = Some(content.clone());
            session.add_message("Suggested content available (not auto-applied)");
        }

        while gate_config.max_retries > 0 && session.approval.retry_count <= gate_config.max_retries
        {
            session.add_message(format!(
                "Retry {}/{}: regenerating with feedback",
                session.approval.retry_count, gate_config.max_retries
            ));

            if self.call_provider(session).await? {
                self.store().save(session)?;
                return Ok(Flow::Suspend);
            }

            let gateway = self.gateway(session);
            let retry_result = match self.gate().evaluate(session, &gateway, gate_config).await {
                Ok(result) => result,
                Err(e) if is_gate_error(&e) => {
                    return self.record_gate_error(session, &e);
                }
                Err(e) => return Err(e),
            };

            match retry_result.decision {
                ApprovalDecision::Pending => {
                    session.approval.pending = true;
                    self.store().save(session)?;
                    return Ok(Flow::Suspend);
                }
                ApprovalDecision::Approved => {
                    session.approval.clear();
                    self.emit_for(session, WorkflowEventType::ApprovalGranted);
                    return Ok(Flow::Continue);
                }
                ApprovalDecision::Rejected => {
                    session.approval.feedback = retry_result.feedback;
                    session.approval.retry_count += 1;
                }
            }
        }

        if gate_config.max_retries > 0 && session.approval.retry_count > gate_config.max_retries {
            session.last_error = Some(format!(
                "Approval rejected after {} attempts. Review feedback and retry manually or cancel.",
                session.approval.retry_count
            ));
            session.add_message(
                "Approval failed: max retries exceeded. Review feedback and retry or cancel.",
            );
        }

        session.approval.pending = true;
        self.store().save(session)?;
        Ok(Flow::Suspend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderAssignments;
    use tempfile::tempdir;

    fn setup(phase: WorkflowPhase, stage: WorkflowStage) -> (tempfile::TempDir, Session, SessionFileGateway) {
        let dir = tempdir().unwrap();
        let mut session = Session::new(
            "gate-test".to_string(),
            "java-entity".to_string(),
            ProviderAssignments::uniform("manual"),
            "file-bundle".to_string(),
            Map::new(),
        );
        session.enter_state(phase, Some(stage));
        let gateway = SessionFileGateway::new(dir.path().join("gate-test"));
        (dir, session, gateway)
    }

    #[test]
    fn test_files_include_stage_file_even_when_missing() {
        let (_dir, session, gateway) = setup(WorkflowPhase::Plan, WorkflowStage::Response);
        let files = ApprovalGateService::new()
            .build_approval_files(&session, &gateway)
            .unwrap();

        assert_eq!(files.len(), 1);
        let (path, content) = files.iter().next().unwrap();
        assert!(path.ends_with("planning-response.md"));
        assert!(content.is_none());
    }

    #[test]
    fn test_files_include_code_and_plan_for_generate_response() {
        let (_dir, session, gateway) = setup(WorkflowPhase::Generate, WorkflowStage::Response);
        gateway
            .write_response(1, WorkflowPhase::Generate, "resp")
            .unwrap();
        gateway.write_code_file(1, "Tier.java", "class Tier {}").unwrap();
        std::fs::create_dir_all(gateway.session_dir()).unwrap();
        std::fs::write(gateway.plan_path(), "the plan").unwrap();

        let files = ApprovalGateService::new()
            .build_approval_files(&session, &gateway)
            .unwrap();

        assert_eq!(files.len(), 3);
        assert!(files.keys().any(|k| k.ends_with("generation-response.md")));
        assert!(files.keys().any(|k| k.ends_with("code/Tier.java")));
        assert!(files.keys().any(|k| k.ends_with("plan.md")));
    }

    #[test]
    fn test_context_carries_gate_keys() {
        let (_dir, session, gateway) = setup(WorkflowPhase::Review, WorkflowStage::Prompt);
        let gate = GateConfig {
            approver: "skip".to_string(),
            max_retries: 2,
            allow_rewrite: true,
        };
        let context = ApprovalGateService::new().build_approval_context(&session, &gateway, &gate);

        assert_eq!(context["allow_rewrite"], json!(true));
        assert_eq!(context["phase"], json!("REVIEW"));
        assert_eq!(context["stage"], json!("PROMPT"));
        assert!(context["plan_file"].as_str().unwrap().ends_with("plan.md"));
    }
}
