pub mod approval;
pub mod provider_result;
pub mod session;

pub use approval::{ApprovalConfig, ApprovalDecision, ApprovalResult, GateConfig};
pub use provider_result::{ProviderExecutionResult, ProviderResult};
pub use session::{
    ApprovalState, Artifact, HashedApproval, ProviderAssignments, Role, Session, SessionMessage,
    WorkflowPhase, WorkflowStage, WorkflowStatus, role_for_phase,
};
