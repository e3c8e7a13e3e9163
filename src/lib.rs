pub mod approval;
pub mod config;
pub mod errors;
pub mod events;
pub mod hashing;
pub mod models;
pub mod orchestrator;
pub mod profiles;
pub mod providers;
pub mod registry;
pub mod standards;
pub mod storage;
pub mod validation;

// Re-export main types
pub use config::EngineConfig;
pub use errors::{ContextError, EngineError};
pub use events::{
    StderrEventObserver, WorkflowEvent, WorkflowEventEmitter, WorkflowEventType, WorkflowObserver,
};
pub use models::{
    ApprovalConfig, ApprovalDecision, ApprovalResult, Artifact, GateConfig, ProviderAssignments,
    Role, Session, WorkflowPhase, WorkflowStage, WorkflowStatus,
};
pub use orchestrator::{
    Action, ReviewOverride, Transition, WorkflowCommand, WorkflowOrchestrator,
};
pub use profiles::{JavaEntityProfile, WorkflowProfile, register_builtin_profiles};
pub use providers::{
    ClaudeCodeProvider, GeminiCliProvider, ManualProvider, ProviderExecutionService,
    ResponseProvider, register_builtin_providers,
};
pub use standards::{FileBundleStandardsProvider, StandardsProvider};
pub use storage::{SessionFileGateway, SessionStore};

pub use approval::{Approver, ManualApprover, SkipApprover, register_builtin_approvers};

/// Register every built-in collaborator. Call once at startup before any
/// session runs.
pub fn register_builtins() {
    register_builtin_providers();
    register_builtin_approvers();
    register_builtin_profiles();
}
