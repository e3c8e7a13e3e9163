//! Workflow event fan-out for observer-pattern notifications.
//!
//! Emission is synchronous and best-effort: a failing observer is logged
//! and must never prevent delivery to subsequent observers.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::WorkflowPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEventType {
    PhaseEntered,
    ArtifactCreated,
    ArtifactApproved,
    ApprovalRequired,
    ApprovalGranted,
    WorkflowCompleted,
    WorkflowFailed,
    IterationStarted,
}

impl std::fmt::Display for WorkflowEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::PhaseEntered => "phase_entered",
            Self::ArtifactCreated => "artifact_created",
            Self::ArtifactApproved => "artifact_approved",
            Self::ApprovalRequired => "approval_required",
            Self::ApprovalGranted => "approval_granted",
            Self::WorkflowCompleted => "workflow_completed",
            Self::WorkflowFailed => "workflow_failed",
            Self::IterationStarted => "iteration_started",
        };
        f.write_str(name)
    }
}

/// Immutable event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub event_type: WorkflowEventType,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<WorkflowPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl WorkflowEvent {
    pub fn new(event_type: WorkflowEventType, session_id: impl Into<String>) -> Self {
        Self {
            event_type,
            session_id: session_id.into(),
            timestamp: Utc::now(),
            phase: None,
            iteration: None,
            artifact_path: None,
            metadata: Map::new(),
        }
    }

    pub fn with_phase(mut self, phase: WorkflowPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_iteration(mut self, iteration: u32) -> Self {
        self.iteration = Some(iteration);
        self
    }

    pub fn with_artifact_path(mut self, path: impl Into<String>) -> Self {
        self.artifact_path = Some(path.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Observer of workflow events. Implementations should be quick; failures
/// are logged by the emitter and never reach the orchestrator.
pub trait WorkflowObserver: Send + Sync {
    fn on_event(&self, event: &WorkflowEvent) -> anyhow::Result<()>;
}

struct Subscription {
    filter: Option<HashSet<WorkflowEventType>>,
    observer: Arc<dyn WorkflowObserver>,
}

/// Synchronous fan-out of events to subscribed observers.
#[derive(Default)]
pub struct WorkflowEventEmitter {
    subscriptions: Vec<Subscription>,
}

impl WorkflowEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe for all event types.
    pub fn subscribe(&mut self, observer: Arc<dyn WorkflowObserver>) {
        self.subscriptions.push(Subscription {
            filter: None,
            observer,
        });
    }

    /// Subscribe for a specific subset of event types.
    pub fn subscribe_filtered(
        &mut self,
        types: impl IntoIterator<Item = WorkflowEventType>,
        observer: Arc<dyn WorkflowObserver>,
    ) {
        self.subscriptions.push(Subscription {
            filter: Some(types.into_iter().collect()),
            observer,
        });
    }

    pub fn emit(&self, event: &WorkflowEvent) {
        for subscription in &self.subscriptions {
            if let Some(filter) = &subscription.filter
                && !filter.contains(&event.event_type)
            {
                continue;
            }
            if let Err(e) = subscription.observer.on_event(event) {
                tracing::warn!(
                    event_type = %event.event_type,
                    session = %event.session_id,
                    "observer failed: {e}"
                );
            }
        }
    }
}

/// Emits events as structured lines on stderr for CLI integration.
pub struct StderrEventObserver;

impl WorkflowObserver for StderrEventObserver {
    fn on_event(&self, event: &WorkflowEvent) -> anyhow::Result<()> {
        let mut parts = vec![format!("[EVENT] {}", event.event_type)];
        if let Some(phase) = event.phase {
            parts.push(format!("phase={phase}"));
        }
        if let Some(iteration) = event.iteration {
            parts.push(format!("iteration={iteration}"));
        }
        if let Some(path) = &event.artifact_path {
            parts.push(format!("path={path}"));
        }
        eprintln!("{}", parts.join(" "));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        seen: Mutex<Vec<WorkflowEventType>>,
    }

    impl WorkflowObserver for RecordingObserver {
        fn on_event(&self, event: &WorkflowEvent) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(event.event_type);
            Ok(())
        }
    }

    struct FailingObserver;

    impl WorkflowObserver for FailingObserver {
        fn on_event(&self, _event: &WorkflowEvent) -> anyhow::Result<()> {
            anyhow::bail!("observer exploded")
        }
    }

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let mut emitter = WorkflowEventEmitter::new();
        let first = Arc::new(RecordingObserver::default());
        let second = Arc::new(RecordingObserver::default());
        emitter.subscribe(first.clone());
        emitter.subscribe(second.clone());

        emitter.emit(&WorkflowEvent::new(WorkflowEventType::PhaseEntered, "s"));

        assert_eq!(first.seen.lock().unwrap().len(), 1);
        assert_eq!(second.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_filtered_subscription_only_sees_selected_types() {
        let mut emitter = WorkflowEventEmitter::new();
        let observer = Arc::new(RecordingObserver::default());
        emitter.subscribe_filtered([WorkflowEventType::WorkflowCompleted], observer.clone());

        emitter.emit(&WorkflowEvent::new(WorkflowEventType::PhaseEntered, "s"));
        emitter.emit(&WorkflowEvent::new(WorkflowEventType::WorkflowCompleted, "s"));

        let seen = observer.seen.lock().unwrap();
        assert_eq!(*seen, vec![WorkflowEventType::WorkflowCompleted]);
    }

    #[test]
    fn test_failing_observer_does_not_block_others() {
        let mut emitter = WorkflowEventEmitter::new();
        let recorder = Arc::new(RecordingObserver::default());
        emitter.subscribe(Arc::new(FailingObserver));
        emitter.subscribe(recorder.clone());

        emitter.emit(&WorkflowEvent::new(WorkflowEventType::ArtifactCreated, "s"));

        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }
}
