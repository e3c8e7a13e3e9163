//! Declarative state machine for workflow transitions.
//!
//! Maps `(phase, stage, command)` to the next state and the action to run
//! after entering it. Work happens AFTER the state changes; REVIEW[RESPONSE]
//! is the one state where the verdict decides between COMPLETE and REVISE.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::models::{WorkflowPhase, WorkflowStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowCommand {
    Init,
    Approve,
    ApproveComplete,
    ApproveRevise,
    Reject,
    Cancel,
}

impl WorkflowCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Approve => "approve",
            Self::ApproveComplete => "approve_complete",
            Self::ApproveRevise => "approve_revise",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
        }
    }

    /// Commands that trigger pre-transition approval side effects.
    pub fn is_approval(self) -> bool {
        matches!(self, Self::Approve | Self::ApproveComplete | Self::ApproveRevise)
    }
}

impl std::fmt::Display for WorkflowCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action the dispatcher executes after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreatePrompt,
    CallAi,
    CheckVerdict,
    Finalize,
    Halt,
    Cancel,
}

/// Value returned by a successful table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub phase: WorkflowPhase,
    pub stage: Option<WorkflowStage>,
    pub action: Action,
}

type TransitionKey = (WorkflowPhase, Option<WorkflowStage>, WorkflowCommand);

static TRANSITIONS: Lazy<HashMap<TransitionKey, Transition>> = Lazy::new(|| {
    use Action::*;
    use WorkflowCommand as Cmd;
    use WorkflowPhase::*;
    use WorkflowStage::{Prompt, Response};

    let mut table = HashMap::new();
    let mut insert = |phase, stage, command, next: Transition| {
        table.insert((phase, stage, command), next);
    };
    let to = |phase, stage, action| Transition {
        phase,
        stage,
        action,
    };

    // INIT
    insert(Init, None, Cmd::Init, to(Plan, Some(Prompt), CreatePrompt));

    // PLAN
    insert(Plan, Some(Prompt), Cmd::Approve, to(Plan, Some(Response), CallAi));
    insert(Plan, Some(Response), Cmd::Approve, to(Generate, Some(Prompt), CreatePrompt));
    insert(Plan, Some(Response), Cmd::Reject, to(Plan, Some(Response), Halt));

    // GENERATE
    insert(Generate, Some(Prompt), Cmd::Approve, to(Generate, Some(Response), CallAi));
    insert(Generate, Some(Response), Cmd::Approve, to(Review, Some(Prompt), CreatePrompt));
    insert(Generate, Some(Response), Cmd::Reject, to(Generate, Some(Response), Halt));

    // REVIEW
    insert(Review, Some(Prompt), Cmd::Approve, to(Review, Some(Response), CallAi));
    // Plain approve defers to the reviewer's verdict; the override
    // commands express the human disagreeing with it.
    insert(Review, Some(Response), Cmd::Approve, to(Review, Some(Response), CheckVerdict));
    insert(Review, Some(Response), Cmd::ApproveComplete, to(Complete, None, Finalize));
    insert(Review, Some(Response), Cmd::ApproveRevise, to(Revise, Some(Prompt), CreatePrompt));
    insert(Review, Some(Response), Cmd::Reject, to(Review, Some(Response), Halt));

    // REVISE
    insert(Revise, Some(Prompt), Cmd::Approve, to(Revise, Some(Response), CallAi));
    insert(Revise, Some(Response), Cmd::Approve, to(Review, Some(Prompt), CreatePrompt));
    insert(Revise, Some(Response), Cmd::Reject, to(Revise, Some(Response), Halt));

    // cancel is accepted from every active state
    let active_states: &[(WorkflowPhase, Option<WorkflowStage>)] = &[
        (Init, None),
        (Plan, Some(Prompt)),
        (Plan, Some(Response)),
        (Generate, Some(Prompt)),
        (Generate, Some(Response)),
        (Review, Some(Prompt)),
        (Review, Some(Response)),
        (Revise, Some(Prompt)),
        (Revise, Some(Response)),
    ];
    for &(phase, stage) in active_states {
        insert(phase, stage, Cmd::Cancel, to(Cancelled, None, Cancel));
    }

    table
});

/// Pure lookup. `None` means the command is invalid in this state;
/// terminal states have no entries at all.
pub fn lookup(
    phase: WorkflowPhase,
    stage: Option<WorkflowStage>,
    command: WorkflowCommand,
) -> Option<Transition> {
    TRANSITIONS.get(&(phase, stage, command)).copied()
}

/// Commands accepted from a state, sorted for stable display.
pub fn valid_commands(phase: WorkflowPhase, stage: Option<WorkflowStage>) -> Vec<WorkflowCommand> {
    let mut commands: Vec<WorkflowCommand> = TRANSITIONS
        .keys()
        .filter(|(p, s, _)| *p == phase && *s == stage)
        .map(|(_, _, c)| *c)
        .collect();
    commands.sort_by_key(|c| c.as_str());
    commands
}
