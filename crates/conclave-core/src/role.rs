//! The [`Role`] enum and the `Action -> Role` mapping the coordinator
//! uses to decide who executes a planned step.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Planner,
    Builder,
    Reviewer,
    Orchestrator,
    Researcher,
    Debugger,
    Tester,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Planner => "Planner",
            Self::Builder => "Builder",
            Self::Reviewer => "Reviewer",
            Self::Orchestrator => "Orchestrator",
            Self::Researcher => "Researcher",
            Self::Debugger => "Debugger",
            Self::Tester => "Tester",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized role: {0}")]
pub struct RoleParseError(String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Planner" => Ok(Self::Planner),
            "Builder" => Ok(Self::Builder),
            "Reviewer" => Ok(Self::Reviewer),
            "Orchestrator" => Ok(Self::Orchestrator),
            "Researcher" => Ok(Self::Researcher),
            "Debugger" => Ok(Self::Debugger),
            "Tester" => Ok(Self::Tester),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

impl Role {
    /// The `modeFlag` value the role executor passes to adapters, per
    /// spec §4.3 step 2c.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Planner | Self::Reviewer | Self::Researcher | Self::Orchestrator => "plan",
            Self::Builder | Self::Debugger | Self::Tester => "act",
        }
    }
}

/// What the coordinator should do with a planned action, per spec §4.2
/// step 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionDisposition {
    /// Dispatch this role through the actor mesh and await the outcome.
    DispatchRole(Role),
    /// Handled inside the coordinator, no CLI call.
    Internal,
    /// The task reaches a terminal state; no further dispatch.
    Terminal,
    /// Block until every child task is `Done`.
    AwaitSubTasks,
}

/// Map a planned action's name to what the coordinator must do next.
/// `Finalize`/`Escalate` are terminal, `Negotiate` is internal,
/// `WaitForSubTasks` blocks on children, everything else dispatches a
/// role.
pub fn disposition_for(action_name: &str) -> ActionDisposition {
    match action_name {
        "Plan" => ActionDisposition::DispatchRole(Role::Planner),
        "Build" | "Rework" => ActionDisposition::DispatchRole(Role::Builder),
        "Review" => ActionDisposition::DispatchRole(Role::Reviewer),
        "Finalize" => ActionDisposition::Terminal,
        "Escalate" => ActionDisposition::Terminal,
        "WaitForSubTasks" => ActionDisposition::AwaitSubTasks,
        "Negotiate" => ActionDisposition::Internal,
        other => panic!("unknown action in catalogue: {other}"),
    }
}
