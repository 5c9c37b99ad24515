//! World state and action catalogue for the GOAP planner.
//!
//! `WorldState` is an immutable boolean mapping over a fixed proposition
//! set. `Action` pairs preconditions and effects with an integer cost.
//! These types carry no I/O; everything here is pure data plus pure
//! functions, which is what makes the planner in [`crate::planner`]
//! deterministic and trivially testable.

use std::collections::BTreeMap;
use std::fmt;

/// A closed enumeration of named propositions the planner reasons about.
///
/// Absent from a [`WorldState`] is equivalent to `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorldKey {
    TaskExists,
    PlanExists,
    BuildExists,
    ReviewPassed,
    ReviewRejected,
    RetryLimitReached,
    ReworkAttempted,
    TaskCompleted,
    TaskBlocked,
    SubTasksSpawned,
    SubTasksCompleted,
    AgentsAvailable,
    NegotiationComplete,
}

impl WorldKey {
    /// All keys, in a fixed declaration order (used nowhere for planning
    /// semantics, only for stable debug output).
    pub const ALL: [WorldKey; 13] = [
        WorldKey::TaskExists,
        WorldKey::PlanExists,
        WorldKey::BuildExists,
        WorldKey::ReviewPassed,
        WorldKey::ReviewRejected,
        WorldKey::RetryLimitReached,
        WorldKey::ReworkAttempted,
        WorldKey::TaskCompleted,
        WorldKey::TaskBlocked,
        WorldKey::SubTasksSpawned,
        WorldKey::SubTasksCompleted,
        WorldKey::AgentsAvailable,
        WorldKey::NegotiationComplete,
    ];
}

impl fmt::Display for WorldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TaskExists => "TaskExists",
            Self::PlanExists => "PlanExists",
            Self::BuildExists => "BuildExists",
            Self::ReviewPassed => "ReviewPassed",
            Self::ReviewRejected => "ReviewRejected",
            Self::RetryLimitReached => "RetryLimitReached",
            Self::ReworkAttempted => "ReworkAttempted",
            Self::TaskCompleted => "TaskCompleted",
            Self::TaskBlocked => "TaskBlocked",
            Self::SubTasksSpawned => "SubTasksSpawned",
            Self::SubTasksCompleted => "SubTasksCompleted",
            Self::AgentsAvailable => "AgentsAvailable",
            Self::NegotiationComplete => "NegotiationComplete",
        };
        f.write_str(s)
    }
}

/// An immutable boolean assignment over [`WorldKey`]. A `BTreeMap` backs
/// the map (rather than a `HashMap`) so that `Hash`/`Eq` are
/// order-independent and derivable for free, which the planner's closed
/// set relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WorldState {
    values: BTreeMap<WorldKey, bool>,
}

impl WorldState {
    /// An empty world state (every proposition false).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from an iterator of `(key, value)` pairs. Entries
    /// with `value == false` are dropped, since absence already means
    /// false -- this keeps equality/hash stable regardless of how a
    /// state was assembled.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (WorldKey, bool)>) -> Self {
        let mut state = Self::new();
        for (k, v) in pairs {
            state = state.with(k, v);
        }
        state
    }

    /// Look up a proposition. Absent keys are `false`.
    pub fn get(&self, key: WorldKey) -> bool {
        self.values.get(&key).copied().unwrap_or(false)
    }

    /// Return a new state with `key` set to `value`. Setting a key to
    /// `false` removes it from the backing map so that two states with
    /// the same "effective" assignment always compare equal.
    pub fn with(&self, key: WorldKey, value: bool) -> Self {
        let mut values = self.values.clone();
        if value {
            values.insert(key, true);
        } else {
            values.remove(&key);
        }
        Self { values }
    }

    /// `true` iff every `(key, value)` in `conds` matches this state.
    pub fn satisfies(&self, conds: &BTreeMap<WorldKey, bool>) -> bool {
        conds.iter().all(|(k, v)| self.get(*k) == *v)
    }

    /// The subset of `conds` that this state does *not* currently
    /// satisfy. Used both for the planner's heuristic and for surfacing
    /// "why is this plan's first step blocked" diagnostics.
    pub fn unsatisfied(&self, conds: &BTreeMap<WorldKey, bool>) -> Vec<WorldKey> {
        conds
            .iter()
            .filter(|(k, v)| self.get(**k) != **v)
            .map(|(k, _)| *k)
            .collect()
    }

    /// Merge an action's effects into this state, returning the
    /// successor state.
    pub fn apply(&self, action: &Action) -> Self {
        let mut next = self.clone();
        for (k, v) in &action.effects {
            next = next.with(*k, *v);
        }
        next
    }
}

/// A named precondition/effect pair with an integer cost, as specified
/// in the fixed action catalogue (Table A).
#[derive(Debug, Clone)]
pub struct Action {
    pub name: &'static str,
    pub preconditions: BTreeMap<WorldKey, bool>,
    pub effects: BTreeMap<WorldKey, bool>,
    pub cost: u32,
}

impl Action {
    fn new(
        name: &'static str,
        preconditions: &[(WorldKey, bool)],
        effects: &[(WorldKey, bool)],
        cost: u32,
    ) -> Self {
        Self {
            name,
            preconditions: preconditions.iter().copied().collect(),
            effects: effects.iter().copied().collect(),
            cost,
        }
    }

    /// `true` iff every precondition holds in `state`.
    pub fn is_applicable(&self, state: &WorldState) -> bool {
        state.satisfies(&self.preconditions)
    }
}

/// The fixed action catalogue (spec Table A), in canonical declaration
/// order. The planner iterates actions in this order so that equal-`f`
/// ties break deterministically (FIFO within priority).
pub fn catalogue() -> Vec<Action> {
    use WorldKey::*;
    vec![
        Action::new("Plan", &[(TaskExists, true)], &[(PlanExists, true)], 1),
        Action::new("Build", &[(PlanExists, true)], &[(BuildExists, true)], 3),
        Action::new(
            "Review",
            &[(BuildExists, true), (ReviewRejected, false)],
            &[(ReviewPassed, true)],
            2,
        ),
        Action::new(
            "Rework",
            &[(ReviewRejected, true), (RetryLimitReached, false)],
            &[
                (BuildExists, true),
                (ReviewRejected, false),
                (ReworkAttempted, true),
            ],
            4,
        ),
        Action::new(
            "Escalate",
            &[(ReviewRejected, true), (RetryLimitReached, true)],
            &[(TaskBlocked, true)],
            10,
        ),
        Action::new(
            "Finalize",
            &[(ReviewPassed, true)],
            &[(TaskCompleted, true)],
            1,
        ),
        Action::new(
            "WaitForSubTasks",
            &[(SubTasksSpawned, true), (SubTasksCompleted, false)],
            &[(SubTasksCompleted, true)],
            2,
        ),
        Action::new(
            "Negotiate",
            &[(TaskExists, true), (AgentsAvailable, true)],
            &[(NegotiationComplete, true)],
            1,
        ),
    ]
}

/// A named goal: the target proposition assignment the planner must
/// reach.
#[derive(Debug, Clone)]
pub struct Goal {
    pub name: &'static str,
    pub target_state: BTreeMap<WorldKey, bool>,
}

impl Goal {
    pub fn complete_task() -> Self {
        Self {
            name: "CompleteTask",
            target_state: [(WorldKey::TaskCompleted, true)].into_iter().collect(),
        }
    }

    pub fn escalate_task() -> Self {
        Self {
            name: "EscalateTask",
            target_state: [(WorldKey::TaskBlocked, true)].into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_key_is_false() {
        let state = WorldState::new();
        assert!(!state.get(WorldKey::TaskExists));
    }

    #[test]
    fn with_true_then_false_round_trips_to_empty_equivalent() {
        let a = WorldState::new();
        let b = a.with(WorldKey::TaskExists, true).with(WorldKey::TaskExists, false);
        assert_eq!(a, b);
    }

    #[test]
    fn satisfies_checks_every_condition() {
        let state = WorldState::new().with(WorldKey::TaskExists, true);
        let conds: BTreeMap<_, _> = [(WorldKey::TaskExists, true), (WorldKey::PlanExists, false)]
            .into_iter()
            .collect();
        assert!(state.satisfies(&conds));
    }

    #[test]
    fn unsatisfied_reports_mismatches_only() {
        let state = WorldState::new().with(WorldKey::TaskExists, true);
        let conds: BTreeMap<_, _> = [(WorldKey::TaskExists, true), (WorldKey::PlanExists, true)]
            .into_iter()
            .collect();
        assert_eq!(state.unsatisfied(&conds), vec![WorldKey::PlanExists]);
    }

    #[test]
    fn apply_merges_effects() {
        let action = catalogue().into_iter().find(|a| a.name == "Plan").unwrap();
        let state = WorldState::new().with(WorldKey::TaskExists, true);
        let next = state.apply(&action);
        assert!(next.get(WorldKey::PlanExists));
        assert!(next.get(WorldKey::TaskExists));
    }

    #[test]
    fn catalogue_has_eight_actions_in_declared_order() {
        let names: Vec<_> = catalogue().iter().map(|a| a.name).collect();
        assert_eq!(
            names,
            vec![
                "Plan",
                "Build",
                "Review",
                "Rework",
                "Escalate",
                "Finalize",
                "WaitForSubTasks",
                "Negotiate"
            ]
        );
    }

    #[test]
    fn action_applicability() {
        let build = catalogue().into_iter().find(|a| a.name == "Build").unwrap();
        assert!(!build.is_applicable(&WorldState::new()));
        let state = WorldState::new().with(WorldKey::PlanExists, true);
        assert!(build.is_applicable(&state));
    }

    #[test]
    fn hash_is_order_independent() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let a = WorldState::new()
            .with(WorldKey::TaskExists, true)
            .with(WorldKey::PlanExists, true);
        let b = WorldState::new()
            .with(WorldKey::PlanExists, true)
            .with(WorldKey::TaskExists, true);

        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);

        assert_eq!(a, b);
        assert_eq!(ha.finish(), hb.finish());
    }
}
