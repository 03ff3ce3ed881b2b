//! Worker lifecycle as a pure state machine.
//!
//! `Idle → Installing → Waiting → Activating → Active`, with `Redundant` as
//! the terminal state for failed installs and replaced workers. The
//! transition function performs no I/O; the registration executes the
//! returned effects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::config::UpdatePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Installing,
    Waiting,
    Activating,
    Active,
    Redundant,
}

impl WorkerState {
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Activating | WorkerState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Redundant)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Idle => "idle",
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Install,
    InstallSucceeded,
    InstallFailed,
    SkipWaiting,
    Activate,
    ActivationFinished,
    /// A newer worker took this one's slot.
    Replaced,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleEvent::Install => "install",
            LifecycleEvent::InstallSucceeded => "install_succeeded",
            LifecycleEvent::InstallFailed => "install_failed",
            LifecycleEvent::SkipWaiting => "skip_waiting",
            LifecycleEvent::Activate => "activate",
            LifecycleEvent::ActivationFinished => "activation_finished",
            LifecycleEvent::Replaced => "replaced",
        };
        f.write_str(s)
    }
}

/// Side effects the host must carry out after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Precache,
    /// Deliver `Activate` to this worker now.
    Activate,
    CollectGarbage,
    ClaimClients,
    BroadcastUpdated,
}

/// Facts about the surroundings that steer a transition.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleContext {
    /// Another worker currently controls pages.
    pub has_active: bool,
    pub policy: UpdatePolicy,
    /// A skip-waiting message arrived while this worker was installing.
    pub skip_waiting_requested: bool,
    pub broadcast_updates: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: WorkerState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: WorkerState) -> Self {
        Self { next, effects: Vec::new() }
    }

    fn with(next: WorkerState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }
}

/// Compute the next state and the effects of delivering `event` in `state`.
pub fn transition(state: WorkerState, event: LifecycleEvent, ctx: &LifecycleContext) -> Result<Transition, Error> {
    use LifecycleEvent as E;
    use WorkerState as S;

    let t = match (state, event) {
        (S::Idle, E::Install) => Transition::with(S::Installing, vec![Effect::Precache]),

        (S::Installing, E::InstallSucceeded) => {
            // The first worker of a registration is promoted regardless of policy.
            let promote =
                !ctx.has_active || ctx.policy == UpdatePolicy::SkipWaiting || ctx.skip_waiting_requested;
            if promote {
                Transition::with(S::Waiting, vec![Effect::Activate])
            } else {
                Transition::to(S::Waiting)
            }
        }
        (S::Installing, E::InstallFailed) => Transition::to(S::Redundant),
        (S::Installing, E::SkipWaiting) => Transition::to(S::Installing),

        (S::Waiting, E::SkipWaiting) => Transition::with(S::Waiting, vec![Effect::Activate]),
        (S::Waiting, E::Activate) => {
            let mut effects = vec![Effect::CollectGarbage, Effect::ClaimClients];
            if ctx.broadcast_updates {
                effects.push(Effect::BroadcastUpdated);
            }
            Transition::with(S::Activating, effects)
        }

        (S::Activating, E::ActivationFinished) => Transition::to(S::Active),
        (S::Active, E::SkipWaiting) => Transition::to(S::Active),

        (S::Installing | S::Waiting | S::Activating | S::Active, E::Replaced) => Transition::to(S::Redundant),

        (state, event) => return Err(Error::InvalidState { state: state.to_string(), event: event.to_string() }),
    };

    Ok(t)
}
