//! Reconnection state machine.
//!
//! [`transition`] is pure: it maps a state and an event to the next state
//! and at most one [`Effect`] for the driver to perform. Timers and dials
//! happen outside and are reported back as events.

use std::time::Duration;

use crate::backoff::ReconnectPolicy;

/// Connection lifecycle as seen by the viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconnectState {
    /// The socket is open.
    Connected,
    /// The socket dropped; a retry timer is pending.
    Disconnected {
        /// Dials that have failed since the last successful connection.
        failed_attempts: u32,
    },
    /// A dial is in flight.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Retries are exhausted. Terminal.
    GivenUp {
        /// Attempts made.
        attempts: u32,
    },
}

impl ReconnectState {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Reconnecting { .. } => "reconnecting",
            Self::GivenUp { .. } => "given_up",
        }
    }

    /// Whether no further transitions will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GivenUp { .. })
    }
}

/// Inputs to the machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectEvent {
    /// The transport reported a close or read error.
    TransportClosed,
    /// Too many heartbeats went unanswered.
    HeartbeatTimedOut,
    /// The scheduled retry delay elapsed.
    RetryTimerFired,
    /// The pending dial connected.
    DialSucceeded,
    /// The pending dial failed.
    DialFailed,
}

/// Work the driver performs after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Wait `delay`, then report [`ReconnectEvent::RetryTimerFired`].
    ScheduleReconnect {
        /// Attempt the timer leads to.
        attempt: u32,
        /// How long to wait.
        delay: Duration,
    },
    /// Open a new socket, then report the outcome.
    Dial {
        /// 1-based attempt number.
        attempt: u32,
    },
    /// Stop retrying and tell the caller.
    GiveUp {
        /// Attempts made.
        attempts: u32,
    },
}

/// Next state and effect for `event` in `state`.
///
/// Events that do not apply to the current state leave it unchanged and
/// produce no effect.
pub fn transition(
    state: &ReconnectState,
    event: ReconnectEvent,
    policy: &ReconnectPolicy,
) -> (ReconnectState, Option<Effect>) {
    use ReconnectEvent as E;
    use ReconnectState as S;

    match (state, event) {
        (S::Connected, E::TransportClosed | E::HeartbeatTimedOut) => {
            schedule_or_give_up(0, policy)
        }
        (S::Disconnected { failed_attempts }, E::RetryTimerFired) => {
            let attempt = failed_attempts + 1;
            (S::Reconnecting { attempt }, Some(Effect::Dial { attempt }))
        }
        (S::Reconnecting { .. }, E::DialSucceeded) => (S::Connected, None),
        (S::Reconnecting { attempt }, E::DialFailed) => schedule_or_give_up(*attempt, policy),
        (other, _) => (other.clone(), None),
    }
}

fn schedule_or_give_up(
    failed_attempts: u32,
    policy: &ReconnectPolicy,
) -> (ReconnectState, Option<Effect>) {
    let next = failed_attempts + 1;
    if policy.allows(next) {
        (
            ReconnectState::Disconnected { failed_attempts },
            Some(Effect::ScheduleReconnect {
                attempt: next,
                delay: policy.delay_for(next),
            }),
        )
    } else {
        (
            ReconnectState::GivenUp {
                attempts: failed_attempts,
            },
            Some(Effect::GiveUp {
                attempts: failed_attempts,
            }),
        )
    }
}

/// A [`ReconnectState`] bound to its policy.
#[derive(Clone, Debug)]
pub struct ReconnectMachine {
    policy: ReconnectPolicy,
    state: ReconnectState,
}

impl ReconnectMachine {
    /// Machine for a freshly opened connection.
    pub fn connected(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ReconnectState::Connected,
        }
    }

    /// Current state.
    pub fn state(&self) -> &ReconnectState {
        &self.state
    }

    /// Reconnect policy.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Feed one event; returns the effect to perform.
    pub fn handle(&mut self, event: ReconnectEvent) -> Option<Effect> {
        let (next, effect) = transition(&self.state, event, &self.policy);
        self.state = next;
        effect
    }
}
