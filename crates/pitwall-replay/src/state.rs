//! Playback state machine of one session.
//!
//! [`Replay`] is plain data with no I/O. The session actor owns exactly one
//! instance and is the only code that mutates it, so the clock cannot be
//! raced by concurrent viewers.
//!
//! ```text
//! Loading ─► Ready ─► Playing ⇄ Paused ─► Finished
//!               \        \        /         |
//!                └────► Seeking ◄┘◄─────────┘
//! any ─► Errored
//! ```

use pitwall_core::Command;

use crate::errors::ReplayError;

/// Lifecycle state of a session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    /// Telemetry is being fetched.
    Loading,
    /// Telemetry loaded, playback not started.
    Ready,
    /// The clock advances on every tick.
    Playing,
    /// The clock is stopped.
    Paused,
    /// A seek landed; the next tick emits a frame at the new position and
    /// then resumes the prior intent.
    Seeking {
        /// Return to `Playing` (true) or `Paused` (false) after the frame.
        resume_playing: bool,
    },
    /// The clock reached the end of the recording.
    Finished,
    /// The telemetry source failed. Absorbing.
    Errored {
        /// Failure description.
        reason: String,
    },
}

impl SessionState {
    /// Lowercase state name as sent in `status` events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Seeking { .. } => "seeking",
            Self::Finished => "finished",
            Self::Errored { .. } => "errored",
        }
    }

    /// Whether the clock is (or will be, after a seek) advancing.
    pub fn is_playing(&self) -> bool {
        matches!(
            self,
            Self::Playing
                | Self::Seeking {
                    resume_playing: true
                }
        )
    }
}

/// Accepted range of the speed multiplier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpeedLimits {
    /// Lower bound, inclusive.
    pub min: f64,
    /// Upper bound, inclusive.
    pub max: f64,
}

impl Default for SpeedLimits {
    fn default() -> Self {
        Self { min: 0.1, max: 20.0 }
    }
}

impl SpeedLimits {
    /// Accept `speed` when finite and within bounds.
    pub fn check(&self, speed: f64) -> Result<f64, ReplayError> {
        if speed.is_finite() && speed >= self.min && speed <= self.max {
            Ok(speed)
        } else {
            Err(ReplayError::InvalidSpeed {
                requested: speed,
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// The authoritative clock of a session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackClock {
    current_time_ms: f64,
    speed: f64,
}

impl PlaybackClock {
    /// Playback position, always within `0..=duration_ms`.
    pub fn current_time_ms(&self) -> f64 {
        self.current_time_ms
    }

    /// Speed multiplier.
    pub fn speed(&self) -> f64 {
        self.speed
    }
}

/// Result of advancing the clock by one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// Nothing to emit.
    Idle,
    /// Emit a frame at this position.
    Frame {
        /// Frame timestamp.
        time_ms: f64,
    },
    /// Emit the final frame at this position, then the terminal event.
    Finished {
        /// Frame timestamp (the session duration).
        time_ms: f64,
    },
}

/// State machine plus clock of one session.
#[derive(Clone, Debug)]
pub struct Replay {
    state: SessionState,
    clock: PlaybackClock,
    duration_ms: f64,
    limits: SpeedLimits,
    tick_interval_ms: f64,
}

impl Replay {
    /// New replay in `Loading` at speed 1.0 (or the nearest bound).
    pub fn new(limits: SpeedLimits, tick_interval_ms: f64) -> Self {
        Self {
            state: SessionState::Loading,
            clock: PlaybackClock {
                current_time_ms: 0.0,
                speed: 1.0_f64.clamp(limits.min, limits.max),
            },
            duration_ms: 0.0,
            limits,
            tick_interval_ms,
        }
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current clock.
    pub fn clock(&self) -> PlaybackClock {
        self.clock
    }

    /// Recording length.
    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Whether the clock is advancing.
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// `Loading → Ready` once the duration is known. Ignored in other states.
    pub fn ready(&mut self, duration_ms: f64) {
        if self.state == SessionState::Loading {
            self.duration_ms = if duration_ms.is_finite() {
                duration_ms.max(0.0)
            } else {
                0.0
            };
            self.state = SessionState::Ready;
        }
    }

    /// Enter the absorbing `Errored` state.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.state = SessionState::Errored {
            reason: reason.into(),
        };
    }

    /// Apply one command atomically. `Ping` and `Stop` are handled by the
    /// session actor and leave the state machine untouched.
    pub fn apply(&mut self, command: &Command) -> Result<(), ReplayError> {
        let action = command.action();
        if matches!(self.state, SessionState::Loading | SessionState::Errored { .. }) {
            if matches!(command, Command::Ping | Command::Stop) {
                return Ok(());
            }
            return Err(self.invalid(action));
        }

        match command {
            Command::Play => match self.state {
                SessionState::Ready | SessionState::Paused | SessionState::Playing => {
                    self.state = SessionState::Playing;
                }
                SessionState::Seeking { .. } => {
                    self.state = SessionState::Seeking {
                        resume_playing: true,
                    };
                }
                _ => return Err(self.invalid(action)),
            },
            Command::Pause => match self.state {
                SessionState::Playing => self.state = SessionState::Paused,
                SessionState::Seeking { .. } => {
                    self.state = SessionState::Seeking {
                        resume_playing: false,
                    };
                }
                _ => {}
            },
            Command::Seek { time_ms } => {
                let target = if time_ms.is_nan() { 0.0 } else { *time_ms };
                self.clock.current_time_ms = target.clamp(0.0, self.duration_ms);
                self.state = SessionState::Seeking {
                    resume_playing: self.state.is_playing(),
                };
            }
            Command::SetSpeed { speed } => {
                self.clock.speed = self.limits.check(*speed)?;
            }
            Command::Ping | Command::Stop => {}
        }
        Ok(())
    }

    /// Advance by one tick.
    pub fn tick(&mut self) -> TickOutcome {
        match self.state {
            SessionState::Playing => {
                let next = self.clock.current_time_ms + self.tick_interval_ms * self.clock.speed;
                if next >= self.duration_ms {
                    self.clock.current_time_ms = self.duration_ms;
                    self.state = SessionState::Finished;
                    TickOutcome::Finished {
                        time_ms: self.duration_ms,
                    }
                } else {
                    self.clock.current_time_ms = next;
                    TickOutcome::Frame { time_ms: next }
                }
            }
            SessionState::Seeking { resume_playing } => {
                self.state = if resume_playing {
                    SessionState::Playing
                } else {
                    SessionState::Paused
                };
                TickOutcome::Frame {
                    time_ms: self.clock.current_time_ms,
                }
            }
            _ => TickOutcome::Idle,
        }
    }

    fn invalid(&self, action: &'static str) -> ReplayError {
        ReplayError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}
