//! Client heartbeat bookkeeping.

/// What to do on a heartbeat tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Send a `ping` command.
    SendPing,
    /// Too many pings went unanswered; force a reconnect.
    TimedOut,
}

/// Counts unanswered pings.
#[derive(Clone, Debug)]
pub struct HeartbeatMonitor {
    max_missed: u32,
    outstanding: u32,
}

impl HeartbeatMonitor {
    /// Monitor that times out after `max_missed` unanswered pings (at least one).
    pub fn new(max_missed: u32) -> Self {
        Self {
            max_missed: max_missed.max(1),
            outstanding: 0,
        }
    }

    /// Called once per heartbeat interval.
    pub fn on_tick(&mut self) -> HeartbeatAction {
        if self.outstanding >= self.max_missed {
            return HeartbeatAction::TimedOut;
        }
        self.outstanding += 1;
        HeartbeatAction::SendPing
    }

    /// A `pong` arrived.
    pub fn on_ack(&mut self) {
        self.outstanding = 0;
    }

    /// Pings sent since the last `pong`.
    pub fn outstanding(&self) -> u32 {
        self.outstanding
    }
}
