//! Recording controller lifecycle state machine

use std::fmt;
use thiserror::Error;

/// Controller lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Starting,
    Active,
    Paused,
    Stopping,
    Ended,
}

impl LifecycleState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Ended => "ended",
        }
    }

    /// Starting and Stopping only exist while a command is in flight
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }

    /// Whether the capture device is held in this state
    pub const fn holds_capture(&self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a guarded transition that may legitimately do nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state changed
    Applied,
    /// Duplicate or overlapping command; nothing changed
    Ignored,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        *self == Self::Applied
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while {current_state}")]
pub struct InvalidStateTransition {
    pub current_state: LifecycleState,
    pub action: String,
}

/// Controller lifecycle.
///
/// State machine:
///   IDLE -> STARTING (begin_start)
///   STARTING -> ACTIVE (complete_start)
///   STARTING -> IDLE (abort_start)
///   ACTIVE -> PAUSED (pause)
///   PAUSED -> ACTIVE (resume)
///   ACTIVE | PAUSED -> STOPPING (begin_stop)
///   STOPPING -> ENDED (complete_stop)
///   ENDED -> IDLE (release)
///
/// Commands that arrive while another one is in flight (STARTING or
/// STOPPING) are ignored instead of rejected, and `begin_start` outside
/// IDLE is always a no-op.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    /// Create a new lifecycle in idle state
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Idle,
        }
    }

    /// Get the current state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == LifecycleState::Idle
    }

    /// IDLE -> STARTING; a no-op from any other state
    pub fn begin_start(&mut self) -> Transition {
        if self.state != LifecycleState::Idle {
            return Transition::Ignored;
        }
        self.state = LifecycleState::Starting;
        Transition::Applied
    }

    /// STARTING -> ACTIVE
    pub fn complete_start(&mut self) -> Result<(), InvalidStateTransition> {
        self.require(LifecycleState::Starting, "complete start")?;
        self.state = LifecycleState::Active;
        Ok(())
    }

    /// STARTING -> IDLE (start failed)
    pub fn abort_start(&mut self) -> Result<(), InvalidStateTransition> {
        self.require(LifecycleState::Starting, "abort start")?;
        self.state = LifecycleState::Idle;
        Ok(())
    }

    /// ACTIVE -> PAUSED
    pub fn pause(&mut self) -> Result<Transition, InvalidStateTransition> {
        match self.state {
            LifecycleState::Active => {
                self.state = LifecycleState::Paused;
                Ok(Transition::Applied)
            }
            s if s.is_transient() => Ok(Transition::Ignored),
            _ => Err(self.invalid("pause")),
        }
    }

    /// PAUSED -> ACTIVE
    pub fn resume(&mut self) -> Result<Transition, InvalidStateTransition> {
        match self.state {
            LifecycleState::Paused => {
                self.state = LifecycleState::Active;
                Ok(Transition::Applied)
            }
            s if s.is_transient() => Ok(Transition::Ignored),
            _ => Err(self.invalid("resume")),
        }
    }

    /// ACTIVE | PAUSED -> STOPPING
    pub fn begin_stop(&mut self) -> Result<Transition, InvalidStateTransition> {
        match self.state {
            LifecycleState::Active | LifecycleState::Paused => {
                self.state = LifecycleState::Stopping;
                Ok(Transition::Applied)
            }
            s if s.is_transient() => Ok(Transition::Ignored),
            _ => Err(self.invalid("stop")),
        }
    }

    /// STOPPING -> ENDED
    pub fn complete_stop(&mut self) -> Result<(), InvalidStateTransition> {
        self.require(LifecycleState::Stopping, "complete stop")?;
        self.state = LifecycleState::Ended;
        Ok(())
    }

    /// ENDED -> IDLE
    pub fn release(&mut self) -> Result<(), InvalidStateTransition> {
        self.require(LifecycleState::Ended, "release session")?;
        self.state = LifecycleState::Idle;
        Ok(())
    }

    fn require(
        &self,
        expected: LifecycleState,
        action: &str,
    ) -> Result<(), InvalidStateTransition> {
        if self.state != expected {
            return Err(self.invalid(action));
        }
        Ok(())
    }

    fn invalid(&self, action: &str) -> InvalidStateTransition {
        InvalidStateTransition {
            current_state: self.state,
            action: action.to_string(),
        }
    }
}
