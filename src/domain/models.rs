use std::fmt;
use std::sync::Arc;

use crate::domain::ports::CommandChannel;

/// Power state written to a base station's control characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerCommand {
    /// Wake the base station up
    Activate,
    /// Put the base station to sleep
    Deactivate,
}

impl PowerCommand {
    /// Get the raw byte for this command
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Activate => 0x01,
            Self::Deactivate => 0x00,
        }
    }
}

impl fmt::Display for PowerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activate => write!(f, "activate"),
            Self::Deactivate => write!(f, "deactivate"),
        }
    }
}

/// Success flag plus a human readable message.
///
/// Every phase of the controller (binding, dispatch, host attachment) reports
/// through this one shape so callers have a single thing to render or log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub succeeded: bool,
    pub message: String,
}

impl OperationOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
        }
    }

    /// Severity used when rendering or logging this outcome
    pub fn severity(&self) -> MessageSeverity {
        if self.succeeded {
            MessageSeverity::Success
        } else {
            MessageSeverity::Error
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Success,
    Error,
}

/// One bound base station.
#[derive(Clone)]
pub struct Endpoint {
    /// 1-based position in discovery order, used for reporting
    pub display_index: usize,
    pub channel: Arc<dyn CommandChannel>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("display_index", &self.display_index)
            .field("uuid", &self.channel.uuid())
            .finish()
    }
}

/// States of the lifecycle coordinator.
///
/// ```text
/// Idle -> HostAttached | HostUnavailable
/// HostAttached -> Watching -> QuitObserved -> Deactivating -> Terminating
/// Watching -> Terminating   (cancelled manually before any quit event)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    HostAttached,
    HostUnavailable,
    Watching,
    QuitObserved,
    Deactivating,
    Terminating,
}

impl LifecycleState {
    fn rank(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::HostAttached | Self::HostUnavailable => 1,
            Self::Watching => 2,
            Self::QuitObserved => 3,
            Self::Deactivating => 4,
            Self::Terminating => 5,
        }
    }

    /// Whether moving from `self` to `next` keeps the state machine monotone
    pub fn can_advance_to(&self, next: LifecycleState) -> bool {
        match (self, next) {
            (Self::HostUnavailable, _) => false,
            (Self::Idle, Self::HostAttached | Self::HostUnavailable) => true,
            (Self::Idle, _) => false,
            (_, Self::HostUnavailable) => false,
            _ => next.rank() > self.rank(),
        }
    }
}
