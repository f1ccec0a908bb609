//! Room lifecycle state machine.
//!
//! Unlike ephemeral in-process state, room status is durable: the machine is
//! a pure transition table validated before the store is written.

use thiserror::Error;

use crate::dao::models::RoomStatus;

/// Host-initiated lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomLifecycleEvent {
    /// Start the session.
    Start,
    /// Cancel the room; terminal.
    Cancel,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// Status the room was in when the invalid event was received.
    pub from: RoomStatus,
    /// The event that cannot be applied from this status.
    pub event: RoomLifecycleEvent,
}

/// Compute the status reached by applying `event` from `from`.
///
/// `Start` from `Active` is accepted and yields `Active` again so retried
/// start requests stay no-ops. `Cancelled` has no outgoing transitions.
pub fn next_status(
    from: RoomStatus,
    event: RoomLifecycleEvent,
) -> Result<RoomStatus, InvalidTransition> {
    match (from, event) {
        (RoomStatus::Waiting, RoomLifecycleEvent::Start) => Ok(RoomStatus::Active),
        (RoomStatus::Active, RoomLifecycleEvent::Start) => Ok(RoomStatus::Active),
        (RoomStatus::Waiting | RoomStatus::Active, RoomLifecycleEvent::Cancel) => {
            Ok(RoomStatus::Cancelled)
        }
        (from, event) => Err(InvalidTransition { from, event }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiting_starts_into_active() {
        assert_eq!(
            next_status(RoomStatus::Waiting, RoomLifecycleEvent::Start),
            Ok(RoomStatus::Active)
        );
    }

    #[test]
    fn retried_start_is_a_noop() {
        assert_eq!(
            next_status(RoomStatus::Active, RoomLifecycleEvent::Start),
            Ok(RoomStatus::Active)
        );
    }

    #[test]
    fn cancel_reachable_from_waiting_and_active() {
        assert_eq!(
            next_status(RoomStatus::Waiting, RoomLifecycleEvent::Cancel),
            Ok(RoomStatus::Cancelled)
        );
        assert_eq!(
            next_status(RoomStatus::Active, RoomLifecycleEvent::Cancel),
            Ok(RoomStatus::Cancelled)
        );
    }

    #[test]
    fn cancelled_is_terminal() {
        for event in [RoomLifecycleEvent::Start, RoomLifecycleEvent::Cancel] {
            let err = next_status(RoomStatus::Cancelled, event).unwrap_err();
            assert_eq!(err.from, RoomStatus::Cancelled);
            assert_eq!(err.event, event);
        }
    }
}
