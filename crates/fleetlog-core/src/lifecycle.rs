use crate::CoreError;
use fleetlog_schema::TripStatus;

/// The trip state machine. `InUse` is representable but nothing enters or
/// leaves it.
pub fn validate_transition(from: TripStatus, to: TripStatus) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (
            TripStatus::Pending,
            TripStatus::Approved | TripStatus::Denied
        ) | (TripStatus::Approved, TripStatus::Completed)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TripStatus; 5] = [
        TripStatus::Pending,
        TripStatus::Approved,
        TripStatus::InUse,
        TripStatus::Completed,
        TripStatus::Denied,
    ];

    #[test]
    fn valid_transitions() {
        assert!(validate_transition(TripStatus::Pending, TripStatus::Approved).is_ok());
        assert!(validate_transition(TripStatus::Pending, TripStatus::Denied).is_ok());
        assert!(validate_transition(TripStatus::Approved, TripStatus::Completed).is_ok());
    }

    #[test]
    fn invalid_transitions() {
        assert!(validate_transition(TripStatus::Pending, TripStatus::Completed).is_err());
        assert!(validate_transition(TripStatus::Approved, TripStatus::Denied).is_err());
        assert!(validate_transition(TripStatus::Approved, TripStatus::Approved).is_err());
        assert!(validate_transition(TripStatus::Denied, TripStatus::Approved).is_err());
        assert!(validate_transition(TripStatus::Completed, TripStatus::Pending).is_err());
    }

    #[test]
    fn terminal_states_have_no_exit() {
        for to in ALL {
            assert!(validate_transition(TripStatus::Denied, to).is_err());
            assert!(validate_transition(TripStatus::Completed, to).is_err());
        }
    }

    #[test]
    fn in_use_is_unreachable() {
        for s in ALL {
            assert!(validate_transition(s, TripStatus::InUse).is_err());
            assert!(validate_transition(TripStatus::InUse, s).is_err());
        }
    }
}
