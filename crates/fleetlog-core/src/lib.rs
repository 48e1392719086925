//! Trip lifecycle engine for fleetlog.
//!
//! The `Engine` owns the trip state machine (`Pending -> Approved -> Completed`,
//! `Pending -> Denied`) and the vehicle odometer side effect of completion. It
//! works against any [`EntityStore`](fleetlog_store::EntityStore); the default
//! is the file-backed store. The consumption calculator and report projections
//! are pure functions over records read from the store.

pub mod admin;
pub mod config;
pub mod consumption;
pub mod engine;
pub mod lifecycle;
pub mod report;

pub use config::{ConfigError, FleetConfig};
pub use consumption::{average_consumption, compute_distance, compute_refuel_cost};
pub use engine::{CompletionInput, Engine, NewTripRequest, RequesterIdentity, TripFilter};
pub use lifecycle::validate_transition;
pub use report::{
    aggregate_by_key, Aggregate, Dashboard, Grouped, Hundredths, MaintenanceReport,
    MaintenanceRow, Report, ReportKey, ReportRow,
};

use fleetlog_schema::{TripStatus, ValidationError};
use fleetlog_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: TripStatus, to: TripStatus },
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("store error: {0}")]
    Storage(StoreError),
    /// The completion transaction diverged. The flags say which record holds
    /// the new values so an operator can reconcile by hand.
    #[error(
        "partial completion of trip {trip_id} on vehicle {vehicle_id} \
         (trip written: {trip_written}, vehicle written: {vehicle_written}): {reason}"
    )]
    PartialCompletion {
        trip_id: String,
        vehicle_id: String,
        trip_written: bool,
        vehicle_written: bool,
        reason: String,
    },
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind, id } => CoreError::NotFound { kind, id },
            StoreError::AlreadyExists { kind, id } => {
                CoreError::Validation(ValidationError::Invalid {
                    field: kind,
                    reason: format!("'{id}' is already registered"),
                })
            }
            StoreError::OdometerRefused { reason, .. } => {
                CoreError::Validation(ValidationError::Invalid {
                    field: "odometer",
                    reason,
                })
            }
            other => CoreError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_not_found() {
        let e: CoreError = StoreError::NotFound {
            kind: "trip",
            id: "trip-1".to_owned(),
        }
        .into();
        assert!(matches!(e, CoreError::NotFound { kind: "trip", .. }));
        assert_eq!(e.to_string(), "trip not found: trip-1");
    }

    #[test]
    fn store_duplicate_maps_to_validation() {
        let e: CoreError = StoreError::AlreadyExists {
            kind: "vehicle plate",
            id: "ABC-1234".to_owned(),
        }
        .into();
        assert!(matches!(e, CoreError::Validation(_)));
        assert!(e.to_string().contains("ABC-1234"));
    }

    #[test]
    fn refused_odometer_maps_to_validation() {
        let e: CoreError = StoreError::OdometerRefused {
            vehicle_id: "veh-1".to_owned(),
            reason: "vehicle has 1 approved trip(s) in progress".to_owned(),
        }
        .into();
        assert!(matches!(
            e,
            CoreError::Validation(ValidationError::Invalid {
                field: "odometer",
                ..
            })
        ));
    }

    #[test]
    fn store_io_maps_to_storage() {
        let e: CoreError = StoreError::LockTimeout(100).into();
        assert!(matches!(e, CoreError::Storage(_)));
        assert!(e.to_string().starts_with("store error:"));
    }

    #[test]
    fn partial_completion_names_both_halves() {
        let e = CoreError::PartialCompletion {
            trip_id: "trip-1".to_owned(),
            vehicle_id: "veh-1".to_owned(),
            trip_written: true,
            vehicle_written: false,
            reason: "disk full".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("trip written: true"));
        assert!(msg.contains("vehicle written: false"));
    }
}
