//! Record types and validation rules for fleetlog.
//!
//! This crate defines the data model shared by the store, the trip engine and
//! the outer surfaces: vehicles, users, trip purposes, trip requests with their
//! status machine fields, maintenance entries, the singleton `Parameter` record
//! holding company data and per-liter fuel prices, and the `ValidationError`
//! raised when any of them is malformed.

pub mod fleet;
pub mod fuel;
pub mod trip;
pub mod types;
pub mod validate;

pub use fleet::{
    normalize_plate, CompanyProfile, Maintenance, NewMaintenance, NewVehicle, Parameter,
    ParameterPatch, Purpose, User, UserRole, Vehicle,
};
pub use fuel::{FuelPriceTable, FuelType};
pub use trip::{Completion, TripPatch, TripRequest, TripStatus};
pub use types::{MaintenanceId, PurposeId, TripId, UserId, VehicleId};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Blank(&'static str),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("invalid final odometer: {end} is below the start reading {start}")]
    InvalidOdometer { start: u64, end: u64 },
    #[error("unknown fuel type: {0}")]
    UnknownFuelType(String),
    #[error("unknown user role: {0}")]
    UnknownRole(String),
    #[error("unknown trip status: {0}")]
    UnknownStatus(String),
    #[error("inconsistent trip record {trip_id}: {reason}")]
    Inconsistent { trip_id: String, reason: String },
}

impl ValidationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
