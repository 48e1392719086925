use crate::StoreError;
use chrono::{DateTime, Utc};
use fleetlog_schema::{
    Completion, FuelPriceTable, Maintenance, MaintenanceId, Parameter, ParameterPatch, Purpose,
    PurposeId, TripId, TripPatch, TripRequest, TripStatus, User, UserId, Vehicle, VehicleId,
};
use thiserror::Error;
use tracing::warn;

/// Outcome of a failed [`EntityStore::commit_completion`].
#[derive(Debug, Error)]
pub enum CompletionFailure {
    /// Nothing was written, or every write was undone.
    #[error(transparent)]
    Rejected(StoreError),
    /// Some writes landed and could not be undone.
    #[error("completion left partially applied (trip written: {trip_written}, vehicle written: {vehicle_written}): {reason}")]
    Partial {
        trip_written: bool,
        vehicle_written: bool,
        reason: String,
    },
}

impl From<StoreError> for CompletionFailure {
    fn from(e: StoreError) -> Self {
        CompletionFailure::Rejected(e)
    }
}

/// Persistence contract used by the trip engine.
///
/// Implementations must be safe to share across threads. `update_trip` is a
/// compare-and-set on the trip's status: the patch is applied only if the
/// stored status still equals `expected`, otherwise the call fails with
/// [`StoreError::StatusConflict`] and nothing is written.
pub trait EntityStore: Send + Sync {
    fn get_vehicle(&self, id: &VehicleId) -> Result<Vehicle, StoreError>;
    fn list_vehicles(&self) -> Result<Vec<Vehicle>, StoreError>;
    /// Fails with `AlreadyExists` on a duplicate id or plate.
    fn insert_vehicle(&self, vehicle: &Vehicle) -> Result<(), StoreError>;
    fn set_vehicle_active(&self, id: &VehicleId, active: bool) -> Result<Vehicle, StoreError>;
    /// Unconditional odometer write, used by completion.
    fn update_vehicle_odometer(&self, id: &VehicleId, odometer: u64) -> Result<Vehicle, StoreError>;
    /// Administrative correction. Atomically refuses with `OdometerRefused`
    /// when `odometer` is below the current reading or when any trip on the
    /// vehicle is in flight.
    fn adjust_vehicle_odometer(&self, id: &VehicleId, odometer: u64)
        -> Result<Vehicle, StoreError>;

    fn get_user(&self, id: &UserId) -> Result<User, StoreError>;
    fn list_users(&self) -> Result<Vec<User>, StoreError>;
    fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    fn set_user_active(&self, id: &UserId, active: bool) -> Result<User, StoreError>;

    fn get_purpose(&self, id: &PurposeId) -> Result<Purpose, StoreError>;
    fn list_purposes(&self) -> Result<Vec<Purpose>, StoreError>;
    /// Fails with `AlreadyExists` on a duplicate id or case-insensitive name.
    fn insert_purpose(&self, purpose: &Purpose) -> Result<(), StoreError>;
    fn remove_purpose(&self, id: &PurposeId) -> Result<(), StoreError>;

    fn list_maintenance(&self) -> Result<Vec<Maintenance>, StoreError>;
    fn insert_maintenance(&self, record: &Maintenance) -> Result<(), StoreError>;
    fn remove_maintenance(&self, id: &MaintenanceId) -> Result<(), StoreError>;

    /// The singleton parameter record, or its default when none was saved.
    fn get_parameter(&self) -> Result<Parameter, StoreError>;
    /// Apply `patch` to the current parameter record as one atomic
    /// read-modify-write and return the result.
    fn update_parameter(&self, patch: &ParameterPatch) -> Result<Parameter, StoreError>;

    fn get_fuel_prices(&self) -> Result<FuelPriceTable, StoreError> {
        Ok(self.get_parameter()?.fuel_prices)
    }

    fn get_trip(&self, id: &TripId) -> Result<TripRequest, StoreError>;
    fn list_trips(&self) -> Result<Vec<TripRequest>, StoreError>;
    fn create_trip(&self, trip: &TripRequest) -> Result<(), StoreError>;
    fn update_trip(
        &self,
        id: &TripId,
        expected: TripStatus,
        patch: &TripPatch,
    ) -> Result<TripRequest, StoreError>;

    /// Move a `Pending` trip to `Approved`, snapshotting its vehicle's
    /// odometer in the same atomic step as the status check.
    fn approve_trip(
        &self,
        id: &TripId,
        approved_by: &UserId,
        approved_at: DateTime<Utc>,
    ) -> Result<TripRequest, StoreError>;

    /// Write a trip's completion and its vehicle's new odometer as one unit.
    ///
    /// The trip must currently be `Approved`. The default implementation is
    /// [`two_step_completion`]; stores with a transaction facility override it.
    fn commit_completion(
        &self,
        trip_id: &TripId,
        vehicle_id: &VehicleId,
        completion: &Completion,
    ) -> Result<TripRequest, CompletionFailure> {
        two_step_completion(self, trip_id, vehicle_id, completion)
    }
}

/// Shared refusal rules for [`EntityStore::adjust_vehicle_odometer`]. Callers
/// hold their write lock while reading `trips` and calling this.
pub(crate) fn check_odometer_adjustment<'a>(
    vehicle: &Vehicle,
    odometer: u64,
    trips: impl IntoIterator<Item = &'a TripRequest>,
) -> Result<(), StoreError> {
    let refuse = |reason: String| StoreError::OdometerRefused {
        vehicle_id: vehicle.id.to_string(),
        reason,
    };
    if odometer < vehicle.current_odometer {
        return Err(refuse(format!(
            "{odometer} is below the current reading {}",
            vehicle.current_odometer
        )));
    }
    let in_flight = trips
        .into_iter()
        .filter(|t| t.vehicle_id == vehicle.id && t.status.is_in_flight())
        .count();
    if in_flight > 0 {
        return Err(refuse(format!(
            "vehicle has {in_flight} approved trip(s) in progress"
        )));
    }
    Ok(())
}

/// Completion for stores without transactions: CAS the trip to `Completed`,
/// then write the odometer. If the odometer write fails, the trip is reverted
/// with a compensating CAS. Only a failed compensation yields `Partial`.
pub fn two_step_completion<S: EntityStore + ?Sized>(
    store: &S,
    trip_id: &TripId,
    vehicle_id: &VehicleId,
    completion: &Completion,
) -> Result<TripRequest, CompletionFailure> {
    let previous_notes = if completion.notes.is_some() {
        store.get_trip(trip_id)?.notes
    } else {
        None
    };
    let completed = store.update_trip(
        trip_id,
        TripStatus::Approved,
        &TripPatch::Complete(completion.clone()),
    )?;

    let vehicle_err = match store.update_vehicle_odometer(vehicle_id, completion.end_odometer) {
        Ok(_) => return Ok(completed),
        Err(e) => e,
    };

    warn!("odometer write for {vehicle_id} failed, reverting {trip_id}: {vehicle_err}");
    // Without new notes the completion left the stored ones alone.
    let revert = TripPatch::RevertCompletion {
        previous_notes: if completion.notes.is_some() {
            previous_notes
        } else {
            completed.notes.clone()
        },
    };
    match store.update_trip(trip_id, TripStatus::Completed, &revert) {
        Ok(_) => Err(CompletionFailure::Rejected(vehicle_err)),
        Err(revert_err) => Err(CompletionFailure::Partial {
            trip_written: true,
            vehicle_written: false,
            reason: format!("{vehicle_err}; revert failed: {revert_err}"),
        }),
    }
}
