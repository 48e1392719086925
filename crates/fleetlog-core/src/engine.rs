use crate::config::FleetConfig;
use crate::consumption::{compute_distance, compute_refuel_cost};
use crate::lifecycle::validate_transition;
use crate::CoreError;
use fleetlog_schema::validate::{non_blank, validate_amount};
use fleetlog_schema::{
    Completion, FuelPriceTable, FuelType, PurposeId, TripId, TripPatch, TripRequest, TripStatus,
    User, UserId, ValidationError, VehicleId,
};
use fleetlog_store::{mint_id, CompletionFailure, EntityStore, FileStore, StoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

const NOTES_RETRIES: usize = 3;

/// The acting user of an engine call. Passed explicitly to every operation;
/// the engine keeps no notion of a current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterIdentity {
    pub user_id: UserId,
}

impl RequesterIdentity {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// Identity for bootstrap and maintenance tasks that are not performed
    /// by a registered user. Accepted by administrative operations only.
    pub fn system() -> Self {
        Self::new("system")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTripRequest {
    pub vehicle_id: VehicleId,
    pub purpose_id: PurposeId,
    pub destination: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionInput {
    pub end_odometer: u64,
    #[serde(default)]
    pub fuel_liters: f64,
    #[serde(default)]
    pub fuel_type: Option<FuelType>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripFilter {
    #[serde(default)]
    pub status: Option<TripStatus>,
    #[serde(default)]
    pub vehicle_id: Option<VehicleId>,
    #[serde(default)]
    pub requester_id: Option<UserId>,
}

impl TripFilter {
    pub fn matches(&self, trip: &TripRequest) -> bool {
        self.status.map_or(true, |s| s == trip.status)
            && self
                .vehicle_id
                .as_ref()
                .map_or(true, |v| *v == trip.vehicle_id)
            && self
                .requester_id
                .as_ref()
                .map_or(true, |u| *u == trip.requester_id)
    }
}

/// Blank notes are stored as absent.
pub(crate) fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_owned())
        .filter(|n| !n.is_empty())
}

/// Trip lifecycle engine.
///
/// Every status change is a compare-and-set on the trip's current status, so
/// two callers racing on the same trip get exactly one success and one
/// `InvalidTransition`. Completion writes the trip and the vehicle odometer
/// through [`EntityStore::commit_completion`].
///
/// Concurrent completions of different trips on the same vehicle are not
/// ordered against each other: the vehicle's odometer is whatever the most
/// recently committed completion wrote.
pub struct Engine<S: EntityStore = FileStore> {
    pub(crate) store: S,
}

impl Engine<FileStore> {
    /// Open the file store under `root`, recovering any unfinished completion.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, CoreError> {
        Ok(Self::with_store(FileStore::open(root)?))
    }

    pub fn open_with_timeout(root: impl AsRef<Path>, timeout: Duration) -> Result<Self, CoreError> {
        Ok(Self::with_store(
            FileStore::open(root)?.with_lock_timeout(timeout),
        ))
    }

    pub fn from_config(config: &FleetConfig) -> Result<Self, CoreError> {
        Self::open_with_timeout(config.store_path(), config.lock_timeout())
    }
}

impl<S: EntityStore> Engine<S> {
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Look up the acting user; trip operations require a registered, active one.
    fn resolve_actor(&self, identity: &RequesterIdentity) -> Result<User, CoreError> {
        let user = self.store.get_user(&identity.user_id)?;
        if !user.active {
            return Err(ValidationError::Invalid {
                field: "requester",
                reason: format!("user {} is inactive", user.id),
            }
            .into());
        }
        Ok(user)
    }

    /// Translate a failed compare-and-set into the transition that was refused.
    fn cas_error(e: StoreError, to: TripStatus) -> CoreError {
        match e {
            StoreError::StatusConflict { found, .. } => {
                CoreError::InvalidTransition { from: found, to }
            }
            other => other.into(),
        }
    }

    pub fn create_request(
        &self,
        identity: &RequesterIdentity,
        input: NewTripRequest,
    ) -> Result<TripRequest, CoreError> {
        info!(
            "{} requesting vehicle {} to {}",
            identity.user_id, input.vehicle_id, input.destination
        );
        non_blank("vehicle", &input.vehicle_id)?;
        non_blank("purpose", &input.purpose_id)?;
        non_blank("destination", &input.destination)?;

        let requester = self.resolve_actor(identity)?;
        let vehicle = self.store.get_vehicle(&input.vehicle_id)?;
        if !vehicle.active {
            return Err(ValidationError::Invalid {
                field: "vehicle",
                reason: format!("vehicle {} is inactive", vehicle.plate),
            }
            .into());
        }
        self.store.get_purpose(&input.purpose_id)?;

        let trip = TripRequest::pending(
            TripId::new(mint_id(TripId::PREFIX)),
            requester.id,
            vehicle.id,
            input.purpose_id,
            input.destination.trim().to_owned(),
            clean_notes(input.notes),
        );
        self.store.create_trip(&trip)?;
        info!("trip {} created (pending)", trip.id);
        Ok(trip)
    }

    pub fn approve(
        &self,
        identity: &RequesterIdentity,
        trip_id: &TripId,
    ) -> Result<TripRequest, CoreError> {
        info!("{} approving trip {trip_id}", identity.user_id);
        let approver = self.resolve_actor(identity)?;
        let trip = self.store.get_trip(trip_id)?;
        validate_transition(trip.status, TripStatus::Approved)?;

        // The store reads the odometer under the same lock as the status check.
        let approved = self
            .store
            .approve_trip(trip_id, &approver.id, chrono::Utc::now())
            .map_err(|e| Self::cas_error(e, TripStatus::Approved))?;
        info!(
            "trip {trip_id} approved at odometer {}",
            approved.start_odometer.unwrap_or_default()
        );
        Ok(approved)
    }

    pub fn deny(
        &self,
        identity: &RequesterIdentity,
        trip_id: &TripId,
    ) -> Result<TripRequest, CoreError> {
        info!("{} denying trip {trip_id}", identity.user_id);
        self.resolve_actor(identity)?;
        let trip = self.store.get_trip(trip_id)?;
        validate_transition(trip.status, TripStatus::Denied)?;

        let denied = self
            .store
            .update_trip(trip_id, TripStatus::Pending, &TripPatch::Deny)
            .map_err(|e| Self::cas_error(e, TripStatus::Denied))?;
        info!("trip {trip_id} denied");
        Ok(denied)
    }

    pub fn complete(
        &self,
        identity: &RequesterIdentity,
        trip_id: &TripId,
        input: CompletionInput,
    ) -> Result<TripRequest, CoreError> {
        info!(
            "{} completing trip {trip_id} at odometer {}",
            identity.user_id, input.end_odometer
        );
        validate_amount("fuel liters", input.fuel_liters)?;
        self.resolve_actor(identity)?;
        let trip = self.store.get_trip(trip_id)?;
        validate_transition(trip.status, TripStatus::Completed)?;

        let start = trip
            .start_odometer
            .ok_or_else(|| ValidationError::Inconsistent {
                trip_id: trip_id.to_string(),
                reason: "approved trip has no start odometer".to_owned(),
            })?;
        if input.end_odometer < start {
            return Err(ValidationError::InvalidOdometer {
                start,
                end: input.end_odometer,
            }
            .into());
        }

        let prices = if input.fuel_liters > 0.0 && input.fuel_type.is_some() {
            self.store.get_fuel_prices()?
        } else {
            FuelPriceTable::new()
        };
        let completion = Completion {
            completed_at: chrono::Utc::now(),
            end_odometer: input.end_odometer,
            distance_km: compute_distance(start, input.end_odometer),
            fuel_liters: input.fuel_liters,
            fuel_type: input.fuel_type,
            refuel_cost: compute_refuel_cost(input.fuel_liters, input.fuel_type, &prices),
            notes: clean_notes(input.notes),
        };

        let vehicle = self.store.get_vehicle(&trip.vehicle_id)?;
        if vehicle.current_odometer > input.end_odometer {
            warn!(
                "vehicle {} odometer moves back from {} to {} (another trip completed first)",
                vehicle.id, vehicle.current_odometer, input.end_odometer
            );
        }

        match self
            .store
            .commit_completion(trip_id, &trip.vehicle_id, &completion)
        {
            Ok(completed) => {
                info!(
                    "trip {trip_id} completed: {} km, cost {:.2}",
                    completion.distance_km, completion.refuel_cost
                );
                Ok(completed)
            }
            Err(CompletionFailure::Rejected(e)) => Err(Self::cas_error(e, TripStatus::Completed)),
            Err(CompletionFailure::Partial {
                trip_written,
                vehicle_written,
                reason,
            }) => {
                error!(
                    "trip {trip_id} partially completed (trip written: {trip_written}, \
                     vehicle written: {vehicle_written}): {reason}"
                );
                Err(CoreError::PartialCompletion {
                    trip_id: trip_id.to_string(),
                    vehicle_id: trip.vehicle_id.to_string(),
                    trip_written,
                    vehicle_written,
                    reason,
                })
            }
        }
    }

    /// Replace a trip's notes. Allowed in every status; nothing else changes.
    pub fn update_notes(
        &self,
        identity: &RequesterIdentity,
        trip_id: &TripId,
        notes: Option<String>,
    ) -> Result<TripRequest, CoreError> {
        info!("{} updating notes of trip {trip_id}", identity.user_id);
        self.resolve_actor(identity)?;
        let patch = TripPatch::Notes(clean_notes(notes));
        let mut attempt = 0;
        loop {
            let trip = self.store.get_trip(trip_id)?;
            match self.store.update_trip(trip_id, trip.status, &patch) {
                Ok(updated) => return Ok(updated),
                // The status moved underneath us; re-read and retry.
                Err(StoreError::StatusConflict { .. }) if attempt + 1 < NOTES_RETRIES => {
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn get_trip(&self, trip_id: &TripId) -> Result<TripRequest, CoreError> {
        Ok(self.store.get_trip(trip_id)?)
    }

    /// Trips matching `filter`, newest request first.
    pub fn list_trips(&self, filter: &TripFilter) -> Result<Vec<TripRequest>, CoreError> {
        let mut trips: Vec<TripRequest> = self
            .store
            .list_trips()?
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect();
        trips.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(a.id.cmp(&b.id)));
        Ok(trips)
    }
}
