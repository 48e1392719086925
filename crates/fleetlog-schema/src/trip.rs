use crate::fuel::FuelType;
use crate::types::{PurposeId, TripId, UserId, VehicleId};
use crate::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TripStatus {
    Pending,
    Approved,
    /// Reserved. No engine transition enters or leaves this state.
    InUse,
    Completed,
    Denied,
}

impl TripStatus {
    /// `Denied` and `Completed` have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TripStatus::Denied | TripStatus::Completed)
    }

    /// Whether a trip in this state must carry a start odometer snapshot.
    pub fn has_odometer_snapshot(self) -> bool {
        matches!(
            self,
            TripStatus::Approved | TripStatus::InUse | TripStatus::Completed
        )
    }

    /// Trips that hold a vehicle: approved and not yet completed.
    pub fn is_in_flight(self) -> bool {
        matches!(self, TripStatus::Approved | TripStatus::InUse)
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripStatus::Pending => write!(f, "pending"),
            TripStatus::Approved => write!(f, "approved"),
            TripStatus::InUse => write!(f, "in-use"),
            TripStatus::Completed => write!(f, "completed"),
            TripStatus::Denied => write!(f, "denied"),
        }
    }
}

impl FromStr for TripStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TripStatus::Pending),
            "approved" => Ok(TripStatus::Approved),
            "in-use" | "in_use" | "inuse" => Ok(TripStatus::InUse),
            "completed" => Ok(TripStatus::Completed),
            "denied" => Ok(TripStatus::Denied),
            _ => Err(ValidationError::UnknownStatus(s.to_owned())),
        }
    }
}

/// One vehicle usage cycle, from requisition to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    pub id: TripId,
    pub requester_id: UserId,
    pub vehicle_id: VehicleId,
    pub purpose_id: PurposeId,
    pub destination: String,
    pub status: TripStatus,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_odometer: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_odometer: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_liters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<FuelType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refuel_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TripRequest {
    /// A freshly requested trip in `Pending`.
    pub fn pending(
        id: TripId,
        requester_id: UserId,
        vehicle_id: VehicleId,
        purpose_id: PurposeId,
        destination: String,
        notes: Option<String>,
    ) -> Self {
        Self {
            id,
            requester_id,
            vehicle_id,
            purpose_id,
            destination,
            status: TripStatus::Pending,
            requested_at: Utc::now(),
            approved_at: None,
            approved_by: None,
            completed_at: None,
            start_odometer: None,
            end_odometer: None,
            distance_km: None,
            fuel_liters: None,
            fuel_type: None,
            refuel_cost: None,
            notes,
        }
    }

    /// Check the field-presence and odometer invariants tied to `status`.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        let fail = |reason: &str| ValidationError::Inconsistent {
            trip_id: self.id.to_string(),
            reason: reason.to_owned(),
        };

        if self.status.has_odometer_snapshot() != self.start_odometer.is_some() {
            return Err(fail("start odometer presence does not match status"));
        }

        let completed = self.status == TripStatus::Completed;
        let completion_fields = [
            self.end_odometer.is_some(),
            self.distance_km.is_some(),
            self.fuel_liters.is_some(),
            self.refuel_cost.is_some(),
            self.completed_at.is_some(),
        ];
        if completion_fields.iter().any(|present| *present != completed) {
            return Err(fail("completion fields presence does not match status"));
        }

        if let (Some(start), Some(end), Some(distance)) =
            (self.start_odometer, self.end_odometer, self.distance_km)
        {
            if end < start {
                return Err(fail("end odometer is below start odometer"));
            }
            if distance != end - start {
                return Err(fail("distance does not equal end minus start"));
            }
        }
        Ok(())
    }
}

/// Values written to a trip when it completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub completed_at: DateTime<Utc>,
    pub end_odometer: u64,
    pub distance_km: u64,
    pub fuel_liters: f64,
    pub fuel_type: Option<FuelType>,
    pub refuel_cost: f64,
    /// Replaces the trip's notes when present; `None` keeps them.
    pub notes: Option<String>,
}

/// A conditional change to a trip record.
///
/// Stores apply a patch only when the trip's current status equals the
/// expected status supplied alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TripPatch {
    Approve {
        start_odometer: u64,
        approved_at: DateTime<Utc>,
        approved_by: UserId,
    },
    Deny,
    Complete(Completion),
    Notes(Option<String>),
    /// Undo a completion whose paired vehicle write failed.
    RevertCompletion { previous_notes: Option<String> },
}

impl TripPatch {
    pub fn apply(&self, trip: &mut TripRequest) {
        match self {
            TripPatch::Approve {
                start_odometer,
                approved_at,
                approved_by,
            } => {
                trip.status = TripStatus::Approved;
                trip.start_odometer = Some(*start_odometer);
                trip.approved_at = Some(*approved_at);
                trip.approved_by = Some(approved_by.clone());
            }
            TripPatch::Deny => {
                trip.status = TripStatus::Denied;
            }
            TripPatch::Complete(c) => {
                trip.status = TripStatus::Completed;
                trip.completed_at = Some(c.completed_at);
                trip.end_odometer = Some(c.end_odometer);
                trip.distance_km = Some(c.distance_km);
                trip.fuel_liters = Some(c.fuel_liters);
                trip.fuel_type = c.fuel_type;
                trip.refuel_cost = Some(c.refuel_cost);
                if let Some(notes) = &c.notes {
                    trip.notes = Some(notes.clone());
                }
            }
            TripPatch::Notes(notes) => {
                trip.notes.clone_from(notes);
            }
            TripPatch::RevertCompletion { previous_notes } => {
                trip.status = TripStatus::Approved;
                trip.completed_at = None;
                trip.end_odometer = None;
                trip.distance_km = None;
                trip.fuel_liters = None;
                trip.fuel_type = None;
                trip.refuel_cost = None;
                trip.notes.clone_from(previous_notes);
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TripPatch::Approve { .. } => "approve",
            TripPatch::Deny => "deny",
            TripPatch::Complete(_) => "complete",
            TripPatch::Notes(_) => "notes",
            TripPatch::RevertCompletion { .. } => "revert-completion",
        }
    }
}
