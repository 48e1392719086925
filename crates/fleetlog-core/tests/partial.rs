//! Completion against a store whose writes can be made to fail.

use fleetlog_core::{CompletionInput, CoreError, Engine, NewTripRequest, RequesterIdentity};
use chrono::{DateTime, Utc};
use fleetlog_schema::{
    FuelType, Maintenance, MaintenanceId, NewVehicle, Parameter, ParameterPatch, Purpose,
    PurposeId, TripId, TripPatch, TripRequest, TripStatus, User, UserId, UserRole, Vehicle,
    VehicleId,
};
use fleetlog_store::{EntityStore, MemoryStore, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct FaultyStore {
    inner: MemoryStore,
    fail_odometer: AtomicBool,
    fail_revert: AtomicBool,
}

fn fault() -> StoreError {
    StoreError::Io(std::io::Error::other("disk unplugged"))
}

impl EntityStore for FaultyStore {
    fn get_vehicle(&self, id: &VehicleId) -> Result<Vehicle, StoreError> {
        self.inner.get_vehicle(id)
    }
    fn list_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        self.inner.list_vehicles()
    }
    fn insert_vehicle(&self, vehicle: &Vehicle) -> Result<(), StoreError> {
        self.inner.insert_vehicle(vehicle)
    }
    fn set_vehicle_active(&self, id: &VehicleId, active: bool) -> Result<Vehicle, StoreError> {
        self.inner.set_vehicle_active(id, active)
    }
    fn update_vehicle_odometer(&self, id: &VehicleId, odometer: u64) -> Result<Vehicle, StoreError> {
        if self.fail_odometer.load(Ordering::SeqCst) {
            return Err(fault());
        }
        self.inner.update_vehicle_odometer(id, odometer)
    }
    fn adjust_vehicle_odometer(&self, id: &VehicleId, odometer: u64) -> Result<Vehicle, StoreError> {
        self.inner.adjust_vehicle_odometer(id, odometer)
    }
    fn get_user(&self, id: &UserId) -> Result<User, StoreError> {
        self.inner.get_user(id)
    }
    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.inner.list_users()
    }
    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.insert_user(user)
    }
    fn set_user_active(&self, id: &UserId, active: bool) -> Result<User, StoreError> {
        self.inner.set_user_active(id, active)
    }
    fn get_purpose(&self, id: &PurposeId) -> Result<Purpose, StoreError> {
        self.inner.get_purpose(id)
    }
    fn list_purposes(&self) -> Result<Vec<Purpose>, StoreError> {
        self.inner.list_purposes()
    }
    fn insert_purpose(&self, purpose: &Purpose) -> Result<(), StoreError> {
        self.inner.insert_purpose(purpose)
    }
    fn remove_purpose(&self, id: &PurposeId) -> Result<(), StoreError> {
        self.inner.remove_purpose(id)
    }
    fn list_maintenance(&self) -> Result<Vec<Maintenance>, StoreError> {
        self.inner.list_maintenance()
    }
    fn insert_maintenance(&self, record: &Maintenance) -> Result<(), StoreError> {
        self.inner.insert_maintenance(record)
    }
    fn remove_maintenance(&self, id: &MaintenanceId) -> Result<(), StoreError> {
        self.inner.remove_maintenance(id)
    }
    fn get_parameter(&self) -> Result<Parameter, StoreError> {
        self.inner.get_parameter()
    }
    fn update_parameter(&self, patch: &ParameterPatch) -> Result<Parameter, StoreError> {
        self.inner.update_parameter(patch)
    }
    fn get_trip(&self, id: &TripId) -> Result<TripRequest, StoreError> {
        self.inner.get_trip(id)
    }
    fn list_trips(&self) -> Result<Vec<TripRequest>, StoreError> {
        self.inner.list_trips()
    }
    fn create_trip(&self, trip: &TripRequest) -> Result<(), StoreError> {
        self.inner.create_trip(trip)
    }
    fn update_trip(
        &self,
        id: &TripId,
        expected: TripStatus,
        patch: &TripPatch,
    ) -> Result<TripRequest, StoreError> {
        if matches!(patch, TripPatch::RevertCompletion { .. })
            && self.fail_revert.load(Ordering::SeqCst)
        {
            return Err(fault());
        }
        self.inner.update_trip(id, expected, patch)
    }
    fn approve_trip(
        &self,
        id: &TripId,
        approved_by: &UserId,
        approved_at: DateTime<Utc>,
    ) -> Result<TripRequest, StoreError> {
        self.inner.approve_trip(id, approved_by, approved_at)
    }
}

fn approved(engine: &Engine<FaultyStore>) -> (RequesterIdentity, TripId, VehicleId) {
    let system = RequesterIdentity::system();
    let user = engine
        .register_user(&system, "Rita", UserRole::Operator)
        .unwrap();
    let who = RequesterIdentity::new(user.id);
    let vehicle = engine
        .register_vehicle(
            &system,
            NewVehicle {
                model: "VW Saveiro".to_owned(),
                plate: "SAV-2020".to_owned(),
                year: 2020,
                fuel_type: FuelType::Ethanol,
                current_odometer: 300,
            },
        )
        .unwrap();
    let purpose = engine.add_purpose(&system, "Supplies").unwrap();
    let trip = engine
        .create_request(
            &who,
            NewTripRequest {
                vehicle_id: vehicle.id.clone(),
                purpose_id: purpose.id,
                destination: "Market".to_owned(),
                notes: None,
            },
        )
        .unwrap();
    engine.approve(&who, &trip.id).unwrap();
    (who, trip.id, vehicle.id)
}

fn input() -> CompletionInput {
    CompletionInput {
        end_odometer: 340,
        fuel_liters: 0.0,
        fuel_type: None,
        notes: None,
    }
}

#[test]
fn compensated_failure_leaves_trip_approved() {
    let engine = Engine::with_store(FaultyStore::default());
    let (who, trip_id, vehicle_id) = approved(&engine);
    engine.store().fail_odometer.store(true, Ordering::SeqCst);

    let err = engine.complete(&who, &trip_id, input()).unwrap_err();
    assert!(matches!(err, CoreError::Storage(StoreError::Io(_))));
    assert_eq!(
        engine.get_trip(&trip_id).unwrap().status,
        TripStatus::Approved
    );
    assert_eq!(engine.get_vehicle(&vehicle_id).unwrap().current_odometer, 300);

    // The fault clears and the same completion goes through.
    engine.store().fail_odometer.store(false, Ordering::SeqCst);
    engine.complete(&who, &trip_id, input()).unwrap();
    assert_eq!(engine.get_vehicle(&vehicle_id).unwrap().current_odometer, 340);
}

#[test]
fn failed_compensation_is_reported_as_partial() {
    let engine = Engine::with_store(FaultyStore::default());
    let (who, trip_id, vehicle_id) = approved(&engine);
    engine.store().fail_odometer.store(true, Ordering::SeqCst);
    engine.store().fail_revert.store(true, Ordering::SeqCst);

    match engine.complete(&who, &trip_id, input()).unwrap_err() {
        CoreError::PartialCompletion {
            trip_id: t,
            vehicle_id: v,
            trip_written,
            vehicle_written,
            ..
        } => {
            assert_eq!(t, trip_id.as_str());
            assert_eq!(v, vehicle_id.as_str());
            assert!(trip_written);
            assert!(!vehicle_written);
        }
        other => panic!("expected partial completion, got {other:?}"),
    }
}
