use crate::entity::{check_odometer_adjustment, CompletionFailure, EntityStore};
use crate::records::Record;
use crate::StoreError;
use chrono::{DateTime, Utc};
use fleetlog_schema::{
    normalize_plate, Completion, Maintenance, MaintenanceId, Parameter, ParameterPatch, Purpose,
    PurposeId, TripId, TripPatch, TripRequest, TripStatus, User, UserId, Vehicle, VehicleId,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    vehicles: BTreeMap<String, Vehicle>,
    users: BTreeMap<String, User>,
    purposes: BTreeMap<String, Purpose>,
    maintenance: BTreeMap<String, Maintenance>,
    trips: BTreeMap<String, TripRequest>,
    parameter: Parameter,
}

/// In-process [`EntityStore`]. One mutex guards every collection, so each
/// call, including `commit_completion`, is atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // Mutations are single inserts, so a poisoned map is still consistent.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn fetch<T: Record>(map: &BTreeMap<String, T>, id: &str) -> Result<T, StoreError> {
    map.get(id)
        .cloned()
        .ok_or_else(|| StoreError::not_found(T::KIND, id))
}

fn fetch_mut<'a, T: Record>(
    map: &'a mut BTreeMap<String, T>,
    id: &str,
) -> Result<&'a mut T, StoreError> {
    map.get_mut(id)
        .ok_or_else(|| StoreError::not_found(T::KIND, id))
}

fn insert_new<T: Record>(map: &mut BTreeMap<String, T>, record: &T) -> Result<(), StoreError> {
    if map.contains_key(record.key()) {
        return Err(StoreError::AlreadyExists {
            kind: T::KIND,
            id: record.key().to_owned(),
        });
    }
    map.insert(record.key().to_owned(), record.clone());
    Ok(())
}

fn expect_status(trip: &TripRequest, expected: TripStatus) -> Result<(), StoreError> {
    if trip.status != expected {
        return Err(StoreError::StatusConflict {
            trip_id: trip.id.to_string(),
            expected,
            found: trip.status,
        });
    }
    Ok(())
}

impl EntityStore for MemoryStore {
    fn get_vehicle(&self, id: &VehicleId) -> Result<Vehicle, StoreError> {
        fetch(&self.state().vehicles, id)
    }

    fn list_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        Ok(self.state().vehicles.values().cloned().collect())
    }

    fn insert_vehicle(&self, vehicle: &Vehicle) -> Result<(), StoreError> {
        let mut state = self.state();
        let plate = normalize_plate(&vehicle.plate);
        if state
            .vehicles
            .values()
            .any(|v| normalize_plate(&v.plate) == plate)
        {
            return Err(StoreError::AlreadyExists {
                kind: "vehicle plate",
                id: plate,
            });
        }
        insert_new(&mut state.vehicles, vehicle)
    }

    fn set_vehicle_active(&self, id: &VehicleId, active: bool) -> Result<Vehicle, StoreError> {
        let mut state = self.state();
        let vehicle = fetch_mut(&mut state.vehicles, id)?;
        vehicle.active = active;
        Ok(vehicle.clone())
    }

    fn update_vehicle_odometer(&self, id: &VehicleId, odometer: u64) -> Result<Vehicle, StoreError> {
        let mut state = self.state();
        let vehicle = fetch_mut(&mut state.vehicles, id)?;
        vehicle.current_odometer = odometer;
        Ok(vehicle.clone())
    }

    fn adjust_vehicle_odometer(
        &self,
        id: &VehicleId,
        odometer: u64,
    ) -> Result<Vehicle, StoreError> {
        let mut state = self.state();
        let current = fetch(&state.vehicles, id)?;
        check_odometer_adjustment(&current, odometer, state.trips.values())?;
        let vehicle = fetch_mut(&mut state.vehicles, id)?;
        vehicle.current_odometer = odometer;
        Ok(vehicle.clone())
    }

    fn get_user(&self, id: &UserId) -> Result<User, StoreError> {
        fetch(&self.state().users, id)
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.state().users.values().cloned().collect())
    }

    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        insert_new(&mut self.state().users, user)
    }

    fn set_user_active(&self, id: &UserId, active: bool) -> Result<User, StoreError> {
        let mut state = self.state();
        let user = fetch_mut(&mut state.users, id)?;
        user.active = active;
        Ok(user.clone())
    }

    fn get_purpose(&self, id: &PurposeId) -> Result<Purpose, StoreError> {
        fetch(&self.state().purposes, id)
    }

    fn list_purposes(&self) -> Result<Vec<Purpose>, StoreError> {
        Ok(self.state().purposes.values().cloned().collect())
    }

    fn insert_purpose(&self, purpose: &Purpose) -> Result<(), StoreError> {
        let mut state = self.state();
        let name = purpose.name.trim().to_lowercase();
        if state
            .purposes
            .values()
            .any(|p| p.name.trim().to_lowercase() == name)
        {
            return Err(StoreError::AlreadyExists {
                kind: "purpose",
                id: purpose.name.clone(),
            });
        }
        insert_new(&mut state.purposes, purpose)
    }

    fn remove_purpose(&self, id: &PurposeId) -> Result<(), StoreError> {
        self.state()
            .purposes
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(Purpose::KIND, id.as_str()))
    }

    fn list_maintenance(&self) -> Result<Vec<Maintenance>, StoreError> {
        Ok(self.state().maintenance.values().cloned().collect())
    }

    fn insert_maintenance(&self, record: &Maintenance) -> Result<(), StoreError> {
        insert_new(&mut self.state().maintenance, record)
    }

    fn remove_maintenance(&self, id: &MaintenanceId) -> Result<(), StoreError> {
        self.state()
            .maintenance
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(Maintenance::KIND, id.as_str()))
    }

    fn get_parameter(&self) -> Result<Parameter, StoreError> {
        Ok(self.state().parameter.clone())
    }

    fn update_parameter(&self, patch: &ParameterPatch) -> Result<Parameter, StoreError> {
        let mut state = self.state();
        patch.apply(&mut state.parameter, Utc::now());
        Ok(state.parameter.clone())
    }

    fn get_trip(&self, id: &TripId) -> Result<TripRequest, StoreError> {
        fetch(&self.state().trips, id)
    }

    fn list_trips(&self) -> Result<Vec<TripRequest>, StoreError> {
        Ok(self.state().trips.values().cloned().collect())
    }

    fn create_trip(&self, trip: &TripRequest) -> Result<(), StoreError> {
        insert_new(&mut self.state().trips, trip)
    }

    fn update_trip(
        &self,
        id: &TripId,
        expected: TripStatus,
        patch: &TripPatch,
    ) -> Result<TripRequest, StoreError> {
        let mut state = self.state();
        let trip = fetch_mut(&mut state.trips, id)?;
        expect_status(trip, expected)?;
        patch.apply(trip);
        Ok(trip.clone())
    }

    fn approve_trip(
        &self,
        id: &TripId,
        approved_by: &UserId,
        approved_at: DateTime<Utc>,
    ) -> Result<TripRequest, StoreError> {
        let mut state = self.state();
        let mut trip = fetch(&state.trips, id)?;
        expect_status(&trip, TripStatus::Pending)?;
        let vehicle = fetch(&state.vehicles, &trip.vehicle_id)?;
        TripPatch::Approve {
            start_odometer: vehicle.current_odometer,
            approved_at,
            approved_by: approved_by.clone(),
        }
        .apply(&mut trip);
        state.trips.insert(id.to_string(), trip.clone());
        Ok(trip)
    }

    fn commit_completion(
        &self,
        trip_id: &TripId,
        vehicle_id: &VehicleId,
        completion: &Completion,
    ) -> Result<TripRequest, CompletionFailure> {
        let mut state = self.state();
        let mut trip = fetch(&state.trips, trip_id)?;
        expect_status(&trip, TripStatus::Approved)?;
        let vehicle = fetch_mut(&mut state.vehicles, vehicle_id)?;

        vehicle.current_odometer = completion.end_odometer;
        TripPatch::Complete(completion.clone()).apply(&mut trip);
        state.trips.insert(trip_id.to_string(), trip.clone());
        Ok(trip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleetlog_schema::FuelType;

    fn vehicle(id: &str, plate: &str) -> Vehicle {
        Vehicle {
            id: id.into(),
            model: "Fiat Strada".to_owned(),
            plate: plate.to_owned(),
            year: 2021,
            fuel_type: FuelType::Flex,
            current_odometer: 100,
            active: true,
            created_at: Utc::now(),
        }
    }

    fn pending_trip(id: &str) -> TripRequest {
        TripRequest::pending(
            id.into(),
            "user-1".into(),
            "veh-1".into(),
            "purp-1".into(),
            "Warehouse".to_owned(),
            Some("pick up parts".to_owned()),
        )
    }

    #[test]
    fn insert_rejects_duplicates() {
        let store = MemoryStore::new();
        store.insert_vehicle(&vehicle("veh-1", "AAA-0001")).unwrap();
        assert!(store.insert_vehicle(&vehicle("veh-1", "AAA-0002")).is_err());
        assert!(store.insert_vehicle(&vehicle("veh-2", "aaa-0001")).is_err());
        store.create_trip(&pending_trip("trip-1")).unwrap();
        assert!(store.create_trip(&pending_trip("trip-1")).is_err());
    }

    #[test]
    fn update_trip_is_compare_and_set() {
        let store = MemoryStore::new();
        store.create_trip(&pending_trip("trip-1")).unwrap();
        store
            .update_trip(&"trip-1".into(), TripStatus::Pending, &TripPatch::Deny)
            .unwrap();
        let err = store
            .update_trip(&"trip-1".into(), TripStatus::Pending, &TripPatch::Deny)
            .unwrap_err();
        assert!(matches!(err, StoreError::StatusConflict { .. }));
    }

    #[test]
    fn commit_completion_missing_vehicle_writes_nothing() {
        let store = MemoryStore::new();
        store.create_trip(&pending_trip("trip-1")).unwrap();
        store
            .update_trip(
                &"trip-1".into(),
                TripStatus::Pending,
                &TripPatch::Approve {
                    start_odometer: 100,
                    approved_at: Utc::now(),
                    approved_by: "user-2".into(),
                },
            )
            .unwrap();
        let completion = Completion {
            completed_at: Utc::now(),
            end_odometer: 150,
            distance_km: 50,
            fuel_liters: 0.0,
            fuel_type: None,
            refuel_cost: 0.0,
            notes: None,
        };
        let err = store
            .commit_completion(&"trip-1".into(), &"veh-1".into(), &completion)
            .unwrap_err();
        assert!(matches!(
            err,
            CompletionFailure::Rejected(StoreError::NotFound { kind: "vehicle", .. })
        ));
        assert_eq!(
            store.get_trip(&"trip-1".into()).unwrap().status,
            TripStatus::Approved
        );
    }

    #[test]
    fn approve_then_adjust_is_refused_until_completion() {
        let store = MemoryStore::new();
        store.insert_vehicle(&vehicle("veh-1", "AAA-0001")).unwrap();
        store.create_trip(&pending_trip("trip-1")).unwrap();
        let approved = store
            .approve_trip(&"trip-1".into(), &"user-2".into(), Utc::now())
            .unwrap();
        assert_eq!(approved.start_odometer, Some(100));

        assert!(matches!(
            store.adjust_vehicle_odometer(&"veh-1".into(), 400),
            Err(StoreError::OdometerRefused { .. })
        ));
        assert_eq!(
            store.get_vehicle(&"veh-1".into()).unwrap().current_odometer,
            100
        );
    }

    #[test]
    fn parameter_patches_accumulate() {
        let store = MemoryStore::new();
        store
            .update_parameter(&ParameterPatch::FuelPrice {
                fuel: FuelType::Diesel,
                price: 6.1,
            })
            .unwrap();
        let p = store
            .update_parameter(&ParameterPatch::FuelPrice {
                fuel: FuelType::Flex,
                price: 4.2,
            })
            .unwrap();
        assert_eq!(p.fuel_prices.get(FuelType::Diesel), Some(6.1));
        assert_eq!(p.fuel_prices.get(FuelType::Flex), Some(4.2));
    }

    #[test]
    fn remove_missing_purpose_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.remove_purpose(&"purp-x".into()),
            Err(StoreError::NotFound { kind: "purpose", .. })
        ));
    }
}
