use crate::entity::{check_odometer_adjustment, CompletionFailure, EntityStore};
use crate::layout::StoreLayout;
use crate::lock::StoreLock;
use crate::records::{decode, encode, RecordStore};
use crate::wal::{RollbackStep, WalOpKind, WriteAheadLog};
use crate::{write_atomic, StoreError};
use chrono::{DateTime, Utc};
use fleetlog_schema::{
    normalize_plate, Completion, Maintenance, MaintenanceId, Parameter, ParameterPatch, Purpose,
    PurposeId, TripId, TripPatch, TripRequest, TripStatus, User, UserId, Vehicle, VehicleId,
};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// [`EntityStore`] over a directory of checksummed JSON files.
///
/// Reads are lock-free: every file is replaced by atomic rename, so a reader
/// sees either the old or the new record. Writes take the store lock, which
/// makes each status compare-and-set atomic across threads and processes.
pub struct FileStore {
    layout: StoreLayout,
    vehicles: RecordStore<Vehicle>,
    users: RecordStore<User>,
    purposes: RecordStore<Purpose>,
    maintenance: RecordStore<Maintenance>,
    trips: RecordStore<TripRequest>,
    wal: WriteAheadLog,
    lock_timeout: Duration,
}

impl FileStore {
    /// Open (creating if needed) the store under `root` and roll back any
    /// transaction a previous process left unfinished.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let layout = StoreLayout::new(root.as_ref());
        layout.initialize()?;
        let wal = WriteAheadLog::new(&layout);
        wal.initialize()?;

        let store = Self {
            vehicles: RecordStore::new(layout.clone()),
            users: RecordStore::new(layout.clone()),
            purposes: RecordStore::new(layout.clone()),
            maintenance: RecordStore::new(layout.clone()),
            trips: RecordStore::new(layout.clone()),
            wal,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            layout,
        };

        {
            let _lock = store.lock()?;
            let recovered = store.wal.recover()?;
            if recovered > 0 {
                info!("recovered {recovered} incomplete transaction(s)");
            }
        }
        debug!("opened store at {}", store.layout.root().display());
        Ok(store)
    }

    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    fn lock(&self) -> Result<StoreLock, StoreError> {
        StoreLock::acquire_timeout(&self.layout.lock_file(), self.lock_timeout)
    }

    fn completion_transaction(
        &self,
        mut trip: TripRequest,
        mut vehicle: Vehicle,
        completion: &Completion,
    ) -> Result<TripRequest, CompletionFailure> {
        let trip_before = self.trips.read_raw(&trip.id)?;
        let vehicle_before = self.vehicles.read_raw(&vehicle.id)?;

        let op_id = self.wal.begin(WalOpKind::CompleteTrip, &trip.id)?;
        let steps = [
            RollbackStep::RestoreFile {
                path: self.trips.path(&trip.id),
                contents: trip_before,
            },
            RollbackStep::RestoreFile {
                path: self.vehicles.path(&vehicle.id),
                contents: vehicle_before,
            },
        ];
        for step in steps {
            if let Err(e) = self.wal.add_rollback_step(&op_id, step) {
                // Nothing written yet.
                let _ = self.wal.commit(&op_id);
                return Err(e.into());
            }
        }

        TripPatch::Complete(completion.clone()).apply(&mut trip);
        vehicle.current_odometer = completion.end_odometer;

        let mut trip_written = false;
        let written = self.trips.put(&trip).and_then(|()| {
            trip_written = true;
            self.vehicles.put(&vehicle)
        });
        if let Err(e) = written {
            warn!("completion of {} failed, rolling back: {e}", trip.id);
            return match self.wal.abort(&op_id) {
                Ok(()) => Err(CompletionFailure::Rejected(e)),
                Err(abort_err) => Err(CompletionFailure::Partial {
                    trip_written,
                    vehicle_written: false,
                    reason: format!(
                        "{e}; rollback failed: {abort_err}; it will be retried when the store is reopened"
                    ),
                }),
            };
        }

        if let Err(e) = self.wal.commit(&op_id) {
            return Err(CompletionFailure::Partial {
                trip_written: true,
                vehicle_written: true,
                reason: format!("records written but the transaction log entry {op_id} could not be cleared: {e}"),
            });
        }
        Ok(trip)
    }
}

impl EntityStore for FileStore {
    fn get_vehicle(&self, id: &VehicleId) -> Result<Vehicle, StoreError> {
        self.vehicles.get(id)
    }

    fn list_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        self.vehicles.list()
    }

    fn insert_vehicle(&self, vehicle: &Vehicle) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        if self.vehicles.exists(&vehicle.id) {
            return Err(StoreError::AlreadyExists {
                kind: "vehicle",
                id: vehicle.id.to_string(),
            });
        }
        let plate = normalize_plate(&vehicle.plate);
        if self
            .vehicles
            .list()?
            .iter()
            .any(|v| normalize_plate(&v.plate) == plate)
        {
            return Err(StoreError::AlreadyExists {
                kind: "vehicle plate",
                id: plate,
            });
        }
        self.vehicles.put(vehicle)
    }

    fn set_vehicle_active(&self, id: &VehicleId, active: bool) -> Result<Vehicle, StoreError> {
        let _lock = self.lock()?;
        let mut vehicle = self.vehicles.get(id)?;
        vehicle.active = active;
        self.vehicles.put(&vehicle)?;
        Ok(vehicle)
    }

    fn update_vehicle_odometer(&self, id: &VehicleId, odometer: u64) -> Result<Vehicle, StoreError> {
        let _lock = self.lock()?;
        let mut vehicle = self.vehicles.get(id)?;
        vehicle.current_odometer = odometer;
        self.vehicles.put(&vehicle)?;
        Ok(vehicle)
    }

    fn adjust_vehicle_odometer(
        &self,
        id: &VehicleId,
        odometer: u64,
    ) -> Result<Vehicle, StoreError> {
        let _lock = self.lock()?;
        let mut vehicle = self.vehicles.get(id)?;
        check_odometer_adjustment(&vehicle, odometer, &self.trips.list()?)?;
        vehicle.current_odometer = odometer;
        self.vehicles.put(&vehicle)?;
        Ok(vehicle)
    }

    fn get_user(&self, id: &UserId) -> Result<User, StoreError> {
        self.users.get(id)
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.users.list()
    }

    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        if self.users.exists(&user.id) {
            return Err(StoreError::AlreadyExists {
                kind: "user",
                id: user.id.to_string(),
            });
        }
        self.users.put(user)
    }

    fn set_user_active(&self, id: &UserId, active: bool) -> Result<User, StoreError> {
        let _lock = self.lock()?;
        let mut user = self.users.get(id)?;
        user.active = active;
        self.users.put(&user)?;
        Ok(user)
    }

    fn get_purpose(&self, id: &PurposeId) -> Result<Purpose, StoreError> {
        self.purposes.get(id)
    }

    fn list_purposes(&self) -> Result<Vec<Purpose>, StoreError> {
        self.purposes.list()
    }

    fn insert_purpose(&self, purpose: &Purpose) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        if self.purposes.exists(&purpose.id) {
            return Err(StoreError::AlreadyExists {
                kind: "purpose",
                id: purpose.id.to_string(),
            });
        }
        let name = purpose.name.trim().to_lowercase();
        if self
            .purposes
            .list()?
            .iter()
            .any(|p| p.name.trim().to_lowercase() == name)
        {
            return Err(StoreError::AlreadyExists {
                kind: "purpose",
                id: purpose.name.clone(),
            });
        }
        self.purposes.put(purpose)
    }

    fn remove_purpose(&self, id: &PurposeId) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        self.purposes.remove(id)
    }

    fn list_maintenance(&self) -> Result<Vec<Maintenance>, StoreError> {
        self.maintenance.list()
    }

    fn insert_maintenance(&self, record: &Maintenance) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        if self.maintenance.exists(&record.id) {
            return Err(StoreError::AlreadyExists {
                kind: "maintenance record",
                id: record.id.to_string(),
            });
        }
        self.maintenance.put(record)
    }

    fn remove_maintenance(&self, id: &MaintenanceId) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        self.maintenance.remove(id)
    }

    fn get_parameter(&self) -> Result<Parameter, StoreError> {
        let path = self.layout.parameter_file();
        if !path.exists() {
            return Ok(Parameter::default());
        }
        let content = fs::read_to_string(&path)?;
        decode("parameter", &content)
    }

    fn update_parameter(&self, patch: &ParameterPatch) -> Result<Parameter, StoreError> {
        let _lock = self.lock()?;
        let mut parameter = self.get_parameter()?;
        patch.apply(&mut parameter, Utc::now());
        let content = encode(&parameter)?;
        write_atomic(&self.layout.parameter_file(), content.as_bytes())?;
        Ok(parameter)
    }

    fn get_trip(&self, id: &TripId) -> Result<TripRequest, StoreError> {
        self.trips.get(id)
    }

    fn list_trips(&self) -> Result<Vec<TripRequest>, StoreError> {
        self.trips.list()
    }

    fn create_trip(&self, trip: &TripRequest) -> Result<(), StoreError> {
        let _lock = self.lock()?;
        if self.trips.exists(&trip.id) {
            return Err(StoreError::AlreadyExists {
                kind: "trip",
                id: trip.id.to_string(),
            });
        }
        self.trips.put(trip)
    }

    fn update_trip(
        &self,
        id: &TripId,
        expected: TripStatus,
        patch: &TripPatch,
    ) -> Result<TripRequest, StoreError> {
        let _lock = self.lock()?;
        let mut trip = self.trips.get(id)?;
        if trip.status != expected {
            return Err(StoreError::StatusConflict {
                trip_id: id.to_string(),
                expected,
                found: trip.status,
            });
        }
        patch.apply(&mut trip);
        self.trips.put(&trip)?;
        debug!("trip {id}: applied {} ({expected} -> {})", patch.name(), trip.status);
        Ok(trip)
    }

    fn approve_trip(
        &self,
        id: &TripId,
        approved_by: &UserId,
        approved_at: DateTime<Utc>,
    ) -> Result<TripRequest, StoreError> {
        let _lock = self.lock()?;
        let mut trip = self.trips.get(id)?;
        if trip.status != TripStatus::Pending {
            return Err(StoreError::StatusConflict {
                trip_id: id.to_string(),
                expected: TripStatus::Pending,
                found: trip.status,
            });
        }
        let vehicle = self.vehicles.get(&trip.vehicle_id)?;
        TripPatch::Approve {
            start_odometer: vehicle.current_odometer,
            approved_at,
            approved_by: approved_by.clone(),
        }
        .apply(&mut trip);
        self.trips.put(&trip)?;
        debug!("trip {id}: approved at odometer {}", vehicle.current_odometer);
        Ok(trip)
    }

    fn commit_completion(
        &self,
        trip_id: &TripId,
        vehicle_id: &VehicleId,
        completion: &Completion,
    ) -> Result<TripRequest, CompletionFailure> {
        let _lock = self.lock()?;
        let trip = self.trips.get(trip_id)?;
        if trip.status != TripStatus::Approved {
            return Err(StoreError::StatusConflict {
                trip_id: trip_id.to_string(),
                expected: TripStatus::Approved,
                found: trip.status,
            }
            .into());
        }
        let vehicle = self.vehicles.get(vehicle_id)?;
        self.completion_transaction(trip, vehicle, completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleetlog_schema::FuelType;

    fn setup() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn vehicle(id: &str, plate: &str, odometer: u64) -> Vehicle {
        Vehicle {
            id: id.into(),
            model: "Toyota Corolla".to_owned(),
            plate: plate.to_owned(),
            year: 2022,
            fuel_type: FuelType::Gasoline,
            current_odometer: odometer,
            active: true,
            created_at: Utc::now(),
        }
    }

    fn pending_trip(id: &str, vehicle: &str) -> TripRequest {
        TripRequest::pending(
            id.into(),
            "user-1".into(),
            vehicle.into(),
            "purp-1".into(),
            "Client Site".to_owned(),
            None,
        )
    }

    fn approve_patch(start: u64) -> TripPatch {
        TripPatch::Approve {
            start_odometer: start,
            approved_at: Utc::now(),
            approved_by: "user-2".into(),
        }
    }

    fn completion(end: u64, distance: u64) -> Completion {
        Completion {
            completed_at: Utc::now(),
            end_odometer: end,
            distance_km: distance,
            fuel_liters: 12.5,
            fuel_type: Some(FuelType::Gasoline),
            refuel_cost: 73.625,
            notes: None,
        }
    }

    #[test]
    fn duplicate_plate_rejected() {
        let (_dir, store) = setup();
        store.insert_vehicle(&vehicle("veh-1", "ABC-1234", 0)).unwrap();
        let err = store
            .insert_vehicle(&vehicle("veh-2", "abc-1234", 0))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { kind: "vehicle plate", .. }));
    }

    #[test]
    fn update_trip_applies_only_on_expected_status() {
        let (_dir, store) = setup();
        store.create_trip(&pending_trip("trip-1", "veh-1")).unwrap();

        let approved = store
            .update_trip(&"trip-1".into(), TripStatus::Pending, &approve_patch(100))
            .unwrap();
        assert_eq!(approved.status, TripStatus::Approved);

        let err = store
            .update_trip(&"trip-1".into(), TripStatus::Pending, &TripPatch::Deny)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::StatusConflict {
                found: TripStatus::Approved,
                ..
            }
        ));
        assert_eq!(
            store.get_trip(&"trip-1".into()).unwrap().status,
            TripStatus::Approved
        );
    }

    #[test]
    fn commit_completion_writes_both_records() {
        let (_dir, store) = setup();
        store.insert_vehicle(&vehicle("veh-1", "ABC-1234", 55000)).unwrap();
        store.create_trip(&pending_trip("trip-1", "veh-1")).unwrap();
        store
            .update_trip(&"trip-1".into(), TripStatus::Pending, &approve_patch(55000))
            .unwrap();

        let trip = store
            .commit_completion(&"trip-1".into(), &"veh-1".into(), &completion(55150, 150))
            .unwrap();
        assert_eq!(trip.status, TripStatus::Completed);
        assert_eq!(
            store.get_vehicle(&"veh-1".into()).unwrap().current_odometer,
            55150
        );
        assert!(store.wal.list_incomplete().unwrap().is_empty());
    }

    #[test]
    fn commit_completion_requires_approved() {
        let (_dir, store) = setup();
        store.insert_vehicle(&vehicle("veh-1", "ABC-1234", 55000)).unwrap();
        store.create_trip(&pending_trip("trip-1", "veh-1")).unwrap();
        let err = store
            .commit_completion(&"trip-1".into(), &"veh-1".into(), &completion(55150, 150))
            .unwrap_err();
        assert!(matches!(
            err,
            CompletionFailure::Rejected(StoreError::StatusConflict { .. })
        ));
        assert_eq!(
            store.get_vehicle(&"veh-1".into()).unwrap().current_odometer,
            55000
        );
    }

    #[test]
    fn missing_parameter_is_default() {
        let (_dir, store) = setup();
        assert!(store.get_parameter().unwrap().fuel_prices.is_empty());
        let updated = store
            .update_parameter(&ParameterPatch::FuelPrice {
                fuel: FuelType::Gasoline,
                price: 5.89,
            })
            .unwrap();
        assert!(updated.updated_at.is_some());
        assert_eq!(
            store.get_parameter().unwrap().fuel_prices.get(FuelType::Gasoline),
            Some(5.89)
        );
    }

    #[test]
    fn concurrent_price_updates_from_separate_handles_all_land() {
        use std::sync::{Arc, Barrier};

        let dir = tempfile::tempdir().unwrap();
        let fuels = [
            FuelType::Gasoline,
            FuelType::Diesel,
            FuelType::Ethanol,
            FuelType::Flex,
        ];
        for round in 1..=10u32 {
            let price = f64::from(round);
            let barrier = Arc::new(Barrier::new(fuels.len()));
            let handles: Vec<_> = fuels
                .iter()
                .map(|&fuel| {
                    let root = dir.path().to_path_buf();
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        let store = FileStore::open(&root).unwrap();
                        barrier.wait();
                        store
                            .update_parameter(&ParameterPatch::FuelPrice { fuel, price })
                            .unwrap();
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
            let prices = FileStore::open(dir.path()).unwrap().get_fuel_prices().unwrap();
            for fuel in fuels {
                assert_eq!(prices.get(fuel), Some(price), "round {round}: {fuel} lost");
            }
        }
    }

    #[test]
    fn approve_trip_snapshots_current_odometer() {
        let (_dir, store) = setup();
        store.insert_vehicle(&vehicle("veh-1", "ABC-1234", 55000)).unwrap();
        store.create_trip(&pending_trip("trip-1", "veh-1")).unwrap();

        let approved = store
            .approve_trip(&"trip-1".into(), &"user-2".into(), Utc::now())
            .unwrap();
        assert_eq!(approved.status, TripStatus::Approved);
        assert_eq!(approved.start_odometer, Some(55000));
        assert_eq!(approved.approved_by, Some("user-2".into()));

        let err = store
            .approve_trip(&"trip-1".into(), &"user-2".into(), Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::StatusConflict {
                found: TripStatus::Approved,
                ..
            }
        ));
    }

    #[test]
    fn approve_trip_with_missing_vehicle_writes_nothing() {
        let (_dir, store) = setup();
        store.create_trip(&pending_trip("trip-1", "veh-9")).unwrap();
        let err = store
            .approve_trip(&"trip-1".into(), &"user-2".into(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "vehicle", .. }));
        assert_eq!(
            store.get_trip(&"trip-1".into()).unwrap().status,
            TripStatus::Pending
        );
    }

    #[test]
    fn adjust_odometer_refuses_decrease_and_in_flight_trips() {
        let (_dir, store) = setup();
        store.insert_vehicle(&vehicle("veh-1", "ABC-1234", 100)).unwrap();

        let err = store.adjust_vehicle_odometer(&"veh-1".into(), 90).unwrap_err();
        assert!(matches!(err, StoreError::OdometerRefused { .. }));

        store.create_trip(&pending_trip("trip-1", "veh-1")).unwrap();
        store
            .approve_trip(&"trip-1".into(), &"user-2".into(), Utc::now())
            .unwrap();
        let err = store.adjust_vehicle_odometer(&"veh-1".into(), 500).unwrap_err();
        assert!(matches!(err, StoreError::OdometerRefused { .. }));
        assert_eq!(
            store.get_vehicle(&"veh-1".into()).unwrap().current_odometer,
            100
        );

        store
            .update_trip(
                &"trip-1".into(),
                TripStatus::Approved,
                &TripPatch::Complete(completion(150, 50)),
            )
            .unwrap();
        let adjusted = store.adjust_vehicle_odometer(&"veh-1".into(), 500).unwrap();
        assert_eq!(adjusted.current_odometer, 500);
    }

    #[test]
    fn write_times_out_while_lock_held_elsewhere() {
        let (dir, store) = setup();
        let store = store.with_lock_timeout(Duration::from_millis(30));
        let lock_file = StoreLayout::new(dir.path()).lock_file();
        let _held = StoreLock::acquire_timeout(&lock_file, Duration::from_secs(5)).unwrap();
        let err = store.create_trip(&pending_trip("trip-1", "veh-1")).unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout(_)));
    }

    #[test]
    fn duplicate_purpose_name_rejected() {
        let (_dir, store) = setup();
        let purpose = |id: &str, name: &str| Purpose {
            id: id.into(),
            name: name.to_owned(),
            created_at: Utc::now(),
        };
        store.insert_purpose(&purpose("purp-1", "Client visit")).unwrap();
        assert!(store
            .insert_purpose(&purpose("purp-2", " client VISIT "))
            .is_err());
    }
}
