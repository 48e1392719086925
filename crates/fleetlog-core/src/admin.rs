//! Catalogue maintenance, parameters and report projections.
//!
//! Administrative calls take the acting identity for the audit log only; no
//! role is enforced here.

use crate::engine::{Engine, RequesterIdentity};
use crate::report::{aggregate_by_key, Dashboard, MaintenanceReport, Report, ReportKey};
use crate::CoreError;
use fleetlog_schema::validate::non_blank;
use fleetlog_schema::{
    CompanyProfile, FuelType, Maintenance, MaintenanceId, NewMaintenance, NewVehicle, Parameter,
    ParameterPatch, Purpose, PurposeId, User, UserId, UserRole, ValidationError, Vehicle,
    VehicleId,
};
use fleetlog_store::{mint_id, verify_store_integrity, EntityStore, FileStore, IntegrityReport};
use std::collections::HashMap;
use tracing::info;

impl<S: EntityStore> Engine<S> {
    pub fn register_vehicle(
        &self,
        actor: &RequesterIdentity,
        input: NewVehicle,
    ) -> Result<Vehicle, CoreError> {
        info!("{} registering vehicle {}", actor.user_id, input.plate);
        input.validate()?;
        let vehicle = input.into_vehicle(VehicleId::new(mint_id(VehicleId::PREFIX)));
        self.store.insert_vehicle(&vehicle)?;
        Ok(vehicle)
    }

    pub fn get_vehicle(&self, id: &VehicleId) -> Result<Vehicle, CoreError> {
        Ok(self.store.get_vehicle(id)?)
    }

    /// All vehicles ordered by plate.
    pub fn list_vehicles(&self) -> Result<Vec<Vehicle>, CoreError> {
        let mut vehicles = self.store.list_vehicles()?;
        vehicles.sort_by(|a, b| a.plate.cmp(&b.plate));
        Ok(vehicles)
    }

    pub fn set_vehicle_active(
        &self,
        actor: &RequesterIdentity,
        id: &VehicleId,
        active: bool,
    ) -> Result<Vehicle, CoreError> {
        info!("{} setting vehicle {id} active={active}", actor.user_id);
        Ok(self.store.set_vehicle_active(id, active)?)
    }

    /// Administrative odometer correction. The reading may only grow, and not
    /// while an approved trip holds a snapshot of the current value.
    pub fn adjust_odometer(
        &self,
        actor: &RequesterIdentity,
        id: &VehicleId,
        odometer: u64,
    ) -> Result<Vehicle, CoreError> {
        info!("{} adjusting odometer of {id} to {odometer}", actor.user_id);
        Ok(self.store.adjust_vehicle_odometer(id, odometer)?)
    }

    pub fn register_user(
        &self,
        actor: &RequesterIdentity,
        name: &str,
        role: UserRole,
    ) -> Result<User, CoreError> {
        info!("{} registering user {name} ({role})", actor.user_id);
        non_blank("name", name)?;
        let user = User {
            id: UserId::new(mint_id(UserId::PREFIX)),
            name: name.trim().to_owned(),
            role,
            active: true,
            created_at: chrono::Utc::now(),
        };
        self.store.insert_user(&user)?;
        Ok(user)
    }

    pub fn get_user(&self, id: &UserId) -> Result<User, CoreError> {
        Ok(self.store.get_user(id)?)
    }

    pub fn list_users(&self) -> Result<Vec<User>, CoreError> {
        let mut users = self.store.list_users()?;
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    pub fn set_user_active(
        &self,
        actor: &RequesterIdentity,
        id: &UserId,
        active: bool,
    ) -> Result<User, CoreError> {
        info!("{} setting user {id} active={active}", actor.user_id);
        Ok(self.store.set_user_active(id, active)?)
    }

    pub fn add_purpose(&self, actor: &RequesterIdentity, name: &str) -> Result<Purpose, CoreError> {
        info!("{} adding purpose {name}", actor.user_id);
        non_blank("purpose name", name)?;
        let purpose = Purpose {
            id: PurposeId::new(mint_id(PurposeId::PREFIX)),
            name: name.trim().to_owned(),
            created_at: chrono::Utc::now(),
        };
        self.store.insert_purpose(&purpose)?;
        Ok(purpose)
    }

    pub fn list_purposes(&self) -> Result<Vec<Purpose>, CoreError> {
        let mut purposes = self.store.list_purposes()?;
        purposes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(purposes)
    }

    /// Refused while any trip still references the purpose.
    pub fn remove_purpose(&self, actor: &RequesterIdentity, id: &PurposeId) -> Result<(), CoreError> {
        info!("{} removing purpose {id}", actor.user_id);
        self.store.get_purpose(id)?;
        let referenced = self
            .store
            .list_trips()?
            .iter()
            .filter(|t| t.purpose_id == *id)
            .count();
        if referenced > 0 {
            return Err(ValidationError::Invalid {
                field: "purpose",
                reason: format!("referenced by {referenced} trip(s)"),
            }
            .into());
        }
        Ok(self.store.remove_purpose(id)?)
    }

    pub fn add_maintenance(
        &self,
        actor: &RequesterIdentity,
        input: NewMaintenance,
    ) -> Result<Maintenance, CoreError> {
        info!(
            "{} recording maintenance for {}",
            actor.user_id, input.vehicle_id
        );
        input.validate()?;
        self.store.get_vehicle(&input.vehicle_id)?;
        let record = input.into_record(MaintenanceId::new(mint_id(MaintenanceId::PREFIX)));
        self.store.insert_maintenance(&record)?;
        Ok(record)
    }

    /// Maintenance records, newest first, optionally for one vehicle.
    pub fn list_maintenance(
        &self,
        vehicle: Option<&VehicleId>,
    ) -> Result<Vec<Maintenance>, CoreError> {
        let mut records: Vec<Maintenance> = self
            .store
            .list_maintenance()?
            .into_iter()
            .filter(|m| vehicle.map_or(true, |v| m.vehicle_id == *v))
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(records)
    }

    pub fn remove_maintenance(
        &self,
        actor: &RequesterIdentity,
        id: &MaintenanceId,
    ) -> Result<(), CoreError> {
        info!("{} removing maintenance record {id}", actor.user_id);
        Ok(self.store.remove_maintenance(id)?)
    }

    pub fn parameters(&self) -> Result<Parameter, CoreError> {
        Ok(self.store.get_parameter()?)
    }

    pub fn set_company(
        &self,
        actor: &RequesterIdentity,
        company: CompanyProfile,
    ) -> Result<Parameter, CoreError> {
        info!("{} updating company profile", actor.user_id);
        Ok(self
            .store
            .update_parameter(&ParameterPatch::Company(company))?)
    }

    /// Takes effect for completions from now on; recorded costs are never
    /// recomputed.
    pub fn set_fuel_price(
        &self,
        actor: &RequesterIdentity,
        fuel: FuelType,
        price: f64,
    ) -> Result<Parameter, CoreError> {
        info!("{} setting {fuel} price to {price}", actor.user_id);
        let patch = ParameterPatch::FuelPrice { fuel, price };
        patch.validate()?;
        Ok(self.store.update_parameter(&patch)?)
    }

    /// Consumption report over completed trips grouped by `by`.
    pub fn report(&self, by: ReportKey) -> Result<Report, CoreError> {
        let trips = self.store.list_trips()?;
        let labels: HashMap<String, String> = match by {
            ReportKey::Vehicle => self
                .store
                .list_vehicles()?
                .into_iter()
                .map(|v| (v.id.to_string(), vehicle_label(&v)))
                .collect(),
            ReportKey::User => self
                .store
                .list_users()?
                .into_iter()
                .map(|u| (u.id.into_inner(), u.name))
                .collect(),
            ReportKey::Purpose => self
                .store
                .list_purposes()?
                .into_iter()
                .map(|p| (p.id.into_inner(), p.name))
                .collect(),
        };
        let grouped = aggregate_by_key(&trips, |t| by.key_of(t));
        Ok(Report::labeled(by, grouped, |key| {
            labels
                .get(key)
                .cloned()
                .unwrap_or_else(|| format!("unknown {by}"))
        }))
    }

    pub fn maintenance_report(&self) -> Result<MaintenanceReport, CoreError> {
        let records = self.store.list_maintenance()?;
        let labels: HashMap<String, String> = self
            .store
            .list_vehicles()?
            .into_iter()
            .map(|v| (v.id.to_string(), vehicle_label(&v)))
            .collect();
        Ok(MaintenanceReport::build(&records, |key| {
            labels
                .get(key)
                .cloned()
                .unwrap_or_else(|| "unknown vehicle".to_owned())
        }))
    }

    pub fn dashboard(&self) -> Result<Dashboard, CoreError> {
        let trips = self.store.list_trips()?;
        let vehicles = self.store.list_vehicles()?.len();
        Ok(Dashboard::build(&trips, vehicles))
    }
}

impl Engine<FileStore> {
    /// Check every record's checksum and every trip's invariants.
    pub fn verify_store(&self) -> Result<IntegrityReport, CoreError> {
        Ok(verify_store_integrity(self.store.layout())?)
    }
}

fn vehicle_label(v: &Vehicle) -> String {
    format!("{} ({})", v.model, v.plate)
}
