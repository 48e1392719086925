use crate::fuel::{FuelPriceTable, FuelType};
use crate::types::{MaintenanceId, PurposeId, UserId, VehicleId};
use crate::validate::{non_blank, validate_amount, validate_plate, validate_year};
use crate::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub model: String,
    pub plate: String,
    pub year: u16,
    pub fuel_type: FuelType,
    /// Kilometers. Written by trip completion or an administrative adjustment.
    pub current_odometer: u64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVehicle {
    pub model: String,
    pub plate: String,
    pub year: u16,
    pub fuel_type: FuelType,
    #[serde(default)]
    pub current_odometer: u64,
}

impl NewVehicle {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_blank("model", &self.model)?;
        validate_plate(&self.plate)?;
        validate_year(self.year)?;
        Ok(())
    }

    pub fn into_vehicle(self, id: VehicleId) -> Vehicle {
        Vehicle {
            id,
            model: self.model.trim().to_owned(),
            plate: normalize_plate(&self.plate),
            year: self.year,
            fuel_type: self.fuel_type,
            current_odometer: self.current_odometer,
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// Plates compare case-insensitively and without surrounding whitespace.
pub fn normalize_plate(plate: &str) -> String {
    plate.trim().to_uppercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    #[serde(alias = "Administrador")]
    Administrator,
    #[serde(alias = "Operador")]
    Operator,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Administrator => write!(f, "administrator"),
            UserRole::Operator => write!(f, "operator"),
        }
    }
}

impl FromStr for UserRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "administrator" | "admin" | "administrador" => Ok(UserRole::Administrator),
            "operator" | "operador" => Ok(UserRole::Operator),
            _ => Err(ValidationError::UnknownRole(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: UserRole,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purpose {
    pub id: PurposeId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maintenance {
    pub id: MaintenanceId,
    pub vehicle_id: VehicleId,
    pub date: NaiveDate,
    pub description: String,
    pub cost: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMaintenance {
    pub vehicle_id: VehicleId,
    pub date: NaiveDate,
    pub description: String,
    pub cost: f64,
}

impl NewMaintenance {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_blank("vehicle", &self.vehicle_id)?;
        non_blank("description", &self.description)?;
        validate_amount("maintenance cost", self.cost)?;
        Ok(())
    }

    pub fn into_record(self, id: MaintenanceId) -> Maintenance {
        Maintenance {
            id,
            vehicle_id: self.vehicle_id,
            date: self.date,
            description: self.description.trim().to_owned(),
            cost: self.cost,
            created_at: Utc::now(),
        }
    }
}

/// Company identification shown on reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    #[serde(default)]
    pub legal_name: String,
    #[serde(default)]
    pub trade_name: String,
    /// National registry number (CNPJ in Brazil).
    #[serde(default)]
    pub tax_id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub responsible: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Singleton configuration record: company data and current fuel prices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub company: CompanyProfile,
    #[serde(default)]
    pub fuel_prices: FuelPriceTable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A change to the [`Parameter`] record. Stores apply it to the current
/// record under their write lock, so concurrent edits of different fields
/// all survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterPatch {
    Company(CompanyProfile),
    FuelPrice { fuel: FuelType, price: f64 },
}

impl ParameterPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            ParameterPatch::Company(_) => Ok(()),
            ParameterPatch::FuelPrice { price, .. } => validate_amount("fuel price", *price),
        }
    }

    pub fn apply(&self, parameter: &mut Parameter, at: DateTime<Utc>) {
        match self {
            ParameterPatch::Company(company) => parameter.company.clone_from(company),
            ParameterPatch::FuelPrice { fuel, price } => {
                let prices = std::mem::take(&mut parameter.fuel_prices);
                parameter.fuel_prices = prices.with(*fuel, *price);
            }
        }
        parameter.updated_at = Some(at);
    }
}
