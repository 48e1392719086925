use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Fuel a vehicle runs on, or that was refilled at the end of a trip.
///
/// Deserialization also accepts the Portuguese labels used by older records
/// ("Gasolina", "Etanol", "Elétrico").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FuelType {
    #[serde(alias = "Gasolina")]
    Gasoline,
    Flex,
    Diesel,
    #[serde(alias = "Etanol")]
    Ethanol,
    #[serde(alias = "Elétrico", alias = "Eletrico")]
    Electric,
}

impl FuelType {
    pub const ALL: [FuelType; 5] = [
        FuelType::Gasoline,
        FuelType::Flex,
        FuelType::Diesel,
        FuelType::Ethanol,
        FuelType::Electric,
    ];
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuelType::Gasoline => write!(f, "gasoline"),
            FuelType::Flex => write!(f, "flex"),
            FuelType::Diesel => write!(f, "diesel"),
            FuelType::Ethanol => write!(f, "ethanol"),
            FuelType::Electric => write!(f, "electric"),
        }
    }
}

impl FromStr for FuelType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gasoline" | "gasolina" => Ok(FuelType::Gasoline),
            "flex" => Ok(FuelType::Flex),
            "diesel" => Ok(FuelType::Diesel),
            "ethanol" | "etanol" => Ok(FuelType::Ethanol),
            "electric" | "eletrico" | "elétrico" => Ok(FuelType::Electric),
            _ => Err(ValidationError::UnknownFuelType(s.to_owned())),
        }
    }
}

/// Current per-liter price for each fuel type.
///
/// Lookup is total over [`FuelType`]: a fuel with no configured price costs
/// zero, so a configuration gap never blocks trip completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FuelPriceTable(BTreeMap<FuelType, f64>);

impl FuelPriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configured price, if any.
    pub fn get(&self, fuel: FuelType) -> Option<f64> {
        self.0.get(&fuel).copied()
    }

    /// Configured price, defaulting to zero when none is set.
    pub fn price_or_zero(&self, fuel: FuelType) -> f64 {
        self.get(fuel).unwrap_or(0.0)
    }

    pub fn set(&mut self, fuel: FuelType, price: f64) -> Result<(), ValidationError> {
        if !price.is_finite() || price < 0.0 {
            return Err(ValidationError::invalid(
                "fuel price",
                format!("{price} is not a non-negative amount"),
            ));
        }
        self.0.insert(fuel, price);
        Ok(())
    }

    #[must_use]
    pub fn with(mut self, fuel: FuelType, price: f64) -> Self {
        if price.is_finite() && price >= 0.0 {
            self.0.insert(fuel, price);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (FuelType, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
