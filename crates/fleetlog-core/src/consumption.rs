//! Distance and refuel cost. Pure functions; the price table is passed in.

use fleetlog_schema::{FuelPriceTable, FuelType};

/// `end - start`. The engine rejects `end < start` before calling this; a
/// reversed pair saturates to zero instead of wrapping.
pub fn compute_distance(start: u64, end: u64) -> u64 {
    end.saturating_sub(start)
}

/// Liters times the configured price. Zero when no fuel was added, no fuel
/// type was given, or the table has no price for it.
pub fn compute_refuel_cost(
    fuel_liters: f64,
    fuel_type: Option<FuelType>,
    prices: &FuelPriceTable,
) -> f64 {
    if fuel_liters.is_nan() || fuel_liters <= 0.0 {
        return 0.0;
    }
    match fuel_type {
        Some(fuel) => fuel_liters * prices.price_or_zero(fuel),
        None => 0.0,
    }
}

/// Kilometers per liter, or zero when no fuel was recorded.
pub fn average_consumption(distance_km: f64, fuel_liters: f64) -> f64 {
    if fuel_liters > 0.0 {
        distance_km / fuel_liters
    } else {
        0.0
    }
}
