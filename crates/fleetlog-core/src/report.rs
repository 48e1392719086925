//! Read-side projections over completed trips and maintenance records.
//!
//! Liters and money are converted to fixed-point hundredths per record before
//! summing, so a report's totals row is the exact integer sum of its rows.

use crate::consumption::average_consumption;
use fleetlog_schema::{Maintenance, TripRequest, TripStatus, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// A quantity with two decimal places, stored as an integer count of 0.01.
/// Serialized as a decimal number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hundredths(i64);

impl Serialize for Hundredths {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Hundredths {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Hundredths::from_f64)
    }
}

impl Hundredths {
    pub const ZERO: Hundredths = Hundredths(0);

    /// Round half away from zero to the nearest hundredth.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Self((value * 100.0).round() as i64)
        } else {
            Self::ZERO
        }
    }

    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Hundredths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Hundredths {
    type Output = Hundredths;
    fn add(self, rhs: Hundredths) -> Hundredths {
        Hundredths(self.0 + rhs.0)
    }
}

impl AddAssign for Hundredths {
    fn add_assign(&mut self, rhs: Hundredths) {
        self.0 += rhs.0;
    }
}

impl Sum for Hundredths {
    fn sum<I: Iterator<Item = Hundredths>>(iter: I) -> Hundredths {
        iter.fold(Hundredths::ZERO, Add::add)
    }
}

/// Summed figures for one group of completed trips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub trips: usize,
    pub distance_km: u64,
    pub fuel_liters: Hundredths,
    pub refuel_cost: Hundredths,
}

impl Aggregate {
    fn add_trip(&mut self, trip: &TripRequest) {
        self.trips += 1;
        self.distance_km += trip.distance_km.unwrap_or(0);
        self.fuel_liters += Hundredths::from_f64(trip.fuel_liters.unwrap_or(0.0));
        self.refuel_cost += Hundredths::from_f64(trip.refuel_cost.unwrap_or(0.0));
    }

    fn merge(&mut self, other: &Aggregate) {
        self.trips += other.trips;
        self.distance_km += other.distance_km;
        self.fuel_liters += other.fuel_liters;
        self.refuel_cost += other.refuel_cost;
    }

    /// Kilometers per liter over the group, zero when no fuel was recorded.
    pub fn km_per_liter(&self) -> f64 {
        average_consumption(self.distance_km as f64, self.fuel_liters.as_f64())
    }
}

/// Groups and their totals. `totals` is always the sum of `groups`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouped<K> {
    pub groups: BTreeMap<K, Aggregate>,
    pub totals: Aggregate,
}

/// Group completed trips by `key_fn` and sum each group. Trips in any other
/// status are ignored. Every report goes through this one routine.
pub fn aggregate_by_key<'a, K, I, F>(trips: I, key_fn: F) -> Grouped<K>
where
    K: Ord,
    I: IntoIterator<Item = &'a TripRequest>,
    F: Fn(&TripRequest) -> K,
{
    let mut groups: BTreeMap<K, Aggregate> = BTreeMap::new();
    for trip in trips {
        if trip.status != TripStatus::Completed {
            continue;
        }
        groups.entry(key_fn(trip)).or_default().add_trip(trip);
    }

    let mut totals = Aggregate::default();
    for aggregate in groups.values() {
        totals.merge(aggregate);
    }
    Grouped { groups, totals }
}

/// Dimension a trip report is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKey {
    Vehicle,
    User,
    Purpose,
}

impl ReportKey {
    pub fn key_of(self, trip: &TripRequest) -> String {
        match self {
            ReportKey::Vehicle => trip.vehicle_id.to_string(),
            ReportKey::User => trip.requester_id.to_string(),
            ReportKey::Purpose => trip.purpose_id.to_string(),
        }
    }
}

impl fmt::Display for ReportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKey::Vehicle => write!(f, "vehicle"),
            ReportKey::User => write!(f, "user"),
            ReportKey::Purpose => write!(f, "purpose"),
        }
    }
}

impl FromStr for ReportKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vehicle" | "vehicles" => Ok(ReportKey::Vehicle),
            "user" | "users" => Ok(ReportKey::User),
            "purpose" | "purposes" => Ok(ReportKey::Purpose),
            _ => Err(ValidationError::Invalid {
                field: "report",
                reason: format!("unknown report '{s}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub key: String,
    pub label: String,
    #[serde(flatten)]
    pub summary: Aggregate,
    pub km_per_liter: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub by: ReportKey,
    pub rows: Vec<ReportRow>,
    pub totals: Aggregate,
    pub km_per_liter: f64,
}

impl Report {
    /// Attach display labels to grouped figures. Rows keep key order.
    pub fn labeled(by: ReportKey, grouped: Grouped<String>, label: impl Fn(&str) -> String) -> Self {
        let rows = grouped
            .groups
            .into_iter()
            .map(|(key, summary)| ReportRow {
                label: label(&key),
                km_per_liter: summary.km_per_liter(),
                key,
                summary,
            })
            .collect();
        Report {
            by,
            rows,
            km_per_liter: grouped.totals.km_per_liter(),
            totals: grouped.totals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceRow {
    pub vehicle_id: String,
    pub label: String,
    pub records: usize,
    pub total_cost: Hundredths,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceReport {
    pub rows: Vec<MaintenanceRow>,
    pub records: usize,
    pub total_cost: Hundredths,
}

impl MaintenanceReport {
    pub fn build(records: &[Maintenance], label: impl Fn(&str) -> String) -> Self {
        let mut by_vehicle: BTreeMap<&str, (usize, Hundredths)> = BTreeMap::new();
        for record in records {
            let entry = by_vehicle.entry(record.vehicle_id.as_str()).or_default();
            entry.0 += 1;
            entry.1 += Hundredths::from_f64(record.cost);
        }
        let rows: Vec<MaintenanceRow> = by_vehicle
            .into_iter()
            .map(|(vehicle_id, (count, cost))| MaintenanceRow {
                vehicle_id: vehicle_id.to_owned(),
                label: label(vehicle_id),
                records: count,
                total_cost: cost,
            })
            .collect();
        MaintenanceReport {
            records: rows.iter().map(|r| r.records).sum(),
            total_cost: rows.iter().map(|r| r.total_cost).sum(),
            rows,
        }
    }
}

/// Landing-page counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub pending: usize,
    /// Approved trips (and `InUse`, should it ever be produced).
    pub active: usize,
    pub vehicles: usize,
    /// Up to five most recently completed trips, newest first.
    pub recent_completed: Vec<TripRequest>,
}

pub const DASHBOARD_RECENT: usize = 5;

impl Dashboard {
    pub fn build(trips: &[TripRequest], vehicle_count: usize) -> Self {
        let pending = trips
            .iter()
            .filter(|t| t.status == TripStatus::Pending)
            .count();
        let active = trips.iter().filter(|t| t.status.is_in_flight()).count();
        let mut completed: Vec<TripRequest> = trips
            .iter()
            .filter(|t| t.status == TripStatus::Completed)
            .cloned()
            .collect();
        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        completed.truncate(DASHBOARD_RECENT);
        Dashboard {
            pending,
            active,
            vehicles: vehicle_count,
            recent_completed: completed,
        }
    }
}
