use crate::layout::StoreLayout;
use crate::records::{Record, RecordStore};
use crate::wal::WriteAheadLog;
use crate::StoreError;
use fleetlog_schema::{Maintenance, Purpose, TripRequest, User, Vehicle};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub checked: usize,
    pub passed: usize,
    pub failed: Vec<IntegrityFailure>,
    pub trips_checked: usize,
    pub trips_consistent: usize,
    /// WAL entries left by a process that died mid-transaction.
    pub incomplete_transactions: usize,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.incomplete_transactions == 0
    }
}

#[derive(Debug)]
pub struct IntegrityFailure {
    pub key: String,
    pub reason: String,
}

fn check_collection<T: Record>(
    layout: &StoreLayout,
    report: &mut IntegrityReport,
) -> Result<Vec<T>, StoreError> {
    let store: RecordStore<T> = RecordStore::new(layout.clone());
    let mut ok = Vec::new();
    for entry in store.list_with_errors()? {
        report.checked += 1;
        match entry {
            Ok(record) => {
                report.passed += 1;
                ok.push(record);
            }
            Err((key, StoreError::IntegrityFailure { actual, .. })) => {
                report.failed.push(IntegrityFailure {
                    key,
                    reason: format!("{} checksum mismatch: got {actual}", T::KIND),
                });
            }
            Err((key, e)) => {
                report.failed.push(IntegrityFailure {
                    key,
                    reason: format!("{} read error: {e}", T::KIND),
                });
            }
        }
    }
    Ok(ok)
}

/// Read every record, verify checksums, check trip invariants and references,
/// and count unfinished transactions. Read-only: nothing is repaired.
pub fn verify_store_integrity(layout: &StoreLayout) -> Result<IntegrityReport, StoreError> {
    let mut report = IntegrityReport::default();

    let vehicles = check_collection::<Vehicle>(layout, &mut report)?;
    check_collection::<User>(layout, &mut report)?;
    check_collection::<Purpose>(layout, &mut report)?;
    check_collection::<Maintenance>(layout, &mut report)?;
    let trips = check_collection::<TripRequest>(layout, &mut report)?;

    let vehicle_ids: HashSet<&str> = vehicles.iter().map(|v| v.id.as_str()).collect();
    for trip in &trips {
        report.trips_checked += 1;
        let mut consistent = true;
        if let Err(e) = trip.check_invariants() {
            consistent = false;
            report.failed.push(IntegrityFailure {
                key: trip.id.to_string(),
                reason: e.to_string(),
            });
        }
        if !vehicle_ids.contains(trip.vehicle_id.as_str()) {
            consistent = false;
            report.failed.push(IntegrityFailure {
                key: trip.id.to_string(),
                reason: format!("references missing vehicle {}", trip.vehicle_id),
            });
        }
        if consistent {
            report.trips_consistent += 1;
        }
    }

    report.incomplete_transactions = WriteAheadLog::new(layout).list_incomplete()?.len();
    Ok(report)
}
