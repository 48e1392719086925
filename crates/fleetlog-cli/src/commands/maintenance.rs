use super::{json_pretty, Context, EXIT_SUCCESS};
use chrono::NaiveDate;
use fleetlog_core::Hundredths;
use fleetlog_schema::{MaintenanceId, NewMaintenance, VehicleId};

pub fn add(
    ctx: &Context<'_>,
    vehicle: String,
    description: String,
    cost: f64,
    date: Option<NaiveDate>,
) -> Result<u8, String> {
    let record = ctx
        .engine
        .add_maintenance(
            &ctx.admin(),
            NewMaintenance {
                vehicle_id: VehicleId::new(vehicle),
                date: date.unwrap_or_else(|| chrono::Local::now().date_naive()),
                description,
                cost,
            },
        )
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&record)?);
    } else {
        println!(
            "recorded maintenance {} for {} on {}",
            record.id, record.vehicle_id, record.date
        );
    }
    Ok(EXIT_SUCCESS)
}

pub fn list(ctx: &Context<'_>, vehicle: Option<&str>) -> Result<u8, String> {
    let vehicle = vehicle.map(VehicleId::new);
    let records = ctx
        .engine
        .list_maintenance(vehicle.as_ref())
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&records)?);
    } else if records.is_empty() {
        println!("no maintenance records");
    } else {
        println!(
            "{:<18} {:<18} {:<10} {:>10}  DESCRIPTION",
            "ID", "VEHICLE", "DATE", "COST"
        );
        for m in &records {
            println!(
                "{:<18} {:<18} {:<10} {:>10}  {}",
                m.id,
                m.vehicle_id,
                m.date,
                Hundredths::from_f64(m.cost).to_string(),
                m.description
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

pub fn remove(ctx: &Context<'_>, id: &str) -> Result<u8, String> {
    ctx.engine
        .remove_maintenance(&ctx.admin(), &MaintenanceId::new(id))
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&serde_json::json!({ "removed": id }))?);
    } else {
        println!("removed maintenance record {id}");
    }
    Ok(EXIT_SUCCESS)
}
