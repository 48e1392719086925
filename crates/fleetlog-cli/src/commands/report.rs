use super::{json_pretty, Context, EXIT_SUCCESS};
use fleetlog_core::ReportKey;

pub fn trips(ctx: &Context<'_>, by: ReportKey) -> Result<u8, String> {
    let report = ctx.engine.report(by).map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }
    if report.rows.is_empty() {
        println!("no completed trips");
        return Ok(EXIT_SUCCESS);
    }

    println!(
        "{:<32} {:>6} {:>10} {:>10} {:>12} {:>8}",
        by.to_string().to_uppercase(),
        "TRIPS",
        "KM",
        "LITERS",
        "COST",
        "KM/L"
    );
    for row in &report.rows {
        println!(
            "{:<32} {:>6} {:>10} {:>10} {:>12} {:>8.2}",
            row.label,
            row.summary.trips,
            row.summary.distance_km,
            row.summary.fuel_liters.to_string(),
            row.summary.refuel_cost.to_string(),
            row.km_per_liter
        );
    }
    println!(
        "{:<32} {:>6} {:>10} {:>10} {:>12} {:>8.2}",
        "TOTAL",
        report.totals.trips,
        report.totals.distance_km,
        report.totals.fuel_liters.to_string(),
        report.totals.refuel_cost.to_string(),
        report.km_per_liter
    );
    Ok(EXIT_SUCCESS)
}

pub fn maintenance(ctx: &Context<'_>) -> Result<u8, String> {
    let report = ctx.engine.maintenance_report().map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }
    if report.rows.is_empty() {
        println!("no maintenance records");
        return Ok(EXIT_SUCCESS);
    }

    println!("{:<32} {:>8} {:>12}", "VEHICLE", "RECORDS", "COST");
    for row in &report.rows {
        println!(
            "{:<32} {:>8} {:>12}",
            row.label,
            row.records,
            row.total_cost.to_string()
        );
    }
    println!(
        "{:<32} {:>8} {:>12}",
        "TOTAL",
        report.records,
        report.total_cost.to_string()
    );
    Ok(EXIT_SUCCESS)
}
