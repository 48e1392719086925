use super::{json_pretty, Context, EXIT_STORE_ERROR, EXIT_SUCCESS};

pub fn run(ctx: &Context<'_>) -> Result<u8, String> {
    let report = ctx.engine.verify_store().map_err(|e| e.to_string())?;

    if ctx.json {
        let payload = serde_json::json!({
            "checked": report.checked,
            "passed": report.passed,
            "failed": report.failed.len(),
            "trips_checked": report.trips_checked,
            "trips_consistent": report.trips_consistent,
            "incomplete_transactions": report.incomplete_transactions,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "store integrity: {}/{} records passed, {}/{} trips consistent",
            report.passed, report.checked, report.trips_consistent, report.trips_checked
        );
        for f in &report.failed {
            println!("  FAIL {}: {}", f.key, f.reason);
        }
        if report.incomplete_transactions > 0 {
            println!(
                "  {} incomplete transaction(s) pending rollback",
                report.incomplete_transactions
            );
        }
    }

    if report.is_clean() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_STORE_ERROR)
    }
}
