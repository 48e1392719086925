use super::{json_pretty, Context, EXIT_SUCCESS};

pub fn run(ctx: &Context<'_>) -> Result<u8, String> {
    let dashboard = ctx.engine.dashboard().map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&dashboard)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("pending requests:  {}", dashboard.pending);
    println!("active trips:      {}", dashboard.active);
    println!("vehicles:          {}", dashboard.vehicles);
    if dashboard.recent_completed.is_empty() {
        return Ok(EXIT_SUCCESS);
    }
    println!("recently completed:");
    for t in &dashboard.recent_completed {
        println!(
            "  {:<19} {:<18} {:>6} km  {}",
            t.id,
            t.vehicle_id,
            t.distance_km.unwrap_or_default(),
            t.destination
        );
    }
    Ok(EXIT_SUCCESS)
}
