use super::{active_label, json_pretty, Context, EXIT_SUCCESS};
use fleetlog_schema::{FuelType, NewVehicle, Vehicle, VehicleId};

fn print_vehicle(v: &Vehicle) {
    println!("id:        {}", v.id);
    println!("model:     {}", v.model);
    println!("plate:     {}", v.plate);
    println!("year:      {}", v.year);
    println!("fuel:      {}", v.fuel_type);
    println!("odometer:  {} km", v.current_odometer);
    println!("status:    {}", active_label(v.active));
}

fn emit(ctx: &Context<'_>, v: &Vehicle, verb: &str) -> Result<u8, String> {
    if ctx.json {
        println!("{}", json_pretty(v)?);
    } else {
        println!("{verb} vehicle {} ({})", v.id, v.plate);
    }
    Ok(EXIT_SUCCESS)
}

pub fn add(
    ctx: &Context<'_>,
    model: String,
    plate: String,
    year: u16,
    fuel_type: FuelType,
    current_odometer: u64,
) -> Result<u8, String> {
    let vehicle = ctx
        .engine
        .register_vehicle(
            &ctx.admin(),
            NewVehicle {
                model,
                plate,
                year,
                fuel_type,
                current_odometer,
            },
        )
        .map_err(|e| e.to_string())?;
    emit(ctx, &vehicle, "registered")
}

pub fn list(ctx: &Context<'_>) -> Result<u8, String> {
    let vehicles = ctx.engine.list_vehicles().map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&vehicles)?);
    } else if vehicles.is_empty() {
        println!("no vehicles registered");
    } else {
        println!(
            "{:<18} {:<10} {:<22} {:<6} {:<9} {:>10}  STATUS",
            "ID", "PLATE", "MODEL", "YEAR", "FUEL", "ODOMETER"
        );
        for v in &vehicles {
            println!(
                "{:<18} {:<10} {:<22} {:<6} {:<9} {:>10}  {}",
                v.id,
                v.plate,
                v.model,
                v.year,
                v.fuel_type.to_string(),
                v.current_odometer,
                active_label(v.active)
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

pub fn show(ctx: &Context<'_>, id: &str) -> Result<u8, String> {
    let vehicle = ctx
        .engine
        .get_vehicle(&VehicleId::new(id))
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&vehicle)?);
    } else {
        print_vehicle(&vehicle);
    }
    Ok(EXIT_SUCCESS)
}

pub fn set_active(ctx: &Context<'_>, id: &str, active: bool) -> Result<u8, String> {
    let vehicle = ctx
        .engine
        .set_vehicle_active(&ctx.admin(), &VehicleId::new(id), active)
        .map_err(|e| e.to_string())?;
    emit(ctx, &vehicle, if active { "activated" } else { "deactivated" })
}

pub fn odometer(ctx: &Context<'_>, id: &str, value: u64) -> Result<u8, String> {
    let vehicle = ctx
        .engine
        .adjust_odometer(&ctx.admin(), &VehicleId::new(id), value)
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&vehicle)?);
    } else {
        println!(
            "vehicle {} odometer set to {} km",
            vehicle.plate, vehicle.current_odometer
        );
    }
    Ok(EXIT_SUCCESS)
}
