use super::{colorize_status, json_pretty, Context, EXIT_SUCCESS};
use console::{pad_str, Alignment};
use fleetlog_core::{CompletionInput, NewTripRequest, TripFilter};
use fleetlog_schema::{FuelType, PurposeId, TripId, TripRequest, TripStatus, UserId, VehicleId};

fn print_trip(t: &TripRequest) {
    println!("id:           {}", t.id);
    println!("status:       {}", colorize_status(t.status));
    println!("requester:    {}", t.requester_id);
    println!("vehicle:      {}", t.vehicle_id);
    println!("purpose:      {}", t.purpose_id);
    println!("destination:  {}", t.destination);
    println!("requested:    {}", t.requested_at.format("%Y-%m-%d %H:%M"));
    if let (Some(at), Some(by)) = (t.approved_at, &t.approved_by) {
        println!("approved:     {} by {by}", at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(start) = t.start_odometer {
        println!("start km:     {start}");
    }
    if let (Some(end), Some(distance)) = (t.end_odometer, t.distance_km) {
        println!("end km:       {end} ({distance} km driven)");
    }
    if let Some(liters) = t.fuel_liters {
        let fuel = t.fuel_type.map(|f| f.to_string()).unwrap_or_default();
        println!("refuel:       {liters:.2} L {fuel}");
    }
    if let Some(cost) = t.refuel_cost {
        println!("refuel cost:  {cost:.2}");
    }
    if let Some(notes) = &t.notes {
        println!("notes:        {notes}");
    }
}

fn emit(ctx: &Context<'_>, trip: &TripRequest) -> Result<u8, String> {
    if ctx.json {
        println!("{}", json_pretty(trip)?);
    } else {
        println!("trip {} is {}", trip.id, colorize_status(trip.status));
    }
    Ok(EXIT_SUCCESS)
}

pub fn request(
    ctx: &Context<'_>,
    vehicle: String,
    purpose: String,
    destination: String,
    notes: Option<String>,
) -> Result<u8, String> {
    let trip = ctx
        .engine
        .create_request(
            &ctx.requester()?,
            NewTripRequest {
                vehicle_id: VehicleId::new(vehicle),
                purpose_id: PurposeId::new(purpose),
                destination,
                notes,
            },
        )
        .map_err(|e| e.to_string())?;
    emit(ctx, &trip)
}

pub fn approve(ctx: &Context<'_>, id: &str) -> Result<u8, String> {
    let trip = ctx
        .engine
        .approve(&ctx.requester()?, &TripId::new(id))
        .map_err(|e| e.to_string())?;
    emit(ctx, &trip)
}

pub fn deny(ctx: &Context<'_>, id: &str) -> Result<u8, String> {
    let trip = ctx
        .engine
        .deny(&ctx.requester()?, &TripId::new(id))
        .map_err(|e| e.to_string())?;
    emit(ctx, &trip)
}

pub fn complete(
    ctx: &Context<'_>,
    id: &str,
    end_odometer: u64,
    fuel_liters: f64,
    fuel_type: Option<FuelType>,
    notes: Option<String>,
) -> Result<u8, String> {
    let trip = ctx
        .engine
        .complete(
            &ctx.requester()?,
            &TripId::new(id),
            CompletionInput {
                end_odometer,
                fuel_liters,
                fuel_type,
                notes,
            },
        )
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&trip)?);
    } else {
        println!(
            "trip {} completed: {} km, refuel cost {:.2}",
            trip.id,
            trip.distance_km.unwrap_or_default(),
            trip.refuel_cost.unwrap_or_default()
        );
    }
    Ok(EXIT_SUCCESS)
}

pub fn notes(ctx: &Context<'_>, id: &str, text: Option<String>) -> Result<u8, String> {
    let trip = ctx
        .engine
        .update_notes(&ctx.requester()?, &TripId::new(id), text)
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&trip)?);
    } else if trip.notes.is_some() {
        println!("notes of trip {} updated", trip.id);
    } else {
        println!("notes of trip {} cleared", trip.id);
    }
    Ok(EXIT_SUCCESS)
}

pub fn list(
    ctx: &Context<'_>,
    status: Option<TripStatus>,
    vehicle: Option<String>,
    requester: Option<String>,
) -> Result<u8, String> {
    let filter = TripFilter {
        status,
        vehicle_id: vehicle.map(VehicleId::new),
        requester_id: requester.map(UserId::new),
    };
    let trips = ctx.engine.list_trips(&filter).map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&trips)?);
    } else if trips.is_empty() {
        println!("no trips found");
    } else {
        println!(
            "{:<19} {:<10} {:<18} {:<16} {:>8}  DESTINATION",
            "ID", "STATUS", "VEHICLE", "REQUESTED", "KM"
        );
        for t in &trips {
            let km = t.distance_km.map(|d| d.to_string()).unwrap_or_default();
            let status = colorize_status(t.status);
            println!(
                "{:<19} {} {:<18} {:<16} {:>8}  {}",
                t.id,
                pad_str(&status, 10, Alignment::Left, None),
                t.vehicle_id,
                t.requested_at.format("%Y-%m-%d %H:%M").to_string(),
                km,
                t.destination
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

pub fn show(ctx: &Context<'_>, id: &str) -> Result<u8, String> {
    let trip = ctx
        .engine
        .get_trip(&TripId::new(id))
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&trip)?);
    } else {
        print_trip(&trip);
    }
    Ok(EXIT_SUCCESS)
}
