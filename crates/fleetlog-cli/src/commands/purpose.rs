use super::{json_pretty, Context, EXIT_SUCCESS};
use fleetlog_schema::PurposeId;

pub fn add(ctx: &Context<'_>, name: &str) -> Result<u8, String> {
    let purpose = ctx
        .engine
        .add_purpose(&ctx.admin(), name)
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&purpose)?);
    } else {
        println!("added purpose '{}' ({})", purpose.name, purpose.id);
    }
    Ok(EXIT_SUCCESS)
}

pub fn list(ctx: &Context<'_>) -> Result<u8, String> {
    let purposes = ctx.engine.list_purposes().map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&purposes)?);
    } else if purposes.is_empty() {
        println!("no purposes defined");
    } else {
        for p in &purposes {
            println!("{:<18} {}", p.id, p.name);
        }
    }
    Ok(EXIT_SUCCESS)
}

pub fn remove(ctx: &Context<'_>, id: &str) -> Result<u8, String> {
    ctx.engine
        .remove_purpose(&ctx.admin(), &PurposeId::new(id))
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&serde_json::json!({ "removed": id }))?);
    } else {
        println!("removed purpose {id}");
    }
    Ok(EXIT_SUCCESS)
}
