use super::{active_label, json_pretty, Context, EXIT_SUCCESS};
use fleetlog_schema::{UserId, UserRole};

pub fn add(ctx: &Context<'_>, name: &str, role: UserRole) -> Result<u8, String> {
    let user = ctx
        .engine
        .register_user(&ctx.admin(), name, role)
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&user)?);
    } else {
        println!("registered {} {} ({})", user.role, user.name, user.id);
    }
    Ok(EXIT_SUCCESS)
}

pub fn list(ctx: &Context<'_>) -> Result<u8, String> {
    let users = ctx.engine.list_users().map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&users)?);
    } else if users.is_empty() {
        println!("no users registered");
    } else {
        println!("{:<18} {:<24} {:<14} STATUS", "ID", "NAME", "ROLE");
        for u in &users {
            println!(
                "{:<18} {:<24} {:<14} {}",
                u.id,
                u.name,
                u.role.to_string(),
                active_label(u.active)
            );
        }
    }
    Ok(EXIT_SUCCESS)
}

pub fn set_active(ctx: &Context<'_>, id: &str, active: bool) -> Result<u8, String> {
    let user = ctx
        .engine
        .set_user_active(&ctx.admin(), &UserId::new(id), active)
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&user)?);
    } else {
        println!("user {} is now {}", user.name, active_label(user.active));
    }
    Ok(EXIT_SUCCESS)
}
