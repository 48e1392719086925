use super::{json_pretty, Context, EXIT_SUCCESS};
use fleetlog_schema::{FuelType, Parameter};

/// Company fields given on the command line; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct CompanyUpdate {
    pub legal_name: Option<String>,
    pub trade_name: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub responsible: Option<String>,
}

fn print_parameter(p: &Parameter) {
    let c = &p.company;
    println!("company:      {}", c.legal_name);
    println!("trade name:   {}", c.trade_name);
    println!("tax id:       {}", c.tax_id);
    println!("address:      {}", c.address);
    println!("phone:        {}", c.phone);
    println!("responsible:  {}", c.responsible);
    println!("fuel prices:");
    for fuel in FuelType::ALL {
        match p.fuel_prices.get(fuel) {
            Some(price) => println!("  {:<10} {price:.2}", fuel.to_string()),
            None => println!("  {:<10} (not set)", fuel.to_string()),
        }
    }
}

pub fn show(ctx: &Context<'_>) -> Result<u8, String> {
    let parameter = ctx.engine.parameters().map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&parameter)?);
    } else {
        print_parameter(&parameter);
    }
    Ok(EXIT_SUCCESS)
}

pub fn set_price(ctx: &Context<'_>, fuel: FuelType, price: f64) -> Result<u8, String> {
    let parameter = ctx
        .engine
        .set_fuel_price(&ctx.admin(), fuel, price)
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&parameter.fuel_prices)?);
    } else {
        println!("{fuel} price set to {price:.2}");
    }
    Ok(EXIT_SUCCESS)
}

pub fn set_company(ctx: &Context<'_>, update: CompanyUpdate) -> Result<u8, String> {
    let mut company = ctx
        .engine
        .parameters()
        .map_err(|e| e.to_string())?
        .company;
    let fields = [
        (update.legal_name, &mut company.legal_name),
        (update.trade_name, &mut company.trade_name),
        (update.tax_id, &mut company.tax_id),
        (update.address, &mut company.address),
        (update.phone, &mut company.phone),
        (update.responsible, &mut company.responsible),
    ];
    for (value, slot) in fields {
        if let Some(value) = value {
            *slot = value;
        }
    }

    let parameter = ctx
        .engine
        .set_company(&ctx.admin(), company)
        .map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&parameter.company)?);
    } else {
        println!("company data updated");
    }
    Ok(EXIT_SUCCESS)
}
