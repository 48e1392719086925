mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use commands::exit_code_for;
use fleetlog_core::config::expand_tilde;
use fleetlog_core::{Engine, FleetConfig, ReportKey};
use fleetlog_schema::{FuelType, TripStatus, UserRole};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "fleetlog",
    version,
    about = "Vehicle fleet trip requisition, approval and consumption tracking"
)]
struct Cli {
    /// Path to the fleetlog store directory (overrides the config file).
    #[arg(long, global = true)]
    store: Option<String>,

    /// Path to the config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Acting user id. Trip operations require it; administrative commands
    /// default to the system identity.
    #[arg(long = "as", value_name = "USER_ID", global = true)]
    acting: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Register and manage vehicles.
    #[command(subcommand)]
    Vehicle(VehicleCommand),
    /// Register and manage users.
    #[command(subcommand)]
    User(UserCommand),
    /// Manage the trip purpose catalogue.
    #[command(subcommand)]
    Purpose(PurposeCommand),
    /// Record and list vehicle maintenance.
    #[command(subcommand)]
    Maintenance(MaintenanceCommand),
    /// Company data and fuel prices.
    #[command(subcommand)]
    Params(ParamsCommand),
    /// Request, approve, deny and complete trips.
    #[command(subcommand)]
    Trip(TripCommand),
    /// Consumption and maintenance reports.
    Report {
        #[arg(value_enum)]
        by: ReportTarget,
    },
    /// Pending and active trip counts and the latest completions.
    Dashboard,
    /// Verify record checksums and trip consistency.
    VerifyStore,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum VehicleCommand {
    /// Register a vehicle.
    Add {
        /// Make and model, e.g. "Toyota Corolla".
        model: String,
        /// License plate; stored upper-case.
        plate: String,
        #[arg(long)]
        year: u16,
        #[arg(long)]
        fuel: FuelType,
        /// Odometer reading at registration, in km.
        #[arg(long, default_value_t = 0)]
        odometer: u64,
    },
    List,
    Show {
        id: String,
    },
    Activate {
        id: String,
    },
    Deactivate {
        id: String,
    },
    /// Correct the odometer reading. It may only increase.
    Odometer {
        id: String,
        value: u64,
    },
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    Add {
        name: String,
        /// administrator or operator.
        #[arg(long, default_value = "operator")]
        role: UserRole,
    },
    List,
    Activate {
        id: String,
    },
    Deactivate {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
enum PurposeCommand {
    Add { name: String },
    List,
    /// Remove a purpose no trip refers to.
    Remove { id: String },
}

#[derive(Debug, Subcommand)]
enum MaintenanceCommand {
    Add {
        vehicle: String,
        description: String,
        #[arg(long)]
        cost: f64,
        /// Service date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    List {
        #[arg(long)]
        vehicle: Option<String>,
    },
    Remove {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
enum ParamsCommand {
    Show,
    /// Set the per-liter price of one fuel type.
    SetPrice { fuel: FuelType, price: f64 },
    /// Update company data. Omitted fields keep their current value.
    SetCompany {
        #[arg(long)]
        legal_name: Option<String>,
        #[arg(long)]
        trade_name: Option<String>,
        #[arg(long)]
        tax_id: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        responsible: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum TripCommand {
    /// Request a vehicle for a trip.
    Request {
        vehicle: String,
        purpose: String,
        destination: String,
        #[arg(long)]
        notes: Option<String>,
    },
    Approve {
        id: String,
    },
    Deny {
        id: String,
    },
    /// Close an approved trip with the final odometer reading.
    Complete {
        id: String,
        #[arg(long)]
        end_odometer: u64,
        /// Liters refueled at the end of the trip.
        #[arg(long, default_value_t = 0.0)]
        liters: f64,
        #[arg(long)]
        fuel: Option<FuelType>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Replace the notes of a trip; omit the text to clear them.
    Notes {
        id: String,
        text: Option<String>,
    },
    List {
        #[arg(long)]
        status: Option<TripStatus>,
        #[arg(long)]
        vehicle: Option<String>,
        #[arg(long)]
        requester: Option<String>,
    },
    Show {
        id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportTarget {
    Vehicle,
    User,
    Purpose,
    Maintenance,
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FLEETLOG_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    // Completions need no store.
    if let Commands::Completions { shell } = cli.command {
        return finish(commands::completions::run::<Cli>(shell));
    }

    finish(dispatch(cli))
}

fn finish(result: Result<u8, String>) -> ExitCode {
    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

fn open_engine(cli: &Cli) -> Result<Engine, String> {
    let config_path = cli.config.clone().unwrap_or_else(FleetConfig::default_path);
    let mut config = FleetConfig::load(&config_path).map_err(|e| e.to_string())?;
    if let Some(store) = &cli.store {
        config.store.clone_from(store);
    }
    tracing::debug!("using store {}", expand_tilde(&config.store).display());
    Engine::from_config(&config).map_err(|e| e.to_string())
}

#[allow(clippy::too_many_lines)]
fn dispatch(cli: Cli) -> Result<u8, String> {
    use commands::{
        dashboard, maintenance, params, purpose, report, trip, user, vehicle, verify_store,
        Context,
    };

    let engine = open_engine(&cli)?;
    let ctx = Context::new(&engine, cli.acting.as_deref(), cli.json);

    match cli.command {
        Commands::Vehicle(cmd) => match cmd {
            VehicleCommand::Add {
                model,
                plate,
                year,
                fuel,
                odometer,
            } => vehicle::add(&ctx, model, plate, year, fuel, odometer),
            VehicleCommand::List => vehicle::list(&ctx),
            VehicleCommand::Show { id } => vehicle::show(&ctx, &id),
            VehicleCommand::Activate { id } => vehicle::set_active(&ctx, &id, true),
            VehicleCommand::Deactivate { id } => vehicle::set_active(&ctx, &id, false),
            VehicleCommand::Odometer { id, value } => vehicle::odometer(&ctx, &id, value),
        },
        Commands::User(cmd) => match cmd {
            UserCommand::Add { name, role } => user::add(&ctx, &name, role),
            UserCommand::List => user::list(&ctx),
            UserCommand::Activate { id } => user::set_active(&ctx, &id, true),
            UserCommand::Deactivate { id } => user::set_active(&ctx, &id, false),
        },
        Commands::Purpose(cmd) => match cmd {
            PurposeCommand::Add { name } => purpose::add(&ctx, &name),
            PurposeCommand::List => purpose::list(&ctx),
            PurposeCommand::Remove { id } => purpose::remove(&ctx, &id),
        },
        Commands::Maintenance(cmd) => match cmd {
            MaintenanceCommand::Add {
                vehicle,
                description,
                cost,
                date,
            } => maintenance::add(&ctx, vehicle, description, cost, date),
            MaintenanceCommand::List { vehicle } => maintenance::list(&ctx, vehicle.as_deref()),
            MaintenanceCommand::Remove { id } => maintenance::remove(&ctx, &id),
        },
        Commands::Params(cmd) => match cmd {
            ParamsCommand::Show => params::show(&ctx),
            ParamsCommand::SetPrice { fuel, price } => params::set_price(&ctx, fuel, price),
            ParamsCommand::SetCompany {
                legal_name,
                trade_name,
                tax_id,
                address,
                phone,
                responsible,
            } => params::set_company(
                &ctx,
                params::CompanyUpdate {
                    legal_name,
                    trade_name,
                    tax_id,
                    address,
                    phone,
                    responsible,
                },
            ),
        },
        Commands::Trip(cmd) => match cmd {
            TripCommand::Request {
                vehicle,
                purpose,
                destination,
                notes,
            } => trip::request(&ctx, vehicle, purpose, destination, notes),
            TripCommand::Approve { id } => trip::approve(&ctx, &id),
            TripCommand::Deny { id } => trip::deny(&ctx, &id),
            TripCommand::Complete {
                id,
                end_odometer,
                liters,
                fuel,
                notes,
            } => trip::complete(&ctx, &id, end_odometer, liters, fuel, notes),
            TripCommand::Notes { id, text } => trip::notes(&ctx, &id, text),
            TripCommand::List {
                status,
                vehicle,
                requester,
            } => trip::list(&ctx, status, vehicle, requester),
            TripCommand::Show { id } => trip::show(&ctx, &id),
        },
        Commands::Report { by } => match by {
            ReportTarget::Vehicle => report::trips(&ctx, ReportKey::Vehicle),
            ReportTarget::User => report::trips(&ctx, ReportKey::User),
            ReportTarget::Purpose => report::trips(&ctx, ReportKey::Purpose),
            ReportTarget::Maintenance => report::maintenance(&ctx),
        },
        Commands::Dashboard => dashboard::run(&ctx),
        Commands::VerifyStore => verify_store::run(&ctx),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    }
}
