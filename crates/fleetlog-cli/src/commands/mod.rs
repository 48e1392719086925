pub mod completions;
pub mod dashboard;
pub mod maintenance;
pub mod params;
pub mod purpose;
pub mod report;
pub mod trip;
pub mod user;
pub mod vehicle;
pub mod verify_store;

use fleetlog_core::{Engine, RequesterIdentity};
use fleetlog_schema::TripStatus;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_VALIDATION_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;

/// Everything a subcommand needs: the engine, who is acting, output mode.
pub struct Context<'a> {
    pub engine: &'a Engine,
    acting: Option<&'a str>,
    pub json: bool,
}

impl<'a> Context<'a> {
    pub fn new(engine: &'a Engine, acting: Option<&'a str>, json: bool) -> Self {
        Self {
            engine,
            acting,
            json,
        }
    }

    /// Identity for administrative commands; the system identity unless `--as` is given.
    pub fn admin(&self) -> RequesterIdentity {
        self.acting
            .map_or_else(RequesterIdentity::system, RequesterIdentity::new)
    }

    /// Identity for trip commands, which must name a registered user.
    pub fn requester(&self) -> Result<RequesterIdentity, String> {
        self.acting
            .map(RequesterIdentity::new)
            .ok_or_else(|| "no acting user: pass --as <USER_ID>".to_owned())
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn colorize_status(status: TripStatus) -> String {
    use console::Style;
    let label = status.to_string();
    match status {
        TripStatus::Pending => Style::new().yellow().apply_to(label).to_string(),
        TripStatus::Approved => Style::new().cyan().bold().apply_to(label).to_string(),
        TripStatus::InUse => Style::new().blue().apply_to(label).to_string(),
        TripStatus::Completed => Style::new().green().apply_to(label).to_string(),
        TripStatus::Denied => Style::new().dim().apply_to(label).to_string(),
    }
}

pub fn active_label(active: bool) -> &'static str {
    if active {
        "active"
    } else {
        "inactive"
    }
}

/// Exit code for an error message, keyed on the prefixes `CoreError` renders.
pub fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("validation error:") || msg.starts_with("invalid state transition:") {
        EXIT_VALIDATION_ERROR
    } else if msg.starts_with("store error:")
        || msg.starts_with("partial completion")
        || msg.starts_with("failed to read config")
        || msg.starts_with("failed to parse config")
    {
        EXIT_STORE_ERROR
    } else {
        EXIT_FAILURE
    }
}
