//! HTTP front end for the fleetlog engine.
//!
//! A blocking `tiny_http` server over one shared [`Engine`]. Bodies are JSON.
//! Trip operations take the acting user from the `X-Fleet-User` header;
//! administrative writes fall back to the system identity when it is absent.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

use fleetlog_core::{
    CompletionInput, CoreError, Engine, NewTripRequest, ReportKey, RequesterIdentity, TripFilter,
};
use fleetlog_schema::{NewVehicle, TripId, TripStatus, UserId, VehicleId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, info};

pub const IDENTITY_HEADER: &str = "X-Fleet-User";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error(transparent)]
    Engine(#[from] CoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripAction {
    Approve,
    Deny,
    Complete,
    Notes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Health,
    Vehicles,
    Vehicle(&'a str),
    Trips,
    Trip(&'a str),
    TripAction(&'a str, TripAction),
    Report(&'a str),
    Dashboard,
}

/// Match a request path (without query string) to a route.
pub fn parse_route(path: &str) -> Option<Route<'_>> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["health"] => Some(Route::Health),
        ["vehicles"] => Some(Route::Vehicles),
        ["vehicles", id] if !id.is_empty() => Some(Route::Vehicle(id)),
        ["trips"] => Some(Route::Trips),
        ["trips", id] if !id.is_empty() => Some(Route::Trip(id)),
        ["trips", id, action] if !id.is_empty() => {
            let action = match *action {
                "approve" => TripAction::Approve,
                "deny" => TripAction::Deny,
                "complete" => TripAction::Complete,
                "notes" => TripAction::Notes,
                _ => return None,
            };
            Some(Route::TripAction(id, action))
        }
        ["reports", kind] => Some(Route::Report(kind)),
        ["dashboard"] => Some(Route::Dashboard),
        _ => None,
    }
}

/// `key=value` pairs of a query string. Values are taken verbatim; ids and
/// status names never need escaping.
pub fn parse_query(query: &str) -> Vec<(&str, &str)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect()
}

/// A JSON reply: status code and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    fn ok(body: impl Serialize) -> Result<Self, Reply> {
        Self::with_status(200, body)
    }

    fn created(body: impl Serialize) -> Result<Self, Reply> {
        Self::with_status(201, body)
    }

    fn with_status(status: u16, body: impl Serialize) -> Result<Self, Reply> {
        serde_json::to_value(body)
            .map(|body| Reply { status, body })
            .map_err(|e| Reply::error(500, "serialization", &e.to_string()))
    }

    fn error(status: u16, kind: &str, message: &str) -> Self {
        Reply {
            status,
            body: json!({ "error": kind, "message": message }),
        }
    }
}

/// HTTP status for an engine error.
pub fn status_for(e: &CoreError) -> u16 {
    match e {
        CoreError::Validation(_) => 422,
        CoreError::InvalidTransition { .. } => 409,
        CoreError::NotFound { .. } => 404,
        CoreError::Storage(_) | CoreError::PartialCompletion { .. } => 500,
    }
}

impl From<CoreError> for Reply {
    fn from(e: CoreError) -> Self {
        let status = status_for(&e);
        let message = e.to_string();
        match e {
            CoreError::Validation(_) => Reply::error(status, "validation", &message),
            CoreError::InvalidTransition { from, to } => Reply {
                status,
                body: json!({
                    "error": "invalid_transition",
                    "message": message,
                    "from": from,
                    "to": to,
                }),
            },
            CoreError::NotFound { kind, id } => Reply {
                status,
                body: json!({ "error": "not_found", "message": message, "kind": kind, "id": id }),
            },
            CoreError::Storage(_) => {
                error!("{message}");
                Reply::error(status, "storage", &message)
            }
            CoreError::PartialCompletion {
                trip_id,
                vehicle_id,
                trip_written,
                vehicle_written,
                reason,
            } => {
                error!("{message}");
                Reply {
                    status,
                    body: json!({
                        "error": "partial_completion",
                        "message": message,
                        "trip_id": trip_id,
                        "vehicle_id": vehicle_id,
                        "trip_written": trip_written,
                        "vehicle_written": vehicle_written,
                        "reason": reason,
                    }),
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct NotesBody {
    #[serde(default)]
    notes: Option<String>,
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, Reply> {
    serde_json::from_slice(body).map_err(|e| Reply::error(400, "bad_request", &e.to_string()))
}

fn require_identity(identity: Option<&str>) -> Result<RequesterIdentity, Reply> {
    identity
        .filter(|id| !id.trim().is_empty())
        .map(|id| RequesterIdentity::new(id.trim()))
        .ok_or_else(|| {
            Reply::error(
                401,
                "unauthenticated",
                &format!("missing {IDENTITY_HEADER} header"),
            )
        })
}

fn admin_identity(identity: Option<&str>) -> RequesterIdentity {
    identity
        .filter(|id| !id.trim().is_empty())
        .map_or_else(RequesterIdentity::system, |id| RequesterIdentity::new(id.trim()))
}

fn trip_filter(query: &str) -> Result<TripFilter, Reply> {
    let mut filter = TripFilter::default();
    for (key, value) in parse_query(query) {
        match key {
            "status" => {
                let status: TripStatus = value
                    .parse()
                    .map_err(|e: fleetlog_schema::ValidationError| {
                        Reply::error(400, "bad_request", &e.to_string())
                    })?;
                filter.status = Some(status);
            }
            "vehicle" | "vehicle_id" => filter.vehicle_id = Some(VehicleId::new(value)),
            "requester" | "requester_id" => filter.requester_id = Some(UserId::new(value)),
            _ => {}
        }
    }
    Ok(filter)
}

fn method_not_allowed() -> Reply {
    Reply::error(405, "method_not_allowed", "method not allowed")
}

/// Route one request against the engine. Transport-independent so it can be
/// exercised without a socket.
pub fn dispatch(
    engine: &Engine,
    method: &Method,
    url: &str,
    identity: Option<&str>,
    body: &[u8],
) -> Reply {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let Some(route) = parse_route(path) else {
        return Reply::error(404, "not_found", "no such route");
    };
    let result = match (route, method) {
        (Route::Health, Method::Get) => Reply::ok(json!({ "status": "ok" })),
        (Route::Vehicles, Method::Get) => engine
            .list_vehicles()
            .map_err(Reply::from)
            .and_then(Reply::ok),
        (Route::Vehicles, Method::Post) => parse_body::<NewVehicle>(body).and_then(|input| {
            engine
                .register_vehicle(&admin_identity(identity), input)
                .map_err(Reply::from)
                .and_then(Reply::created)
        }),
        (Route::Vehicle(id), Method::Get) => engine
            .get_vehicle(&VehicleId::new(id))
            .map_err(Reply::from)
            .and_then(Reply::ok),
        (Route::Trips, Method::Get) => trip_filter(query).and_then(|filter| {
            engine
                .list_trips(&filter)
                .map_err(Reply::from)
                .and_then(Reply::ok)
        }),
        (Route::Trips, Method::Post) => require_identity(identity).and_then(|who| {
            let input = parse_body::<NewTripRequest>(body)?;
            engine
                .create_request(&who, input)
                .map_err(Reply::from)
                .and_then(Reply::created)
        }),
        (Route::Trip(id), Method::Get) => engine
            .get_trip(&TripId::new(id))
            .map_err(Reply::from)
            .and_then(Reply::ok),
        (Route::TripAction(id, action), Method::Post) => {
            trip_action(engine, &TripId::new(id), action, identity, body)
        }
        (Route::Report(kind), Method::Get) => report(engine, kind),
        (Route::Dashboard, Method::Get) => engine
            .dashboard()
            .map_err(Reply::from)
            .and_then(Reply::ok),
        _ => Err(method_not_allowed()),
    };
    result.unwrap_or_else(|reply| reply)
}

fn trip_action(
    engine: &Engine,
    trip_id: &TripId,
    action: TripAction,
    identity: Option<&str>,
    body: &[u8],
) -> Result<Reply, Reply> {
    let who = require_identity(identity)?;
    let trip = match action {
        TripAction::Approve => engine.approve(&who, trip_id),
        TripAction::Deny => engine.deny(&who, trip_id),
        TripAction::Complete => {
            let input = parse_body::<CompletionInput>(body)?;
            engine.complete(&who, trip_id, input)
        }
        TripAction::Notes => {
            let input = if body.is_empty() {
                NotesBody { notes: None }
            } else {
                parse_body::<NotesBody>(body)?
            };
            engine.update_notes(&who, trip_id, input.notes)
        }
    }?;
    Reply::ok(trip)
}

fn report(engine: &Engine, kind: &str) -> Result<Reply, Reply> {
    if kind == "maintenance" {
        return Reply::ok(engine.maintenance_report()?);
    }
    let key: ReportKey = kind
        .parse()
        .map_err(|_| Reply::error(404, "not_found", &format!("no report '{kind}'")))?;
    Reply::ok(engine.report(key)?)
}

fn json_header() -> Header {
    Header::from_bytes("Content-Type", "application/json").expect("valid header")
}

fn read_body(req: &mut tiny_http::Request) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    if req.as_reader().read_to_end(&mut body).is_ok() {
        Some(body)
    } else {
        None
    }
}

/// Handle a single HTTP request.
pub fn handle_request(engine: &Engine, mut req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    let identity = req
        .headers()
        .iter()
        .find(|h| h.field.equiv(IDENTITY_HEADER))
        .map(|h| h.value.as_str().to_owned());
    debug!("{method} {url} as {}", identity.as_deref().unwrap_or("-"));

    let reply = match read_body(&mut req) {
        Some(body) => dispatch(engine, &method, &url, identity.as_deref(), &body),
        None => Reply::error(400, "bad_request", "unreadable request body"),
    };
    if reply.status >= 400 {
        info!("{method} {url} -> {}", reply.status);
    }
    let response = Response::from_string(reply.body.to_string())
        .with_status_code(StatusCode(reply.status))
        .with_header(json_header());
    let _ = req.respond(response);
}

fn bind(addr: &str) -> Result<Server, ServerError> {
    Server::http(addr).map_err(|e| ServerError::Bind {
        addr: addr.to_owned(),
        reason: e.to_string(),
    })
}

/// Start the server loop, blocking the current thread.
pub fn run_server(engine: &Arc<Engine>, addr: &str) -> Result<(), ServerError> {
    let server = bind(addr)?;
    info!("listening on {addr}");
    for request in server.incoming_requests() {
        handle_request(engine, request);
    }
    Ok(())
}

/// A test helper that starts a fleetlog server on a random port in a background thread.
///
/// The server listens on `127.0.0.1:{port}` over a file store at `root`.
/// Dropping the `TestServer` stops the server.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub root: PathBuf,
    pub engine: Arc<Engine>,
    server: Arc<Server>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl TestServer {
    pub fn start(root: PathBuf) -> Result<Self, ServerError> {
        let engine = Arc::new(Engine::open(&root)?);
        let server = Arc::new(bind("127.0.0.1:0")?);
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| ServerError::Bind {
                addr: "127.0.0.1:0".to_owned(),
                reason: "not an IP listener".to_owned(),
            })?;
        let url = format!("http://127.0.0.1:{port}");

        let srv = Arc::clone(&server);
        let shared = Arc::clone(&engine);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                handle_request(&shared, request);
            }
        });

        Ok(Self {
            url,
            port,
            root,
            engine,
            server,
            handle: Some(handle),
        })
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetlog_schema::{FuelType, UserRole};

    #[test]
    fn parse_route_trip_actions() {
        assert_eq!(
            parse_route("/trips/trip-1/approve"),
            Some(Route::TripAction("trip-1", TripAction::Approve))
        );
        assert_eq!(
            parse_route("/trips/trip-1/complete/"),
            Some(Route::TripAction("trip-1", TripAction::Complete))
        );
        assert_eq!(parse_route("/trips/trip-1/archive"), None);
    }

    #[test]
    fn parse_route_collections_and_items() {
        assert_eq!(parse_route("/health"), Some(Route::Health));
        assert_eq!(parse_route("/vehicles"), Some(Route::Vehicles));
        assert_eq!(parse_route("/vehicles/veh-1"), Some(Route::Vehicle("veh-1")));
        assert_eq!(parse_route("/trips/"), Some(Route::Trips));
        assert_eq!(parse_route("/reports/user"), Some(Route::Report("user")));
        assert_eq!(parse_route("/dashboard"), Some(Route::Dashboard));
        assert_eq!(parse_route("/unknown"), None);
        assert_eq!(parse_route("/"), None);
    }

    #[test]
    fn parse_query_pairs() {
        assert_eq!(
            parse_query("status=pending&vehicle=veh-1&flag"),
            vec![("status", "pending"), ("vehicle", "veh-1"), ("flag", "")]
        );
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn status_mapping() {
        let validation = CoreError::Validation(fleetlog_schema::ValidationError::Blank("x"));
        assert_eq!(status_for(&validation), 422);
        let conflict = CoreError::InvalidTransition {
            from: TripStatus::Denied,
            to: TripStatus::Approved,
        };
        assert_eq!(status_for(&conflict), 409);
        let missing = CoreError::NotFound {
            kind: "trip",
            id: "trip-1".to_owned(),
        };
        assert_eq!(status_for(&missing), 404);
        let partial = CoreError::PartialCompletion {
            trip_id: "trip-1".to_owned(),
            vehicle_id: "veh-1".to_owned(),
            trip_written: true,
            vehicle_written: false,
            reason: "disk".to_owned(),
        };
        let reply = Reply::from(partial);
        assert_eq!(reply.status, 500);
        assert_eq!(reply.body["trip_written"], true);
        assert_eq!(reply.body["vehicle_written"], false);
    }

    #[test]
    fn dispatch_without_socket() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open(dir.path()).unwrap();
        let system = RequesterIdentity::system();
        let user = engine
            .register_user(&system, "Lia", UserRole::Operator)
            .unwrap();
        engine
            .register_vehicle(
                &system,
                NewVehicle {
                    model: "Fiat Uno".to_owned(),
                    plate: "UNO-1990".to_owned(),
                    year: 2010,
                    fuel_type: FuelType::Flex,
                    current_odometer: 10,
                },
            )
            .unwrap();

        let reply = dispatch(&engine, &Method::Get, "/vehicles", None, b"");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body.as_array().unwrap().len(), 1);

        let reply = dispatch(&engine, &Method::Post, "/trips", None, b"{}");
        assert_eq!(reply.status, 401);

        let reply = dispatch(
            &engine,
            &Method::Post,
            "/trips",
            Some(user.id.as_str()),
            b"not json",
        );
        assert_eq!(reply.status, 400);

        let reply = dispatch(&engine, &Method::Delete, "/vehicles", None, b"");
        assert_eq!(reply.status, 405);

        let reply = dispatch(&engine, &Method::Get, "/trips?status=bogus", None, b"");
        assert_eq!(reply.status, 400);

        let reply = dispatch(&engine, &Method::Get, "/reports/fuel", None, b"");
        assert_eq!(reply.status, 404);
    }
}
