//! The plain-text status endpoint.
//!
//! Routing and formatting live here and run against [`StationState`] on the
//! station thread. The platform's HTTP server only translates requests and
//! responses (see [`EndpointService`]).
use crate::{
    actor,
    config::{GasReport, VERSION},
    snapshot::{Snapshot, StationState},
};
use core::time::Duration;
use serde::Serialize;
use std::fmt::{self, Write};

pub const TEXT: &str = "text/plain";
pub const JSON: &str = "application/json";

/// Requests answered per endpoint tick; anything beyond waits for the next
/// tick.
const MAX_REQUESTS_PER_POLL: usize = 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    /// Decoded query arguments, in order.
    pub args: Vec<(String, String)>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

/// Facts about the running system that aren't part of the station state.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemStatus {
    pub uptime: Duration,
    /// Flash space left for an update image.
    pub free_bytes: u64,
}

#[derive(Copy, Clone, Debug)]
pub struct Endpoint {
    gas_report: GasReport,
}

/// Answers requests handed over from the HTTP server thread.
pub struct EndpointService {
    endpoint: Endpoint,
    requests: actor::Actor<Request, Response>,
    free_bytes: fn() -> u64,
}

#[derive(Serialize)]
struct SensorsJson<'a> {
    #[serde(flatten)]
    snapshot: &'a Snapshot,
    uptime_seconds: f64,
}

// === impl Method ===

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

// === impl Request ===

impl Request {
    /// Splits a request URI into its path and decoded query arguments.
    pub fn parse(method: Method, uri: &str) -> Self {
        let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
        let args = serde_urlencoded::from_str(query).unwrap_or_else(|error| {
            log::debug!(
                target: "envstation::endpoint",
                "ignoring malformed query {query:?}: {error}"
            );
            Vec::new()
        });
        Self {
            method,
            path: path.to_owned(),
            args,
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::parse(Method::Get, uri)
    }
}

// === impl Response ===

impl Response {
    pub fn ok(content_type: &'static str, body: String) -> Self {
        Self {
            status: 200,
            content_type,
            body,
        }
    }

    fn error(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: TEXT,
            body,
        }
    }
}

// === impl Endpoint ===

impl Endpoint {
    pub const fn new(gas_report: GasReport) -> Self {
        Self { gas_report }
    }

    pub fn handle(&self, state: &StationState, status: &SystemStatus, req: &Request) -> Response {
        log::debug!(target: "envstation::endpoint", "{} {}", req.method, req.path);
        let rsp = match req.path.as_str() {
            "/metrics" => self.metrics(state, status),
            "/version" => Ok(Response::ok(TEXT, format!("{VERSION}\n"))),
            "/free" => Ok(Response::ok(TEXT, format!("{}\n", status.free_bytes))),
            "/sensors.json" => self.sensors_json(state, status),
            _ => Ok(not_found(req)),
        };
        rsp.unwrap_or_else(|error| {
            log::warn!(target: "envstation::endpoint", "failed to render {}: {error:?}", req.path);
            Response::error(500, format!("{error}\n"))
        })
    }

    /// Writes one `key value` line per reading, plus the uptime.
    pub fn fmt_metrics(
        &self,
        state: &StationState,
        uptime: Duration,
        f: &mut impl Write,
    ) -> fmt::Result {
        let snapshot = state.snapshot();
        writeln!(f, "sensor_temperature_celsius {:.2}", snapshot.temperature)?;
        writeln!(f, "sensor_pressure_pascal {:.2}", snapshot.pressure)?;
        writeln!(f, "sensor_altitude_meters {:.2}", snapshot.altitude)?;
        writeln!(f, "sensor_humidity_percent {:.2}", snapshot.humidity)?;

        let gas = match self.gas_report {
            GasReport::Omit => snapshot.gas(),
            GasReport::LastKnown => state.last_gas(),
        };
        if let Some(gas) = gas {
            writeln!(f, "sensor_co2_ppm {}", gas.co2_ppm)?;
            writeln!(f, "sensor_tvoc_ppb {}", gas.tvoc_ppb)?;
        }

        writeln!(f, "sensor_read_errors_total {}", state.read_errors())?;
        writeln!(f, "uptime_seconds {:.2}", uptime.as_secs_f64())
    }

    fn metrics(&self, state: &StationState, status: &SystemStatus) -> anyhow::Result<Response> {
        let mut body = String::new();
        self.fmt_metrics(state, status.uptime, &mut body)?;
        Ok(Response::ok(TEXT, body))
    }

    fn sensors_json(
        &self,
        state: &StationState,
        status: &SystemStatus,
    ) -> anyhow::Result<Response> {
        let json = serde_json::to_string_pretty(&SensorsJson {
            snapshot: state.snapshot(),
            uptime_seconds: status.uptime.as_secs_f64(),
        })?;
        Ok(Response::ok(JSON, json))
    }
}

fn not_found(req: &Request) -> Response {
    let mut body = String::new();
    // writing to a `String` never fails
    let _ = write!(
        body,
        "File Not Found\n\nURI: {}\nMethod: {}\nArguments: {}\n",
        req.path,
        req.method,
        req.args.len()
    );
    for (name, value) in &req.args {
        let _ = writeln!(body, " {name}: {value}");
    }
    Response::error(404, body)
}

// === impl EndpointService ===

impl EndpointService {
    pub fn new(
        endpoint: Endpoint,
        requests: actor::Actor<Request, Response>,
        free_bytes: fn() -> u64,
    ) -> Self {
        Self {
            endpoint,
            requests,
            free_bytes,
        }
    }

    /// Answers the requests that are waiting right now, without blocking.
    pub fn poll(&mut self, state: &StationState, uptime: Duration) -> usize {
        let status = SystemStatus {
            uptime,
            free_bytes: (self.free_bytes)(),
        };

        let mut answered = 0;
        while answered < MAX_REQUESTS_PER_POLL {
            let Some(envelope) = self.requests.try_next_request() else {
                break;
            };
            let rsp = self.endpoint.handle(state, &status, envelope.request());
            if envelope.respond(rsp).is_err() {
                log::debug!(
                    target: "envstation::endpoint",
                    "client went away before the response was ready"
                );
            }
            answered += 1;
        }
        answered
    }
}

impl fmt::Debug for EndpointService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointService")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
