//! Core of an environmental sensor station: samples a temperature / pressure /
//! humidity sensor (and optionally a CO2/TVOC sensor), shows the readings on
//! two 7-segment displays, and serves them as plain text.
//!
//! Everything here is platform independent; the ESP32 firmware in
//! `envstation-esp32` plugs real drivers into the traits defined here.
pub mod actor;
pub mod config;
pub mod display;
pub mod endpoint;
pub mod logger;
pub mod retry;
pub mod runner;
pub mod sensor;
pub mod snapshot;
pub mod station;
pub mod units;
pub mod update;

pub use config::{StationConfig, CONFIG};
pub use retry::{ExpBackoff, Retry};
pub use snapshot::{Snapshot, StationState};
pub use station::Station;
