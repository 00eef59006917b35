//! Compile-time station configuration.
//!
//! Nothing in here changes after startup. The firmware reads [`CONFIG`] once
//! while bringing up devices and registering runner tasks.
use core::time::Duration;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const CONFIG: StationConfig = StationConfig::new();

#[derive(Clone, Debug)]
pub struct StationConfig {
    pub periods: Periods,
    pub sensor: SensorSettings,
    pub displays: DisplaySettings,
    pub gas_report: GasReport,
    /// Whether the remote firmware update task and route are registered.
    pub remote_update: bool,
    pub mdns_name: &'static str,
    pub http_port: u16,
}

#[derive(Copy, Clone, Debug)]
pub struct Periods {
    pub sample: Duration,
    pub render: Duration,
    pub endpoint: Duration,
    pub update: Duration,
}

/// BME280 noise reduction settings, applied once at bring-up.
#[derive(Copy, Clone, Debug)]
pub struct SensorSettings {
    pub address: u8,
    pub filter: Filter,
    pub temperature_oversampling: Oversampling,
    pub pressure_oversampling: Oversampling,
    pub humidity_oversampling: Oversampling,
}

#[derive(Copy, Clone, Debug)]
pub struct DisplaySettings {
    pub upper_address: u8,
    pub lower_address: u8,
    /// 0 (dimmest) to 15.
    pub brightness: u8,
}

/// How the metrics endpoint reports gas readings the current snapshot
/// doesn't carry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GasReport {
    /// Leave the line out.
    Omit,
    /// Repeat the most recent measured value, if there ever was one.
    LastKnown,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Filter {
    Off,
    X2,
    X4,
    X8,
    X16,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Oversampling {
    X1,
    X2,
    X4,
    X8,
    X16,
}

// === impl StationConfig ===

impl StationConfig {
    pub const fn new() -> Self {
        Self {
            periods: Periods {
                sample: Duration::from_millis(500),
                render: Duration::from_millis(5000),
                endpoint: Duration::from_millis(100),
                update: Duration::from_millis(10),
            },
            sensor: SensorSettings {
                // the SparkFun breakout's default address
                address: 0x77,
                filter: Filter::X16,
                temperature_oversampling: Oversampling::X16,
                pressure_oversampling: Oversampling::X16,
                humidity_oversampling: Oversampling::X16,
            },
            displays: DisplaySettings {
                upper_address: 0x70,
                lower_address: 0x71,
                brightness: 1,
            },
            gas_report: GasReport::Omit,
            remote_update: false,
            mdns_name: "sensor-wohnzimmer",
            http_port: 80,
        }
    }

    pub const fn with_gas_report(self, gas_report: GasReport) -> Self {
        Self { gas_report, ..self }
    }

    pub const fn with_remote_update(self, remote_update: bool) -> Self {
        Self {
            remote_update,
            ..self
        }
    }
}

impl Default for StationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_periods() {
        let periods = CONFIG.periods;
        assert_eq!(periods.sample, Duration::from_millis(500));
        assert_eq!(periods.render, Duration::from_secs(5));
        assert_eq!(periods.endpoint, Duration::from_millis(100));
        assert_eq!(periods.update, Duration::from_millis(10));
    }

    #[test]
    fn remote_update_is_opt_in() {
        assert!(!CONFIG.remote_update);
        assert!(CONFIG.with_remote_update(true).remote_update);
    }
}
