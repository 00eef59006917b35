use serde::Serialize;
use std::fmt;

/// One complete set of readings.
///
/// A `Snapshot` is only ever replaced as a whole; readers never observe a
/// record merged from two different samples.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Pascals.
    pub pressure: f32,
    /// Meters above sea level, derived from `pressure`.
    pub altitude: f32,
    /// Relative humidity percentage.
    pub humidity: f32,
    /// Equivalent CO2 in ppm. `None` if the gas sensor had nothing new (or
    /// there is no gas sensor), which is not the same as measuring zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co2: Option<u16>,
    /// Total volatile organic compounds in ppb. Absent under the same
    /// conditions as `co2`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvoc: Option<u16>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct GasReading {
    pub co2_ppm: u16,
    pub tvoc_ppb: u16,
}

/// Which pair of readings the two displays show.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Page {
    /// Temperature on top, pressure in hPa below.
    #[default]
    TemperaturePressure,
    /// Humidity on top, altitude below.
    HumidityAltitude,
}

/// Everything the periodic tasks share.
///
/// The station runs all of its tasks from one thread, so this is a plain
/// struct handed to each task by `&mut`.
#[derive(Debug, Default)]
pub struct StationState {
    snapshot: Snapshot,
    page: Page,
    last_gas: Option<GasReading>,
    samples: u64,
    read_errors: u64,
}

// === impl Snapshot ===

impl Snapshot {
    pub fn with_gas(self, gas: GasReading) -> Self {
        Self {
            co2: Some(gas.co2_ppm),
            tvoc: Some(gas.tvoc_ppb),
            ..self
        }
    }

    pub fn gas(&self) -> Option<GasReading> {
        Some(GasReading {
            co2_ppm: self.co2?,
            tvoc_ppb: self.tvoc?,
        })
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            temperature,
            pressure,
            altitude,
            humidity,
            co2,
            tvoc,
        } = self;
        write!(
            f,
            "Temp: {temperature:>3.2} \u{00B0}C, Pressure: {pressure:>6.2} Pa, \
            Humidity: {humidity:>3.2}%, Height: {altitude:>3.2} m"
        )?;
        match (co2, tvoc) {
            (Some(co2), Some(tvoc)) => write!(f, ", CO2: {co2} ppm, TVOC: {tvoc} ppb"),
            _ => f.write_str(", CO2/TVOC: n/a"),
        }
    }
}

// === impl Page ===

impl Page {
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Self::TemperaturePressure => Self::HumidityAltitude,
            Self::HumidityAltitude => Self::TemperaturePressure,
        }
    }
}

// === impl StationState ===

impl StationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current snapshot.
    pub fn publish(&mut self, snapshot: Snapshot) {
        if let Some(gas) = snapshot.gas() {
            self.last_gas = Some(gas);
        }
        self.snapshot = snapshot;
        self.samples += 1;
    }

    pub fn record_read_error(&mut self) {
        self.read_errors += 1;
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The most recent gas reading, even if the current snapshot has none.
    pub fn last_gas(&self) -> Option<GasReading> {
        self.last_gas
    }

    pub fn page(&self) -> Page {
        self.page
    }

    /// Returns the current page and advances to the other one.
    pub fn turn_page(&mut self) -> Page {
        let page = self.page;
        self.page = page.flip();
        page
    }

    /// Number of snapshots published so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn read_errors(&self) -> u64 {
        self.read_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(temperature: f32) -> Snapshot {
        Snapshot {
            temperature,
            pressure: 101_325.0,
            altitude: 112.0,
            humidity: 45.2,
            co2: None,
            tvoc: None,
        }
    }

    #[test]
    fn default_is_zeroed_without_gas() {
        let state = StationState::new();
        assert_eq!(state.snapshot(), &Snapshot::default());
        assert_eq!(state.snapshot().temperature, 0.0);
        assert_eq!(state.snapshot().gas(), None);
        assert_eq!(state.page(), Page::TemperaturePressure);
        assert_eq!(state.samples(), 0);
    }

    #[test]
    fn publish_replaces_whole_snapshot() {
        let mut state = StationState::new();
        let gas = GasReading {
            co2_ppm: 450,
            tvoc_ppb: 12,
        };
        state.publish(snapshot(20.0).with_gas(gas));
        state.publish(snapshot(21.0));

        // no gas fields carried over from the previous sample
        assert_eq!(state.snapshot(), &snapshot(21.0));
        assert_eq!(state.last_gas(), Some(gas));
        assert_eq!(state.samples(), 2);
    }

    #[test]
    fn pages_alternate() {
        let mut state = StationState::new();
        let pages: Vec<_> = (0..5).map(|_| state.turn_page()).collect();
        assert_eq!(
            pages,
            [
                Page::TemperaturePressure,
                Page::HumidityAltitude,
                Page::TemperaturePressure,
                Page::HumidityAltitude,
                Page::TemperaturePressure,
            ]
        );
    }

    #[test]
    fn gas_needs_both_fields() {
        let half = Snapshot {
            co2: Some(400),
            ..Snapshot::default()
        };
        assert_eq!(half.gas(), None);
    }

    #[test]
    fn display_without_gas() {
        let line = snapshot(21.5).to_string();
        assert!(line.contains("Temp: 21.50"), "{line}");
        assert!(line.ends_with("CO2/TVOC: n/a"), "{line}");
    }
}
