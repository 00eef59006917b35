use crate::snapshot::{GasReading, Snapshot, StationState};

/// A temperature / pressure / humidity sensor.
pub trait EnvSensor {
    const NAME: &'static str;

    fn measure(&mut self) -> anyhow::Result<Measurement>;
}

/// A secondary CO2 / TVOC sensor that produces data at its own pace.
pub trait GasSensor {
    const NAME: &'static str;

    /// Returns `true` if a new reading can be read.
    fn data_ready(&mut self) -> anyhow::Result<bool>;

    fn read(&mut self) -> anyhow::Result<GasReading>;
}

/// The raw readings from an [`EnvSensor`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Measurement {
    pub temperature: f32,
    pub pressure: f32,
    pub altitude: f32,
    pub humidity: f32,
}

/// Stands in for the gas sensor on stations that don't have one.
#[derive(Debug)]
pub enum NoGas {}

/// Reads the sensors and publishes [`Snapshot`]s.
#[derive(Debug)]
pub struct Sampler<E, G = NoGas> {
    env: E,
    gas: Option<G>,
}

// === impl Sampler ===

impl<E: EnvSensor> Sampler<E> {
    pub fn new(env: E) -> Self {
        Self { env, gas: None }
    }
}

impl<E: EnvSensor, G: GasSensor> Sampler<E, G> {
    pub fn with_gas_sensor(env: E, gas: G) -> Self {
        Self {
            env,
            gas: Some(gas),
        }
    }

    /// Like [`Sampler::new`], for when a gas sensor type is expected but the
    /// device didn't come up.
    pub fn without_gas_sensor(env: E) -> Self {
        Self { env, gas: None }
    }

    /// Assembles a new snapshot from the sensors.
    ///
    /// Only a failure of the environment sensor is an error. If the gas
    /// sensor is missing, has nothing new, or fails, the gas fields are left
    /// empty.
    pub fn sample(&mut self) -> anyhow::Result<Snapshot> {
        let Measurement {
            temperature,
            pressure,
            altitude,
            humidity,
        } = self
            .env
            .measure()
            .map_err(|error| anyhow::anyhow!("error reading from {}: {error:?}", E::NAME))?;

        let snapshot = Snapshot {
            temperature,
            pressure,
            altitude,
            humidity,
            co2: None,
            tvoc: None,
        };

        match self.gas.as_mut().map(Self::read_gas) {
            Some(Ok(Some(gas))) => Ok(snapshot.with_gas(gas)),
            Some(Err(error)) => {
                log::warn!(target: G::NAME, "{error:?}");
                Ok(snapshot)
            }
            _ => Ok(snapshot),
        }
    }

    /// Samples and publishes the result into `state`.
    ///
    /// If the sample fails, the previous snapshot stays in place and the
    /// error is only logged and counted. Returns whether a snapshot was
    /// published.
    pub fn poll(&mut self, state: &mut StationState) -> bool {
        match self.sample() {
            Ok(snapshot) => {
                log::debug!(target: E::NAME, "{snapshot}");
                state.publish(snapshot);
                true
            }
            Err(error) => {
                log::warn!(target: E::NAME, "{error}; keeping previous snapshot");
                state.record_read_error();
                false
            }
        }
    }

    fn read_gas(gas: &mut G) -> anyhow::Result<Option<GasReading>> {
        let ready = gas
            .data_ready()
            .map_err(|error| anyhow::anyhow!("error reading {} status: {error:?}", G::NAME))?;
        if !ready {
            log::trace!(target: G::NAME, "no new data yet");
            return Ok(None);
        }

        let reading = gas
            .read()
            .map_err(|error| anyhow::anyhow!("error reading from {}: {error:?}", G::NAME))?;
        log::debug!(
            target: G::NAME,
            "eCO2: {:>4} ppm, tVOC: {:>3} ppb",
            reading.co2_ppm,
            reading.tvoc_ppb
        );
        Ok(Some(reading))
    }
}

// === impl NoGas ===

impl GasSensor for NoGas {
    const NAME: &'static str = "none";

    fn data_ready(&mut self) -> anyhow::Result<bool> {
        match *self {}
    }

    fn read(&mut self) -> anyhow::Result<GasReading> {
        match *self {}
    }
}
