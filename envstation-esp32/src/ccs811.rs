use crate::{I2cBus, I2cRef};
use embedded_ccs811::{mode::App, prelude::*, Ccs811Awake, MeasurementMode, SlaveAddr};
use envstation::{sensor::GasSensor, snapshot::GasReading};

pub struct Ccs811 {
    sensor: Ccs811Awake<I2cRef<'static>, App>,
}

const NAME: &str = "CCS811";

impl Ccs811 {
    pub fn bringup(busman: &'static I2cBus) -> anyhow::Result<Self> {
        log::info!(target: NAME, "connecting to {NAME}...");
        let sensor = Ccs811Awake::new(busman.acquire_i2c(), SlaveAddr::default());
        let mut sensor = sensor.start_application().map_err(|error| {
            anyhow::anyhow!("failed to start {NAME} application: {:?}", error.error)
        })?;
        sensor
            .set_mode(MeasurementMode::ConstantPower1s)
            .map_err(|error| anyhow::anyhow!("failed to set {NAME} drive mode: {error:?}"))?;
        log::info!(target: NAME, "connected to {NAME}, measuring every second");
        Ok(Self { sensor })
    }
}

impl GasSensor for Ccs811 {
    const NAME: &'static str = NAME;

    fn data_ready(&mut self) -> anyhow::Result<bool> {
        self.sensor
            .has_data_ready()
            .map_err(|error| anyhow::anyhow!("{error:?}"))
    }

    fn read(&mut self) -> anyhow::Result<GasReading> {
        let data = self
            .sensor
            .data()
            .map_err(|error| anyhow::anyhow!("{error:?}"))?;
        Ok(GasReading {
            co2_ppm: data.eco2,
            tvoc_ppb: data.etvoc,
        })
    }
}
