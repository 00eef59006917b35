use crate::{I2cBus, I2cRef};
use ::bme280::{i2c::BME280, Configuration, IIRFilter, Oversampling};
use envstation::{
    config::{self, SensorSettings},
    sensor::{EnvSensor, Measurement},
    units,
};
use esp_idf_hal::delay::Ets;

pub struct Bme280 {
    sensor: BME280<I2cRef<'static>>,
    delay: Ets,
}

const NAME: &str = "BME280";

impl Bme280 {
    pub fn bringup(busman: &'static I2cBus, settings: &SensorSettings) -> anyhow::Result<Self> {
        let config = Configuration::default()
            .with_temperature_oversampling(oversampling(settings.temperature_oversampling))
            .with_pressure_oversampling(oversampling(settings.pressure_oversampling))
            .with_humidity_oversampling(oversampling(settings.humidity_oversampling))
            .with_iir_filter(filter(settings.filter));
        log::info!(target: NAME, "connecting to {NAME} (addr={:#x})...", settings.address);

        let i2c = busman.acquire_i2c();
        // 0x76 is the "primary" address; the SparkFun breakout defaults to the
        // secondary one, 0x77.
        let mut sensor = match settings.address {
            0x76 => BME280::new_primary(i2c),
            _ => BME280::new_secondary(i2c),
        };
        let mut delay = Ets;
        sensor
            .init_with_config(&mut delay, config)
            .map_err(|error| anyhow::anyhow!("failed to initialize {NAME}: {error:?}"))?;
        log::info!(target: NAME, "connected to {NAME}");

        Ok(Self { sensor, delay })
    }
}

impl EnvSensor for Bme280 {
    const NAME: &'static str = NAME;

    fn measure(&mut self) -> anyhow::Result<Measurement> {
        let m = self
            .sensor
            .measure(&mut self.delay)
            .map_err(|error| anyhow::anyhow!("{error:?}"))?;
        Ok(Measurement {
            temperature: m.temperature,
            pressure: m.pressure,
            altitude: units::altitude_meters(m.pressure, units::SEA_LEVEL_PASCALS),
            humidity: m.humidity,
        })
    }
}

fn oversampling(setting: config::Oversampling) -> Oversampling {
    match setting {
        config::Oversampling::X1 => Oversampling::Oversampling1X,
        config::Oversampling::X2 => Oversampling::Oversampling2X,
        config::Oversampling::X4 => Oversampling::Oversampling4X,
        config::Oversampling::X8 => Oversampling::Oversampling8X,
        config::Oversampling::X16 => Oversampling::Oversampling16X,
    }
}

fn filter(setting: config::Filter) -> IIRFilter {
    match setting {
        config::Filter::Off => IIRFilter::Off,
        config::Filter::X2 => IIRFilter::Coefficient2,
        config::Filter::X4 => IIRFilter::Coefficient4,
        config::Filter::X8 => IIRFilter::Coefficient8,
        config::Filter::X16 => IIRFilter::Coefficient16,
    }
}
