//! Runs the station on a desktop, with a simulated sensor and the displays
//! drawn to the log. Every ten seconds a scraper thread fetches `/metrics`
//! through the same path the firmware's HTTP server uses.
use envstation::{
    actor,
    display::{DisplayRotator, SegmentDisplay},
    endpoint::{Endpoint, EndpointService, Request},
    logger,
    runner::MonotonicClock,
    sensor::{EnvSensor, GasSensor, Measurement, Sampler},
    snapshot::GasReading,
    units, Station, CONFIG,
};
use ht16k33_7seg::Glyphs;
use std::{thread, time::Duration, time::Instant};

struct SimulatedEnv {
    started: Instant,
}

struct SimulatedGas {
    polls: u32,
}

struct ConsoleDisplay(&'static str);

impl EnvSensor for SimulatedEnv {
    const NAME: &'static str = "simulated-bme280";

    fn measure(&mut self) -> anyhow::Result<Measurement> {
        let t = self.started.elapsed().as_secs_f32();
        let pressure = 101_325.0 + 150.0 * (t / 60.0).sin();
        Ok(Measurement {
            temperature: 21.5 + 2.0 * (t / 45.0).sin(),
            pressure,
            altitude: units::altitude_meters(pressure, units::SEA_LEVEL_PASCALS),
            humidity: 45.0 + 5.0 * (t / 30.0).cos(),
        })
    }
}

impl GasSensor for SimulatedGas {
    const NAME: &'static str = "simulated-ccs811";

    fn data_ready(&mut self) -> anyhow::Result<bool> {
        self.polls = self.polls.wrapping_add(1);
        // the CCS811 produces a new reading every second; we sample twice as
        // often
        Ok(self.polls % 2 == 0)
    }

    fn read(&mut self) -> anyhow::Result<GasReading> {
        Ok(GasReading {
            co2_ppm: 400 + (self.polls % 200) as u16,
            tvoc_ppb: (self.polls % 50) as u16,
        })
    }
}

impl SegmentDisplay for ConsoleDisplay {
    fn show(&mut self, value: f32) -> anyhow::Result<()> {
        log::info!(target: "display", "[{}] {}", self.0, Glyphs::from_float(value, 2));
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    logger::init()?;
    log::info!("envstation {} (host simulation)", envstation::config::VERSION);

    let (client, requests) = actor::channel(4);
    let sampler = Sampler::with_gas_sensor(
        SimulatedEnv {
            started: Instant::now(),
        },
        SimulatedGas { polls: 0 },
    );
    let rotator = DisplayRotator::new(ConsoleDisplay("upper"), ConsoleDisplay("lower"));
    let mut station = Station::new(sampler, rotator).with_endpoint(EndpointService::new(
        Endpoint::new(CONFIG.gas_report),
        requests,
        || 0,
    ));
    let mut runner = station.runner(&CONFIG)?;

    thread::Builder::new()
        .name("scraper".into())
        .spawn(move || loop {
            thread::sleep(Duration::from_secs(10));
            match client.request_blocking(Request::get("/metrics")) {
                Ok(rsp) => {
                    log::info!(target: "scraper", "GET /metrics -> {}\n{}", rsp.status, rsp.body)
                }
                Err(error) => {
                    log::warn!(target: "scraper", "{error}");
                    return;
                }
            }
        })?;

    runner.run(&mut station, &MonotonicClock::new())
}
