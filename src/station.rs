use crate::{
    config::StationConfig,
    display::{DisplayRotator, SegmentDisplay},
    endpoint::EndpointService,
    runner::Runner,
    sensor::{EnvSensor, GasSensor, Sampler},
    snapshot::StationState,
    update::UpdateMonitor,
};
use core::time::Duration;

/// The station: its state plus everything that reads or writes it.
///
/// Each `*_tick` method is one runner task.
#[derive(Debug)]
pub struct Station<E, G, U, L> {
    state: StationState,
    sampler: Sampler<E, G>,
    rotator: DisplayRotator<U, L>,
    endpoint: Option<EndpointService>,
    updates: Option<UpdateMonitor>,
}

impl<E, G, U, L> Station<E, G, U, L>
where
    E: EnvSensor,
    G: GasSensor,
    U: SegmentDisplay,
    L: SegmentDisplay,
{
    pub fn new(sampler: Sampler<E, G>, rotator: DisplayRotator<U, L>) -> Self {
        Self {
            state: StationState::new(),
            sampler,
            rotator,
            endpoint: None,
            updates: None,
        }
    }

    pub fn with_endpoint(self, endpoint: EndpointService) -> Self {
        Self {
            endpoint: Some(endpoint),
            ..self
        }
    }

    pub fn with_updates(self, updates: UpdateMonitor) -> Self {
        Self {
            updates: Some(updates),
            ..self
        }
    }

    pub fn state(&self) -> &StationState {
        &self.state
    }

    pub fn rotator(&self) -> &DisplayRotator<U, L> {
        &self.rotator
    }

    pub fn sample_tick(&mut self, _: Duration) {
        self.sampler.poll(&mut self.state);
    }

    pub fn render_tick(&mut self, _: Duration) {
        self.rotator.render_tick(&mut self.state);
    }

    pub fn endpoint_tick(&mut self, now: Duration) {
        if let Some(endpoint) = self.endpoint.as_mut() {
            endpoint.poll(&self.state, now);
        }
    }

    pub fn update_tick(&mut self, _: Duration) {
        if let Some(updates) = self.updates.as_mut() {
            updates.poll();
        }
    }

    /// Builds the runner with the task set this station was configured for.
    ///
    /// The endpoint task is only registered when an endpoint is attached, and
    /// the update task only when remote updates are enabled in `config`.
    pub fn runner(&self, config: &StationConfig) -> anyhow::Result<Runner<Self>> {
        let periods = config.periods;
        let mut runner = Runner::new();
        runner.add_task("sample", periods.sample, Self::sample_tick)?;
        if self.endpoint.is_some() {
            runner.add_task("endpoint", periods.endpoint, Self::endpoint_tick)?;
        }
        runner.add_task("render", periods.render, Self::render_tick)?;

        match (config.remote_update, self.updates.is_some()) {
            (true, true) => runner.add_task("update", periods.update, Self::update_tick)?,
            (true, false) => {
                log::warn!("remote updates are enabled, but nothing reports update events")
            }
            (false, _) => log::debug!("remote updates are disabled"),
        }

        Ok(runner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actor,
        config::{GasReport, CONFIG},
        display::test_util::RecordingDisplay,
        endpoint::{Endpoint, Request},
        sensor::{
            test_util::{measurement, ScriptedEnv, ScriptedGas},
            Measurement, NoGas,
        },
        snapshot::{GasReading, Page},
        update::{UpdateEvent, UpdateHooks},
    };
    use std::sync::mpsc;

    type TestStation = Station<ScriptedEnv, NoGas, RecordingDisplay, RecordingDisplay>;

    fn station(script: impl IntoIterator<Item = Result<Measurement, &'static str>>) -> TestStation {
        Station::new(
            Sampler::new(ScriptedEnv::new(script)),
            DisplayRotator::new(RecordingDisplay::default(), RecordingDisplay::default()),
        )
    }

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn task_names(runner: &Runner<TestStation>) -> Vec<&'static str> {
        runner.tasks().map(|task| task.name()).collect()
    }

    #[test]
    fn sample_then_render_two_pages() {
        let mut station = station([Ok(measurement(21.5))]);
        let mut runner = station.runner(&CONFIG).unwrap();
        runner.enable_all(ms(0));

        // first pass samples, then renders page A
        runner.execute(&mut station, ms(0));
        // the script is exhausted, so every later sample fails and the
        // snapshot stays put
        for t in (500..=5000).step_by(500) {
            runner.execute(&mut station, ms(t));
        }

        let (upper, lower) = station.rotator().displays();
        assert_eq!(upper.shown, [21.5, 45.2]);
        assert_eq!(lower.shown, [1013.25, 112.0]);
        assert_eq!(station.state().page(), Page::TemperaturePressure);
        assert_eq!(station.state().samples(), 1);
        assert_eq!(station.state().read_errors(), 10);
    }

    #[test]
    fn default_task_set() {
        let station = station([]);
        let runner = station.runner(&CONFIG).unwrap();
        assert_eq!(task_names(&runner), ["sample", "render"]);
    }

    #[test]
    fn endpoint_and_update_tasks() {
        let (client, requests) = actor::channel(2);
        let (update_tx, update_rx) = mpsc::channel();
        let mut station = station([Ok(measurement(21.5))])
            .with_endpoint(EndpointService::new(
                Endpoint::new(GasReport::Omit),
                requests,
                || 0,
            ))
            .with_updates(UpdateMonitor::new(update_rx, UpdateHooks::LOG));

        // updates stay off unless the configuration asks for them
        let runner = station.runner(&CONFIG).unwrap();
        assert_eq!(task_names(&runner), ["sample", "endpoint", "render"]);

        let config = CONFIG.with_remote_update(true);
        let mut runner = station.runner(&config).unwrap();
        assert_eq!(task_names(&runner), ["sample", "endpoint", "render", "update"]);
        runner.enable_all(ms(0));

        let metrics = client.try_send(Request::get("/metrics")).unwrap();
        update_tx.send(UpdateEvent::End).unwrap();
        runner.execute(&mut station, ms(0));

        let rsp = futures::executor::block_on(metrics).unwrap();
        assert_eq!(rsp.status, 200);
        assert!(rsp.body.starts_with("sensor_temperature_celsius 21.50\n"), "{}", rsp.body);
        assert!(rsp.body.ends_with("uptime_seconds 0.00\n"), "{}", rsp.body);
    }

    #[test]
    fn endpoint_before_any_sample() {
        let (client, requests) = actor::channel(2);
        let mut station = station([Err("bus stuck")]).with_endpoint(EndpointService::new(
            Endpoint::new(GasReport::Omit),
            requests,
            || 0,
        ));
        let mut runner = station.runner(&CONFIG).unwrap();
        runner.enable_all(ms(0));

        let metrics = client.try_send(Request::get("/metrics")).unwrap();
        runner.execute(&mut station, ms(0));
        let rsp = futures::executor::block_on(metrics).unwrap();
        assert_eq!(rsp.status, 200);
        assert!(rsp.body.contains("sensor_temperature_celsius 0.00\n"));
        assert!(rsp.body.contains("sensor_read_errors_total 1\n"));
    }

    #[test]
    fn configured_gas_report_reaches_the_endpoint() {
        let config = CONFIG.with_gas_report(GasReport::LastKnown);
        let (client, requests) = actor::channel(2);
        let gas = ScriptedGas {
            script: [
                Ok(Some(GasReading {
                    co2_ppm: 612,
                    tvoc_ppb: 31,
                })),
                Ok(None),
            ]
            .into_iter()
            .collect(),
        };
        let mut station = Station::new(
            Sampler::with_gas_sensor(
                ScriptedEnv::new([Ok(measurement(20.0)), Ok(measurement(21.5))]),
                gas,
            ),
            DisplayRotator::new(RecordingDisplay::default(), RecordingDisplay::default()),
        )
        .with_endpoint(EndpointService::new(
            Endpoint::new(config.gas_report),
            requests,
            || 0,
        ));
        let mut runner = station.runner(&config).unwrap();
        runner.enable_all(ms(0));
        runner.execute(&mut station, ms(0));

        // the second sample has no gas data, but the endpoint repeats the
        // last reading
        let metrics = client.try_send(Request::get("/metrics")).unwrap();
        runner.execute(&mut station, ms(500));
        assert_eq!(station.state().snapshot().co2, None);

        let rsp = futures::executor::block_on(metrics).unwrap();
        assert!(rsp.body.starts_with("sensor_temperature_celsius 21.50\n"), "{}", rsp.body);
        assert!(rsp.body.contains("sensor_co2_ppm 612\n"), "{}", rsp.body);
        assert!(rsp.body.contains("sensor_tvoc_ppb 31\n"), "{}", rsp.body);
    }
}
