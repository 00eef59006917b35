use anyhow::Context;
use envstation::{
    actor,
    display::DisplayRotator,
    endpoint::{Endpoint, EndpointService},
    runner::MonotonicClock,
    sensor::Sampler,
    update::{UpdateHooks, UpdateMonitor},
    ExpBackoff, Retry, Station, CONFIG,
};
use esp_idf_hal::{
    i2c::{I2cConfig, I2cDriver},
    peripherals::Peripherals,
    prelude::*,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop, log::EspLogger, mdns::EspMdns, nvs::EspDefaultNvsPartition,
    ota::EspOta,
};
// If using the `binstart` feature of `esp-idf-sys`, always keep this module
// imported
use esp_idf_sys as _;
use ht16k33_7seg::SevenSegment;
use std::{sync::mpsc, time::Duration};

mod bme280;
mod ccs811;
mod http;
mod net;

pub type I2cRef<'bus> = shared_bus::I2cProxy<'bus, SharedI2c>;
pub type I2cBus = shared_bus::BusManager<SharedI2c>;
pub type SharedI2c = std::sync::Mutex<I2cDriver<'static>>;

// Make sure that the firmware will contain
// up-to-date build time and package info coming from the binary crate
esp_idf_sys::esp_app_desc!();

/// Log like the default hooks, then reboot into the new image once it's
/// written.
const UPDATE_HOOKS: UpdateHooks = UpdateHooks {
    on_end: || {
        (UpdateHooks::LOG.on_end)();
        esp_idf_hal::reset::restart();
    },
    ..UpdateHooks::LOG
};

fn main() -> anyhow::Result<()> {
    // It is necessary to call this function once. Otherwise, some patches to the
    // runtime implemented by esp-idf-sys might not link properly. See
    // https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_sys::link_patches();
    EspLogger::initialize_default();
    log::info!("envstation {} is go!", envstation::config::VERSION);

    let peripherals = Peripherals::take().context("peripherals already taken")?;
    let sysloop = EspSystemEventLoop::take().context("failed to initialize system event loop")?;
    let nvs =
        EspDefaultNvsPartition::take().context("failed to initialize non-volatile storage")?;
    let mut mdns = EspMdns::take().context("failed to initialize mDNS")?;

    // if we got this far after an update, the new image is good
    match EspOta::new() {
        Ok(mut ota) => {
            if let Err(error) = ota.mark_running_slot_valid() {
                log::warn!("failed to mark running slot valid: {error:?}");
            }
        }
        Err(error) => log::warn!("failed to access OTA: {error:?}"),
    }

    let config = I2cConfig::new().baudrate(100u32.kHz().into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio5,
        peripherals.pins.gpio6,
        &config,
    )?;
    let bus: &'static I2cBus =
        shared_bus::new_std!(I2cDriver = i2c).context("I2C bus manager already created")?;

    // bring up displays
    let settings = CONFIG.displays;
    let mut upper = SevenSegment::new(bus.acquire_i2c(), settings.upper_address);
    let mut lower = SevenSegment::new(bus.acquire_i2c(), settings.lower_address);
    for (name, display) in [("upper", &mut upper), ("lower", &mut lower)] {
        display
            .init(settings.brightness)
            .map_err(|error| anyhow::anyhow!("failed to initialize {name} display: {error:?}"))?;
    }

    // bring up sensors
    let env = Retry::new(10)
        .with_target("envstation::bme280")
        .run(|| self::bme280::Bme280::bringup(bus, &CONFIG.sensor))?;
    let sampler = match Retry::new(10)
        .with_target("envstation::ccs811")
        .run(|| ccs811::Ccs811::bringup(bus))
    {
        Ok(gas) => Sampler::with_gas_sensor(env, gas),
        Err(error) => {
            log::warn!("no CO2/TVOC sensor: {error:?}");
            Sampler::without_gas_sensor(env)
        }
    };

    // network
    let mut wifi = net::StationWifi::new(
        peripherals.modem,
        &sysloop,
        nvs,
        env!("WIFI_SSID"),
        env!("WIFI_PASS"),
    )?;
    let ip = Retry::forever()
        .with_target("envstation::wifi")
        .with_backoff(ExpBackoff::new(Duration::from_millis(500)))
        .run(|| wifi.connect(&sysloop))?;
    log::info!("WiFi connected, IP address: {ip}");
    net::init_mdns(&mut mdns, &CONFIG)?;

    let (client, requests) = actor::channel(4);
    let (update_tx, update_rx) = mpsc::channel();
    let _server = http::start_server(
        &CONFIG,
        client,
        CONFIG.remote_update.then_some(update_tx),
    )?;

    let endpoint = EndpointService::new(
        Endpoint::new(CONFIG.gas_report),
        requests,
        free_update_space,
    );
    let mut station = Station::new(sampler, DisplayRotator::new(upper, lower))
        .with_endpoint(endpoint)
        .with_updates(UpdateMonitor::new(update_rx, UPDATE_HOOKS));
    let mut runner = station.runner(&CONFIG)?;
    runner.run(&mut station, &MonotonicClock::new())
}

/// Size of the OTA slot the next update image would be written to, or 0 if
/// there is none.
fn free_update_space() -> u64 {
    let partition = unsafe { esp_idf_sys::esp_ota_get_next_update_partition(core::ptr::null()) };
    if partition.is_null() {
        return 0;
    }
    u64::from(unsafe { (*partition).size })
}
