use anyhow::Context;
use embedded_svc::wifi::{ClientConfiguration, Configuration, Wifi};
use envstation::{config::VERSION, StationConfig};
use esp_idf_hal::{modem::Modem, peripheral::Peripheral};
use esp_idf_svc::{
    eventloop::*,
    mdns::EspMdns,
    netif::{EspNetif, EspNetifWait},
    nvs::EspDefaultNvsPartition,
    wifi::{EspWifi, WifiWait},
};
use std::{net::Ipv4Addr, time::Duration};

pub struct StationWifi {
    wifi: Box<EspWifi<'static>>,
    wait_timeout: Duration,
}

impl StationWifi {
    pub fn new(
        modem: impl Peripheral<P = Modem> + 'static,
        sysloop: &EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        ssid: &str,
        password: &str,
    ) -> anyhow::Result<Self> {
        let mut wifi = Box::new(EspWifi::new(modem, sysloop.clone(), Some(nvs))?);
        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid.parse().map_err(|_| anyhow::anyhow!("ssid too long"))?,
            password: password
                .parse()
                .map_err(|_| anyhow::anyhow!("password too long"))?,
            ..Default::default()
        });
        wifi.set_configuration(&config)
            .context("failed to set WiFi configuration")?;

        Ok(Self {
            wifi,
            wait_timeout: Duration::from_secs(20),
        })
    }

    /// Starts the station interface and waits for a DHCP lease.
    ///
    /// Each call is a single attempt; on failure the interface is stopped
    /// again so the next attempt starts clean.
    pub fn connect(&mut self, sysloop: &EspSystemEventLoop) -> anyhow::Result<Ipv4Addr> {
        let result = self.try_connect(sysloop);
        if result.is_err() {
            if let Err(error) = self.wifi.stop() {
                log::debug!("failed to stop WiFi after failed attempt: {error}");
            }
        }
        result
    }

    fn try_connect(&mut self, sysloop: &EspSystemEventLoop) -> anyhow::Result<Ipv4Addr> {
        self.wifi.start().context("failed to start WiFi")?;

        log::debug!("Waiting for wifi to start ({:?})...", self.wait_timeout);
        let wait = WifiWait::new(sysloop)
            .context("failed to create wifi wait")?
            .wait_with_timeout(self.wait_timeout, || {
                self.wifi.is_started().unwrap_or_default()
            });
        anyhow::ensure!(wait, "WiFi did not start within {:?}", self.wait_timeout);

        log::info!("Connecting wifi...");
        self.wifi
            .connect()
            .context("failed to connect to WiFi network")?;

        let netif_wait = EspNetifWait::new::<EspNetif>(self.wifi.sta_netif(), sysloop)
            .context("failed to create wait for STA netif")?
            .wait_with_timeout(self.wait_timeout, || {
                self.wifi.is_connected().unwrap_or_default()
                    && self
                        .wifi
                        .sta_netif()
                        .get_ip_info()
                        .map(|info| !info.ip.is_unspecified())
                        .unwrap_or_default()
            });
        anyhow::ensure!(
            netif_wait,
            "WiFi did not recieve a DHCP lease within {:?}",
            self.wait_timeout
        );

        let ip_info = self.wifi.sta_netif().get_ip_info()?;
        log::info!("WiFi DHCP info: {ip_info:?}");
        Ok(ip_info.ip)
    }
}

pub fn init_mdns(mdns: &mut EspMdns, config: &StationConfig) -> anyhow::Result<()> {
    let txt = &[("board", "esp32c3"), ("version", VERSION)];
    mdns.set_hostname(config.mdns_name)
        .context("set mDNS hostname")?;
    mdns.set_instance_name("Environmental sensor station")
        .context("set mDNS instance name")?;
    mdns.add_service(None, "_http", "_tcp", config.http_port, txt)
        .context("add HTTP mDNS service")?;
    mdns.add_service(None, "_prometheus-http", "_tcp", config.http_port, txt)
        .context("add Prometheus HTTP mDNS service")?;

    log::info!("advertising mDNS services as {}.local", config.mdns_name);

    Ok(())
}
