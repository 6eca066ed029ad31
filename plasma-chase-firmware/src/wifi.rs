//! Wi-Fi station join and link monitoring

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{info, warn};
use plasma_chase_lib::LinkMonitor;

use crate::config::WifiConfig;

/// Connected station interface; reports link health to the control server
pub struct WifiLink {
    wifi: BlockingWifi<EspWifi<'static>>,
}

impl LinkMonitor for WifiLink {
    fn is_up(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }
}

/// Join the configured network, giving up after the configured number of
/// attempts.
pub fn connect(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    config: &WifiConfig,
) -> Result<WifiLink> {
    let password = config.password.clone().unwrap_or_default();
    let auth_method = if password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };

    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(modem, sys_loop.clone(), Some(nvs))?,
        sys_loop,
    )?;
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: config
            .ssid
            .as_str()
            .try_into()
            .map_err(|()| anyhow!("SSID '{}' is too long", config.ssid))?,
        password: password
            .as_str()
            .try_into()
            .map_err(|()| anyhow!("WiFi password is too long"))?,
        auth_method,
        ..Default::default()
    }))?;
    wifi.start()?;

    info!("Connecting to WiFi '{}'...", config.ssid);
    let retry_delay = Duration::from_millis(config.retry_delay_ms);
    let mut connected = false;
    for attempt in 1..=config.connect_retries {
        match wifi.connect() {
            Ok(()) => {
                connected = true;
                break;
            }
            Err(e) => {
                warn!(
                    "WiFi connect attempt {attempt}/{} failed: {e:?}",
                    config.connect_retries
                );
                thread::sleep(retry_delay);
            }
        }
    }
    if !connected {
        bail!(
            "Could not connect to WiFi '{}' after {} attempts",
            config.ssid,
            config.connect_retries
        );
    }

    wifi.wait_netif_up()?;
    let ip_info = wifi.wifi().sta_netif().get_ip_info()?;
    info!("WiFi connected to '{}' with IP: {}", config.ssid, ip_info.ip);

    Ok(WifiLink { wifi })
}
