//! Device configuration, kept as one JSON blob in NVS

use anyhow::{Context, Result};
use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub use plasma_chase_lib::ChaseConfig;

const NVS_NAMESPACE: &str = "plasma";
const CONFIG_KEY: &str = "config";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiConfig {
    pub ssid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Connection attempts before startup is abandoned
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    /// Pause between connection attempts (ms)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

const fn default_connect_retries() -> u32 {
    30
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: option_env!("PLASMA_WIFI_SSID").unwrap_or("").to_string(),
            password: option_env!("PLASMA_WIFI_PASSWORD")
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            connect_retries: default_connect_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wifi: WifiConfig,
    /// Animation, button and listener settings
    #[serde(flatten)]
    pub chase: ChaseConfig,
    #[serde(default = "default_strip_gpio")]
    pub strip_gpio: u8,
    /// Active-low push button
    #[serde(default = "default_button_gpio")]
    pub button_gpio: u8,
    /// Single WS2812 status pixel - `None` to disable
    #[serde(default)]
    pub status_gpio: Option<u8>,
    /// Global strip brightness (0-255)
    #[serde(default = "default_brightness")]
    pub brightness: u8,
}

const fn default_strip_gpio() -> u8 {
    18
}

const fn default_button_gpio() -> u8 {
    0
}

const fn default_brightness() -> u8 {
    255
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wifi: WifiConfig::default(),
            chase: ChaseConfig::default(),
            strip_gpio: default_strip_gpio(),
            button_gpio: default_button_gpio(),
            status_gpio: None,
            brightness: default_brightness(),
        }
    }
}

impl Config {
    /// Reset unusable values to defaults
    pub fn validate(&mut self) {
        if let Err(e) = self.chase.validate() {
            warn!("Invalid chase settings ({e}), resetting to defaults");
            self.chase = ChaseConfig::default();
        }
        if self.wifi.ssid.is_empty() {
            warn!("WiFi SSID is empty, resetting to default");
            self.wifi = WifiConfig::default();
        }
        if self.wifi.connect_retries == 0 {
            warn!("WiFi connect_retries is 0, using {}", default_connect_retries());
            self.wifi.connect_retries = default_connect_retries();
        }
    }
}

/// Handle on the `plasma` NVS namespace
pub struct ConfigStore {
    nvs: EspNvs<NvsDefault>,
}

impl ConfigStore {
    pub fn open(partition: EspNvsPartition<NvsDefault>) -> Result<Self> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)
            .with_context(|| format!("Failed to open NVS namespace {NVS_NAMESPACE}"))?;
        Ok(Self { nvs })
    }

    /// Stored config, or `None` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<Config>> {
        let Some(len) = self.nvs.blob_len(CONFIG_KEY)? else {
            return Ok(None);
        };
        let mut buf = vec![0u8; len];
        let blob = self
            .nvs
            .get_blob(CONFIG_KEY, &mut buf)?
            .context("Config blob vanished while reading")?;
        let config = serde_json::from_slice(blob).context("Stored config is not valid JSON")?;
        Ok(Some(config))
    }

    pub fn save(&mut self, config: &Config) -> Result<()> {
        let json = serde_json::to_vec(config)?;
        self.nvs.set_blob(CONFIG_KEY, &json)?;
        debug!("Stored {} bytes of config", json.len());
        Ok(())
    }

    /// Load and validate the stored config.
    ///
    /// First boot writes the defaults back so they can be edited in place.
    /// An unreadable blob is left alone and the defaults are used for this run.
    pub fn load_or_default(&mut self) -> Config {
        match self.load() {
            Ok(Some(mut config)) => {
                info!("Loaded config from NVS");
                config.validate();
                config
            }
            Ok(None) => {
                info!("No stored config, writing defaults");
                let config = Config::default();
                if let Err(e) = self.save(&config) {
                    warn!("Failed to store default config: {e:#}");
                }
                config
            }
            Err(e) => {
                warn!("Failed to load config: {e:#}, using defaults");
                Config::default()
            }
        }
    }
}
