//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use vidbridge_adv7481::{MapAddresses, PollBudget, SETTLE_DELAY};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub catalogue: CatalogueConfig,
    /// Bridge devices in discovery order
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Web server bind address
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8090".to_string()
}

/// Retry budgets for lock and status polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_lock_tries")]
    pub lock_tries: u32,
    #[serde(default = "default_min_sleep_us")]
    pub lock_min_sleep_us: u64,
    #[serde(default = "default_max_sleep_us")]
    pub lock_max_sleep_us: u64,
    #[serde(default = "default_sdp_tries")]
    pub sdp_tries: u32,
    #[serde(default = "default_min_sleep_us")]
    pub sdp_min_sleep_us: u64,
    #[serde(default = "default_max_sleep_us")]
    pub sdp_max_sleep_us: u64,
    /// Delay after every register transaction
    #[serde(default = "default_settle_us")]
    pub settle_us: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            lock_tries: default_lock_tries(),
            lock_min_sleep_us: default_min_sleep_us(),
            lock_max_sleep_us: default_max_sleep_us(),
            sdp_tries: default_sdp_tries(),
            sdp_min_sleep_us: default_min_sleep_us(),
            sdp_max_sleep_us: default_max_sleep_us(),
            settle_us: default_settle_us(),
        }
    }
}

fn default_lock_tries() -> u32 {
    PollBudget::LOCK.tries
}

fn default_sdp_tries() -> u32 {
    PollBudget::SDP.tries
}

fn default_min_sleep_us() -> u64 {
    5000
}

fn default_max_sleep_us() -> u64 {
    6000
}

fn default_settle_us() -> u64 {
    SETTLE_DELAY.as_micros() as u64
}

impl PollingConfig {
    pub fn lock_budget(&self) -> PollBudget {
        PollBudget::new(self.lock_tries, self.lock_min_sleep_us, self.lock_max_sleep_us)
    }

    pub fn sdp_budget(&self) -> PollBudget {
        PollBudget::new(self.sdp_tries, self.sdp_min_sleep_us, self.sdp_max_sleep_us)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_micros(self.settle_us)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogueConfig {
    /// Input catalogue file; the compiled-in table is used when unset
    pub path: Option<PathBuf>,
}

/// How a device's registers are reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    I2c,
    /// In-memory register file
    Sim,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device name, matched against catalogue rows by prefix
    pub name: String,
    #[serde(default)]
    pub backend: Backend,
    /// I2C bus device node
    #[serde(default = "default_bus")]
    pub bus: String,
    /// 7-bit address of the IO map
    #[serde(default = "default_address")]
    pub address: u8,
    /// Sub-block map addresses
    #[serde(default)]
    pub maps: MapAddresses,
    /// Run software init and EDID upload at start
    #[serde(default = "default_init")]
    pub init: bool,
    /// Preload a 1080p60 HDMI signal (sim backend only)
    #[serde(default)]
    pub sim_hdmi: bool,
    /// Preload a locked SD decoder with this standard code (sim backend only)
    #[serde(default)]
    pub sim_sd_standard: Option<u8>,
}

fn default_bus() -> String {
    "/dev/i2c-3".to_string()
}

fn default_address() -> u8 {
    0x70
}

fn default_init() -> bool {
    true
}

impl DeviceConfig {
    /// Map addresses with the IO map placed at `address`
    pub fn map_addresses(&self) -> MapAddresses {
        MapAddresses {
            io: self.address,
            ..self.maps
        }
    }
}

const HEADER: &str = "\
# vidbridge configuration
#
# [[device]] rows are attached in order; the catalogue assigns inputs to
# devices by name prefix and position within that order.
# backend = \"i2c\" talks to hardware on `bus`, \"sim\" uses an in-memory
# register file.

";

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        info!(path = %path.display(), devices = config.devices.len(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let config = Config {
        daemon: DaemonConfig::default(),
        polling: PollingConfig::default(),
        catalogue: CatalogueConfig::default(),
        devices: vec![
            DeviceConfig {
                name: "adv7481-0".to_string(),
                backend: Backend::I2c,
                bus: default_bus(),
                address: default_address(),
                maps: MapAddresses::default(),
                init: true,
                sim_hdmi: false,
                sim_sd_standard: None,
            },
        ],
    };

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, format!("{}{}", HEADER, content))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.daemon.bind, "0.0.0.0:8090");
        assert_eq!(config.polling.lock_tries, 20);
        assert_eq!(config.polling.sdp_tries, 30);
        assert!(config.devices.is_empty());
        assert!(config.catalogue.path.is_none());
    }

    #[test]
    fn test_device_rows_in_order() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[daemon]
bind = "127.0.0.1:9000"

[polling]
lock_tries = 5

[[device]]
name = "adv7481-a"
backend = "sim"
sim_hdmi = true

[[device]]
name = "adv7481-b"
bus = "/dev/i2c-1"
address = 0x71
init = false

[device.maps]
sdp = 0x7a
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.daemon.bind, "127.0.0.1:9000");
        assert_eq!(config.polling.lock_budget().tries, 5);
        assert_eq!(config.polling.sdp_budget(), PollBudget::SDP);

        let names: Vec<_> = config.devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["adv7481-a", "adv7481-b"]);

        let a = &config.devices[0];
        assert_eq!(a.backend, Backend::Sim);
        assert!(a.init && a.sim_hdmi);

        let b = &config.devices[1];
        assert_eq!(b.backend, Backend::I2c);
        assert!(!b.init);
        let maps = b.map_addresses();
        assert_eq!(maps.io, 0x71);
        assert_eq!(maps.sdp, 0x7a);
        assert_eq!(maps.cp, MapAddresses::default().cp);
    }

    #[test]
    fn test_default_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidbridge.toml");
        save_default_config(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# vidbridge configuration"));

        let config = load_config(&path).unwrap();
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].address, 0x70);
        assert_eq!(config.polling.settle(), SETTLE_DELAY);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[daemon\nbind = 1").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("parsing"));
    }
}
