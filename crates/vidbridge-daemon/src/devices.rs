//! Bridge device construction from configuration

use anyhow::{Context, Result};
use linux_embedded_hal::{Delay, I2cdev};
use std::sync::Arc;
use tracing::{info, warn};
use vidbridge_adv7481::{Adv7481, I2cLink, RegisterLink, SimHdmiSignal, SimLink};
use vidbridge_core::{BridgeContext, BridgeDevice, InputInfo};

use crate::config::{Backend, DeviceConfig, PollingConfig};

/// Open the device's register link and wrap it in a driver
pub fn build_device(cfg: &DeviceConfig, polling: &PollingConfig) -> Result<Arc<dyn BridgeDevice>> {
    match cfg.backend {
        Backend::I2c => {
            let bus = I2cdev::new(&cfg.bus)
                .with_context(|| format!("opening {} for {}", cfg.bus, cfg.name))?;
            let link = I2cLink::new(bus, Delay, cfg.map_addresses()).with_settle(polling.settle());
            Ok(Arc::new(prepare(cfg, polling, link)?))
        }
        Backend::Sim => {
            let handle = SimLink::new();
            let device = prepare(cfg, polling, handle.clone())?;
            // Status registers overlap init writes, so load them last
            if cfg.sim_hdmi {
                handle.load_hdmi_signal(&SimHdmiSignal::FHD60);
            }
            if let Some(code) = cfg.sim_sd_standard {
                handle.load_sd_signal(code);
            }
            Ok(Arc::new(device))
        }
    }
}

fn prepare<L: RegisterLink>(cfg: &DeviceConfig, polling: &PollingConfig, link: L) -> Result<Adv7481<L>> {
    let device = Adv7481::new(cfg.name.clone(), link)
        .with_maps(cfg.map_addresses())
        .with_budgets(polling.lock_budget(), polling.sdp_budget());

    if cfg.init {
        device
            .initialize()
            .with_context(|| format!("initializing {}", cfg.name))?;
    }
    info!(device = %cfg.name, backend = ?cfg.backend, "Device ready");
    Ok(device)
}

/// Build and attach every configured device in order
///
/// A device that fails to open or has no catalogue rows is skipped; the
/// rest are still attached.
pub fn attach_all(context: &BridgeContext, devices: &[DeviceConfig], polling: &PollingConfig) -> Vec<InputInfo> {
    let mut added = Vec::new();
    for cfg in devices {
        let device = match build_device(cfg, polling) {
            Ok(device) => device,
            Err(e) => {
                warn!(device = %cfg.name, error = %format!("{:#}", e), "Skipping device");
                continue;
            }
        };
        match context.attach(device) {
            Ok(inputs) => added.extend(inputs),
            Err(e) => warn!(device = %cfg.name, error = %e, "Device not attached"),
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidbridge_adv7481::MapAddresses;
    use vidbridge_core::{BridgeInput, Catalogue, InputCategory, OutputLane};

    fn sim(name: &str) -> DeviceConfig {
        DeviceConfig {
            name: name.to_string(),
            backend: Backend::Sim,
            bus: String::new(),
            address: 0x70,
            maps: MapAddresses::default(),
            init: true,
            sim_hdmi: false,
            sim_sd_standard: None,
        }
    }

    fn catalogue() -> Catalogue {
        Catalogue::from_toml(
            r#"
[[input]]
category = "cvbs"
index = 0
name = "CVBS-0"
code = "cvbs-0"
output = 0
device = "adv7481"

[[input]]
category = "cvbs"
index = 1
name = "CVBS-1"
code = "cvbs-1"
output = 0
device = "adv7481"

[[input]]
category = "hdmi"
index = 0
name = "HDMI-0"
code = "hdmi-0"
output = 1
device = "adv7481"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_sim_devices_attach_in_order() {
        let context = BridgeContext::new(catalogue());
        let devices = [sim("adv7481-0"), sim("adv7481-1")];

        let added = attach_all(&context, &devices, &PollingConfig::default());
        assert_eq!(added.len(), 3);
        assert_eq!(context.devices().unwrap().len(), 2);

        let hdmi: Vec<_> = added
            .iter()
            .filter(|i| i.category == InputCategory::Hdmi)
            .collect();
        assert_eq!(hdmi.len(), 1);
        assert_eq!(hdmi[0].device, "adv7481-1");
    }

    #[test]
    fn test_unopenable_bus_is_skipped() {
        let context = BridgeContext::new(catalogue());
        let mut broken = sim("adv7481-x");
        broken.backend = Backend::I2c;
        broken.bus = "/nonexistent/i2c-99".to_string();

        let added = attach_all(&context, &[broken, sim("adv7481-0")], &PollingConfig::default());
        let names: Vec<_> = context
            .devices()
            .unwrap()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, ["adv7481-0"]);
        assert_eq!(added.len(), 2);
    }

    #[test]
    fn test_unmatched_device_not_kept() {
        // The compiled-in table expects two SD decoders before the adv7481
        let context = BridgeContext::new(Catalogue::default());
        let added = attach_all(&context, &[sim("adv7481-0")], &PollingConfig::default());
        assert!(added.is_empty());
        assert!(context.devices().unwrap().is_empty());
    }

    #[test]
    fn test_sd_signal_seeds_status() {
        let context = BridgeContext::new(catalogue());
        let mut cfg = sim("adv7481-0");
        cfg.sim_sd_standard = Some(0);

        let added = attach_all(&context, &[cfg], &PollingConfig::default());
        assert!(added.iter().all(|i| i.signal_present));
    }

    #[test]
    fn test_sim_hdmi_routes_and_reports_timings() {
        let mut cfg = sim("adv7481-1");
        cfg.sim_hdmi = true;
        let device = build_device(&cfg, &PollingConfig::default()).unwrap();

        device.route(OutputLane::A, BridgeInput::Hdmi(0)).unwrap();
        let timings = device.query_timings().unwrap();
        assert_eq!((timings.active_pixels, timings.active_lines), (1920, 1080));
        assert_eq!(timings.frame_rate, 60);
    }
}
