//! Registry owner: attached devices, their logical inputs and the control surface
//!
//! A `BridgeContext` is constructed once by the orchestration service and
//! passed around by `Arc`. Device and registry mutation is serialized by one
//! registry-wide lock; device work (routing, polling) runs outside it under
//! each device's own guard.

use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::bridge::BridgeDevice;
use crate::catalogue::Catalogue;
use crate::controls::{frac_to_q16, ControlId, ControlValue};
use crate::error::{BridgeError, Result};
use crate::input::{BridgeInput, InputId, OutputLane};
use crate::registry::{InputInfo, InputRegistry};

struct ContextInner {
    devices: Vec<Arc<dyn BridgeDevice>>,
    registry: InputRegistry,
}

pub struct BridgeContext {
    inner: RwLock<ContextInner>,
}

impl BridgeContext {
    pub fn new(catalogue: Catalogue) -> Self {
        Self {
            inner: RwLock::new(ContextInner {
                devices: Vec::new(),
                registry: InputRegistry::new(catalogue),
            }),
        }
    }

    /// Attach a device and create its logical inputs
    ///
    /// Devices must be attached in discovery order. If no catalogue row
    /// matches, the device is not kept.
    pub fn attach(&self, device: Arc<dyn BridgeDevice>) -> Result<Vec<InputInfo>> {
        let mut inner = self.inner.write()?;
        let ids = inner.registry.add_inputs(&device)?;
        inner.devices.push(device.clone());

        info!(device = %device.name(), inputs = ids.len(), "Attached device");
        ids.iter()
            .map(|id| inner.registry.find_by_logical_id(*id).map(|e| e.info()))
            .collect()
    }

    /// Detach the first device named `name` and drop its inputs
    pub fn detach(&self, name: &str) -> Result<Vec<InputId>> {
        let mut inner = self.inner.write()?;
        let pos = inner
            .devices
            .iter()
            .position(|d| d.name() == name)
            .ok_or_else(|| BridgeError::not_found(format!("device {}", name)))?;
        let device = inner.devices.remove(pos);
        let removed = inner.registry.remove_inputs(&device);

        info!(device = %name, inputs = removed.len(), "Detached device");
        Ok(removed)
    }

    pub fn find_device(&self, name: &str) -> Result<Arc<dyn BridgeDevice>> {
        let inner = self.inner.read()?;
        inner
            .devices
            .iter()
            .find(|d| d.name() == name)
            .cloned()
            .ok_or_else(|| BridgeError::not_found(format!("device {}", name)))
    }

    /// Attached devices in attach order
    pub fn devices(&self) -> Result<Vec<Arc<dyn BridgeDevice>>> {
        Ok(self.inner.read()?.devices.clone())
    }

    /// Snapshot of every logical input in insertion order
    pub fn inputs(&self) -> Result<Vec<InputInfo>> {
        let inner = self.inner.read()?;
        Ok(inner.registry.inputs().map(|e| e.info()).collect())
    }

    pub fn input(&self, id: InputId) -> Result<InputInfo> {
        let inner = self.inner.read()?;
        Ok(inner.registry.find_by_logical_id(id)?.info())
    }

    /// First input wired to a backing-device output
    pub fn input_on_output(&self, output: u32) -> Result<InputInfo> {
        let inner = self.inner.read()?;
        Ok(inner.registry.find_by_output(output)?.info())
    }

    fn resolve(&self, id: InputId) -> Result<(Arc<dyn BridgeDevice>, BridgeInput)> {
        let inner = self.inner.read()?;
        let entry = inner.registry.find_by_logical_id(id)?;
        Ok((entry.device.clone(), entry.code))
    }

    /// Re-query the backing device and update the cached signal flag
    pub fn refresh_signal(&self, id: InputId) -> Result<InputInfo> {
        let (device, _) = self.resolve(id)?;
        let status = device.input_status()?;

        let mut inner = self.inner.write()?;
        let entry = inner.registry.find_by_logical_id_mut(id)?;
        entry.signal_present = status.is_present();
        debug!(input = %id, present = entry.signal_present, "Refreshed signal status");
        Ok(entry.info())
    }

    /// Route a logical input to one of its backing device's output lanes
    pub fn route_input(&self, id: InputId, lane: OutputLane) -> Result<InputInfo> {
        let (device, code) = self.resolve(id)?;
        info!(input = %id, device = %device.name(), code = %code, lane = %lane, "Routing input");
        device.route(lane, code)?;
        self.input(id)
    }

    /// Read a control; volatile controls are re-derived on every read
    pub fn get_control(&self, id: InputId, control: ControlId) -> Result<i64> {
        match control {
            ControlId::NodeAddress => {
                let inner = self.inner.read()?;
                Ok(i64::from(inner.registry.find_by_logical_id(id)?.node_address))
            }
            ControlId::FpsQ16 => {
                let (device, _) = self.resolve(id)?;
                let interval = device.frame_interval()?;
                let info = control.info();
                Ok(frac_to_q16(interval).clamp(info.min, info.max))
            }
        }
    }

    pub fn set_control(&self, id: InputId, control: ControlId, value: i64) -> Result<()> {
        control.info().validate(value)?;

        match control {
            ControlId::NodeAddress => {
                let mut inner = self.inner.write()?;
                let entry = inner.registry.find_by_logical_id_mut(id)?;
                // Range already checked against the descriptor
                entry.node_address = value as i32;
                debug!(input = %id, node_address = entry.node_address, "Set node address");
                Ok(())
            }
            ControlId::FpsQ16 => Err(BridgeError::invalid(format!("{} is read-only", control))),
        }
    }

    /// Set each value in order, stopping at the first failure, then read
    /// back the whole cluster
    pub fn apply_controls(&self, id: InputId, values: &[ControlValue]) -> Result<Vec<ControlValue>> {
        for v in values {
            self.set_control(id, v.id, v.value)?;
        }

        ControlId::ALL
            .iter()
            .map(|&control| {
                self.get_control(id, control)
                    .map(|value| ControlValue { id: control, value })
            })
            .collect()
    }
}
