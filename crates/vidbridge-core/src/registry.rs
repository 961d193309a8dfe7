//! Registry of logical inputs discovered across attached bridge devices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bridge::BridgeDevice;
use crate::catalogue::{Catalogue, CatalogueRow};
use crate::error::{BridgeError, Result};
use crate::input::{BridgeInput, InputCategory, InputId};

/// A discovered logical input
///
/// The registry owns the entry; the backing device is shared with the
/// context that attached it.
#[derive(Clone)]
pub struct LogicalInput {
    pub id: InputId,
    pub category: InputCategory,
    pub index: u32,
    pub name: String,
    pub code: BridgeInput,
    /// Output the input is wired to on its backing device
    pub output: u32,
    pub device: Arc<dyn BridgeDevice>,
    /// Last-known signal-present flag
    pub signal_present: bool,
    /// Device-node address stored by the control layer
    pub node_address: i32,
    pub attached_at: DateTime<Utc>,
}

impl LogicalInput {
    fn from_row(id: InputId, row: &CatalogueRow, device: Arc<dyn BridgeDevice>) -> Self {
        Self {
            id,
            category: row.category,
            index: row.index,
            name: row.name.clone(),
            code: row.code,
            output: row.output,
            device,
            signal_present: row.signal_status,
            node_address: 0,
            attached_at: Utc::now(),
        }
    }

    /// Serializable view of this entry
    pub fn info(&self) -> InputInfo {
        InputInfo {
            id: self.id,
            category: self.category,
            index: self.index,
            name: self.name.clone(),
            code: self.code,
            output: self.output,
            device: self.device.name().to_string(),
            signal_present: self.signal_present,
            node_address: self.node_address,
            attached_at: self.attached_at,
        }
    }
}

impl std::fmt::Debug for LogicalInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalInput")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("code", &self.code)
            .field("output", &self.output)
            .field("device", &self.device.name())
            .field("signal_present", &self.signal_present)
            .finish()
    }
}

/// Snapshot of a logical input for API consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputInfo {
    pub id: InputId,
    pub category: InputCategory,
    pub index: u32,
    pub name: String,
    pub code: BridgeInput,
    pub output: u32,
    pub device: String,
    pub signal_present: bool,
    pub node_address: i32,
    pub attached_at: DateTime<Utc>,
}

/// Ordered collection of logical inputs keyed by identifier
pub struct InputRegistry {
    catalogue: Catalogue,
    entries: BTreeMap<InputId, LogicalInput>,
    /// Insertion order, for enumeration
    order: Vec<InputId>,
    /// Entries added since the registry was last empty
    added: usize,
}

impl InputRegistry {
    pub fn new(catalogue: Catalogue) -> Self {
        Self {
            catalogue,
            entries: BTreeMap::new(),
            order: Vec::new(),
            added: 0,
        }
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// Create entries for a newly attached device
    ///
    /// The scan starts at the number of entries added so far and takes its
    /// batch ordinal from that row. Devices must therefore be attached in
    /// discovery order; an out-of-order attach associates the wrong rows.
    pub fn add_inputs(&mut self, device: &Arc<dyn BridgeDevice>) -> Result<Vec<InputId>> {
        // An emptied registry rescans from the first row so a full
        // detach/re-attach cycle lands on the same catalogue batches
        if self.entries.is_empty() {
            self.added = 0;
        }

        let start = self.added;
        let ordinal = self
            .catalogue
            .get(start)
            .map(|row| row.output)
            .ok_or_else(|| {
                BridgeError::not_found(format!(
                    "catalogue exhausted at row {} for {}",
                    start,
                    device.name()
                ))
            })?;

        let name = device.name().to_string();
        debug!(device = %name, start, ordinal, "Scanning catalogue");

        let matches: Vec<(usize, CatalogueRow)> = self
            .catalogue
            .rows()
            .iter()
            .enumerate()
            .skip(start)
            .filter(|(_, row)| row.matches_device(&name) && row.output == ordinal)
            .map(|(i, row)| (i, row.clone()))
            .collect();

        let mut created = Vec::with_capacity(matches.len());
        for (row_index, row) in matches {
            let id = InputId(row_index as u32);
            if self.entries.contains_key(&id) {
                warn!(device = %name, input = %id, "Input already registered, skipping");
                continue;
            }

            let mut entry = LogicalInput::from_row(id, &row, device.clone());
            match device.input_status() {
                Ok(status) => entry.signal_present = status.is_present(),
                Err(e) => warn!(device = %name, input = %id, "Signal status query failed: {}", e),
            }

            info!(device = %name, input = %id, name = %entry.name, "Added input");
            self.entries.insert(id, entry);
            self.order.push(id);
            self.added += 1;
            created.push(id);
        }

        if created.is_empty() {
            return Err(BridgeError::not_found(format!(
                "no catalogue rows for {} at ordinal {}",
                name, ordinal
            )));
        }

        Ok(created)
    }

    /// Drop every entry backed by `device`
    pub fn remove_inputs(&mut self, device: &Arc<dyn BridgeDevice>) -> Vec<InputId> {
        let removed: Vec<InputId> = self
            .order
            .iter()
            .copied()
            .filter(|id| {
                self.entries
                    .get(id)
                    .is_some_and(|entry| Arc::ptr_eq(&entry.device, device))
            })
            .collect();

        for id in &removed {
            self.entries.remove(id);
        }
        self.order.retain(|id| !removed.contains(id));

        if !removed.is_empty() {
            info!(device = %device.name(), count = removed.len(), "Removed inputs");
        }
        removed
    }

    pub fn find_by_logical_id(&self, id: InputId) -> Result<&LogicalInput> {
        self.entries
            .get(&id)
            .ok_or_else(|| BridgeError::not_found(format!("input {}", id)))
    }

    pub fn find_by_logical_id_mut(&mut self, id: InputId) -> Result<&mut LogicalInput> {
        self.entries
            .get_mut(&id)
            .ok_or_else(|| BridgeError::not_found(format!("input {}", id)))
    }

    /// First entry (in insertion order) wired to `output`
    pub fn find_by_output(&self, output: u32) -> Result<&LogicalInput> {
        self.inputs()
            .find(|entry| entry.output == output)
            .ok_or_else(|| BridgeError::not_found(format!("input on output {}", output)))
    }

    /// Entries in insertion order
    pub fn inputs(&self) -> impl Iterator<Item = &LogicalInput> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bridge::{FrameInterval, InputStatus};

    pub(crate) struct FakeDevice {
        pub name: String,
        pub no_signal: Option<bool>,
        pub interval: Option<FrameInterval>,
    }

    impl FakeDevice {
        pub fn shared(name: &str) -> Arc<dyn BridgeDevice> {
            Arc::new(Self {
                name: name.to_string(),
                no_signal: Some(false),
                interval: None,
            })
        }
    }

    impl BridgeDevice for FakeDevice {
        fn name(&self) -> &str {
            &self.name
        }

        fn input_status(&self) -> Result<InputStatus> {
            match self.no_signal {
                Some(no_signal) => Ok(InputStatus { no_signal }),
                None => Err(BridgeError::Transport("bus".into())),
            }
        }

        fn frame_interval(&self) -> Result<FrameInterval> {
            self.interval
                .ok_or_else(|| BridgeError::not_supported(&self.name, "frame_interval"))
        }
    }

    fn two_family_catalogue() -> Catalogue {
        Catalogue::from_toml(
            r#"
            [[input]]
            category = "cvbs"
            index = 0
            name = "CVBS-0"
            code = "cvbs-0"
            output = 0
            device = "adv7180"

            [[input]]
            category = "component"
            index = 0
            name = "COMP-0"
            code = "component-0"
            output = 0
            device = "adv7180"

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
    fn test_add_matches_family_rows() {
        let mut registry = InputRegistry::new(two_family_catalogue());
        let sd = FakeDevice::shared("adv7180");
        let hdmi = FakeDevice::shared("adv7481");

        let ids = registry.add_inputs(&sd).unwrap();
        assert_eq!(ids, vec![InputId(0), InputId(1)]);
        assert_eq!(registry.find_by_logical_id(InputId(0)).unwrap().category, InputCategory::Cvbs);
        assert_eq!(
            registry.find_by_logical_id(InputId(1)).unwrap().category,
            InputCategory::Component
        );

        let ids = registry.add_inputs(&hdmi).unwrap();
        assert_eq!(ids, vec![InputId(2)]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_remove_only_backing_device_entries() {
        let mut registry = InputRegistry::new(two_family_catalogue());
        let sd = FakeDevice::shared("adv7180");
        let hdmi = FakeDevice::shared("adv7481");
        registry.add_inputs(&sd).unwrap();
        registry.add_inputs(&hdmi).unwrap();

        let removed = registry.remove_inputs(&sd);
        assert_eq!(removed, vec![InputId(0), InputId(1)]);
        assert_eq!(registry.len(), 1);
        assert!(registry.find_by_logical_id(InputId(0)).is_err());
        assert_eq!(registry.find_by_logical_id(InputId(2)).unwrap().name, "HDMI-0");
    }

    #[test]
    fn test_default_catalogue_discovery_order() {
        let mut registry = InputRegistry::new(Catalogue::default());
        let first = FakeDevice::shared("adv7180");
        let second = FakeDevice::shared("adv7180");
        let hdmi = FakeDevice::shared("adv7481");

        assert_eq!(registry.add_inputs(&first).unwrap().len(), 3);
        assert_eq!(
            registry.add_inputs(&second).unwrap(),
            vec![InputId(3), InputId(4), InputId(5)]
        );
        assert_eq!(registry.add_inputs(&hdmi).unwrap(), vec![InputId(6)]);
        assert_eq!(registry.find_by_output(2).unwrap().code, BridgeInput::Hdmi(1));
        assert_eq!(registry.find_by_output(1).unwrap().id, InputId(3));
    }

    #[test]
    fn test_no_matching_rows_is_not_found() {
        let mut registry = InputRegistry::new(Catalogue::default());
        // Ordinal 0 belongs to the adv7180 family
        let hdmi = FakeDevice::shared("adv7481");
        assert!(matches!(registry.add_inputs(&hdmi), Err(BridgeError::NotFound(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_signal_seed_from_device() {
        let mut registry = InputRegistry::new(two_family_catalogue());
        let absent: Arc<dyn BridgeDevice> = Arc::new(FakeDevice {
            name: "adv7180".into(),
            no_signal: Some(true),
            interval: None,
        });
        registry.add_inputs(&absent).unwrap();
        assert!(!registry.find_by_logical_id(InputId(0)).unwrap().signal_present);

        let mut registry = InputRegistry::new(two_family_catalogue());
        let failing: Arc<dyn BridgeDevice> = Arc::new(FakeDevice {
            name: "adv7180".into(),
            no_signal: None,
            interval: None,
        });
        registry.add_inputs(&failing).unwrap();
        // Falls back to the catalogue default
        assert!(registry.find_by_logical_id(InputId(0)).unwrap().signal_present);
    }

    #[test]
    fn test_counter_resets_when_empty() {
        let mut registry = InputRegistry::new(two_family_catalogue());
        let sd = FakeDevice::shared("adv7180");
        registry.add_inputs(&sd).unwrap();
        registry.remove_inputs(&sd);

        let again = FakeDevice::shared("adv7180");
        assert_eq!(registry.add_inputs(&again).unwrap(), vec![InputId(0), InputId(1)]);
        let names: Vec<_> = registry.inputs().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["CVBS-0", "COMP-0"]);
    }
}
