//! Static catalogue of logical inputs and the devices that terminate them
//!
//! Each row names a backing-device family (matched by name prefix), the
//! ordinal of the device within that family's discovery order, and the
//! device-specific input code used to drive it.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::BridgeError;
use crate::input::{BridgeInput, InputCategory};

/// A single catalogue row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogueRow {
    pub category: InputCategory,
    /// Index within the category, used for display
    pub index: u32,
    /// Display name (e.g., "CVBS-2")
    pub name: String,
    /// Device-specific input code
    pub code: BridgeInput,
    /// Ordinal of the backing device, also the output the input is wired to
    pub output: u32,
    /// Backing-device name prefix (e.g., "adv7481")
    pub device: String,
    /// Signal status assumed when the device cannot be queried
    #[serde(default = "default_signal_status")]
    pub signal_status: bool,
}

fn default_signal_status() -> bool {
    true
}

impl CatalogueRow {
    fn new(
        category: InputCategory,
        index: u32,
        name: &str,
        code: BridgeInput,
        output: u32,
        device: &str,
    ) -> Self {
        Self {
            category,
            index,
            name: name.to_string(),
            code,
            output,
            device: device.to_string(),
            signal_status: true,
        }
    }

    /// Family match: the device name starts with this row's device prefix
    pub fn matches_device(&self, device_name: &str) -> bool {
        device_name.starts_with(self.device.as_str())
    }
}

/// Ordered catalogue of input rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalogue {
    #[serde(default, rename = "input")]
    rows: Vec<CatalogueRow>,
}

impl Default for Catalogue {
    fn default() -> Self {
        use InputCategory::{Component, Cvbs, Hdmi};

        Self {
            rows: vec![
                CatalogueRow::new(Cvbs, 0, "CVBS-0", BridgeInput::Cvbs(0), 0, "adv7180"),
                CatalogueRow::new(Cvbs, 1, "CVBS-1", BridgeInput::Cvbs(1), 0, "adv7180"),
                CatalogueRow::new(Component, 0, "COMP-0", BridgeInput::Component(0), 0, "adv7180"),
                CatalogueRow::new(Cvbs, 2, "CVBS-2", BridgeInput::Cvbs(0), 1, "adv7180"),
                CatalogueRow::new(Cvbs, 3, "CVBS-3", BridgeInput::Cvbs(1), 1, "adv7180"),
                CatalogueRow::new(Cvbs, 4, "CVBS-4", BridgeInput::Cvbs(2), 1, "adv7180"),
                CatalogueRow::new(Hdmi, 0, "HDMI-1", BridgeInput::Hdmi(1), 2, "adv7481"),
            ],
        }
    }
}

impl Catalogue {
    pub fn new(rows: Vec<CatalogueRow>) -> Self {
        Self { rows }
    }

    /// Load a catalogue from a TOML file of `[[input]]` rows
    pub fn from_file(path: &Path) -> Result<Self, BridgeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Catalogue(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Load a catalogue from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, BridgeError> {
        toml::from_str(content).map_err(|e| BridgeError::Catalogue(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, BridgeError> {
        toml::to_string_pretty(self).map_err(|e| BridgeError::Catalogue(e.to_string()))
    }

    pub fn rows(&self) -> &[CatalogueRow] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&CatalogueRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_catalogue() {
        let catalogue = Catalogue::default();
        assert_eq!(catalogue.len(), 7);

        let hdmi = catalogue.get(6).unwrap();
        assert_eq!(hdmi.category, InputCategory::Hdmi);
        assert_eq!(hdmi.code, BridgeInput::Hdmi(1));
        assert_eq!(hdmi.output, 2);
        assert!(hdmi.matches_device("adv7481"));
        assert!(!hdmi.matches_device("adv7180"));
    }

    #[test]
    fn test_prefix_family_match() {
        let row = Catalogue::default().get(0).unwrap().clone();
        assert!(row.matches_device("adv7180"));
        assert!(row.matches_device("adv7180-1"));
        assert!(!row.matches_device("adv718"));
    }

    #[test]
    fn test_catalogue_from_toml() {
        let content = r#"
            [[input]]
            category = "hdmi"
            index = 0
            name = "HDMI-0"
            code = "hdmi-0"
            output = 0
            device = "adv7481"

            [[input]]
            category = "cvbs"
            index = 0
            name = "CVBS-0"
            code = "cvbs-hdmi-0"
            output = 0
            device = "adv7481"
            signal_status = false
        "#;

        let catalogue = Catalogue::from_toml(content).unwrap();
        assert_eq!(catalogue.len(), 2);
        assert!(catalogue.get(0).unwrap().signal_status);
        assert_eq!(catalogue.get(1).unwrap().code, BridgeInput::CvbsWithHdmi(0));
        assert!(!catalogue.get(1).unwrap().signal_status);
    }

    #[test]
    fn test_catalogue_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content = Catalogue::default().to_toml().unwrap();
        file.write_all(content.as_bytes()).unwrap();

        let loaded = Catalogue::from_file(file.path()).unwrap();
        assert_eq!(loaded, Catalogue::default());
    }

    #[test]
    fn test_bad_code_rejected() {
        let content = r#"
            [[input]]
            category = "cvbs"
            index = 0
            name = "X"
            code = "scart-0"
            output = 0
            device = "adv7180"
        "#;
        assert!(matches!(
            Catalogue::from_toml(content),
            Err(BridgeError::Catalogue(_))
        ));
    }
}
