//! Addressable per-input parameters exposed by the control surface

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::bridge::FrameInterval;
use crate::error::{BridgeError, Result};

/// Control identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlId {
    /// Device-node address stored on the logical input
    NodeAddress,
    /// Frame rate as 16.16 fixed point, derived on every read
    FpsQ16,
}

impl ControlId {
    /// Every control of the cluster, in descriptor order
    pub const ALL: [ControlId; 2] = [ControlId::NodeAddress, ControlId::FpsQ16];

    pub fn info(self) -> ControlInfo {
        match self {
            Self::NodeAddress => ControlInfo {
                id: self,
                name: "Node Address",
                min: 0,
                max: 16,
                step: 2,
                default: 0,
                volatile: true,
                read_only: false,
            },
            Self::FpsQ16 => ControlInfo {
                id: self,
                name: "FPS in Q16 format",
                min: 0,
                max: 0x7fff_ffff,
                step: 1,
                default: 30,
                volatile: true,
                read_only: true,
            },
        }
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeAddress => f.write_str("node_address"),
            Self::FpsQ16 => f.write_str("fps_q16"),
        }
    }
}

impl FromStr for ControlId {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "node_address" => Ok(Self::NodeAddress),
            "fps_q16" => Ok(Self::FpsQ16),
            other => Err(BridgeError::invalid(format!("unknown control '{}'", other))),
        }
    }
}

/// Descriptor of a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlInfo {
    pub id: ControlId,
    pub name: &'static str,
    pub min: i64,
    pub max: i64,
    pub step: i64,
    pub default: i64,
    pub volatile: bool,
    pub read_only: bool,
}

impl ControlInfo {
    /// Check a value proposed for a write
    pub fn validate(&self, value: i64) -> Result<()> {
        if self.read_only {
            return Err(BridgeError::invalid(format!("{} is read-only", self.id)));
        }
        if value < self.min || value > self.max {
            return Err(BridgeError::invalid(format!(
                "{} out of range {}..={}: {}",
                self.id, self.min, self.max, value
            )));
        }
        if (value - self.min) % self.step != 0 {
            return Err(BridgeError::invalid(format!(
                "{} must be a multiple of {} from {}: {}",
                self.id, self.step, self.min, value
            )));
        }
        Ok(())
    }
}

/// One control value, as read back or submitted in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlValue {
    pub id: ControlId,
    pub value: i64,
}

/// Convert a frame interval to 16.16 fixed point
///
/// The denominator is approximated by its floor power of two. A zero
/// denominator means the numerator is already the answer; the low bit is
/// set as a marker.
pub fn frac_to_q16(interval: FrameInterval) -> i64 {
    let num = i64::from(interval.numerator);
    if interval.denominator == 0 {
        return (num << 16) | 1;
    }

    let log2 = interval.denominator.ilog2();
    if log2 <= 16 {
        num << (16 - log2)
    } else {
        num >> (log2 - 16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frac_to_q16() {
        assert_eq!(frac_to_q16(FrameInterval::new(1, 60)), 2048);
        assert_eq!(frac_to_q16(FrameInterval::new(30, 1)), 30 << 16);
        assert_eq!(frac_to_q16(FrameInterval::new(1, 0)), 65537);
        assert_eq!(frac_to_q16(FrameInterval::new(1 << 20, 1 << 20)), 1 << 16);
    }

    #[test]
    fn test_node_address_validation() {
        let info = ControlId::NodeAddress.info();
        assert!(info.validate(0).is_ok());
        assert!(info.validate(16).is_ok());
        assert!(info.validate(3).is_err());
        assert!(info.validate(18).is_err());
        assert!(info.validate(-2).is_err());
    }

    #[test]
    fn test_fps_is_read_only() {
        let info = ControlId::FpsQ16.info();
        assert!(matches!(info.validate(30), Err(BridgeError::InvalidArgument(_))));
    }

    #[test]
    fn test_control_names() {
        for id in ControlId::ALL {
            assert_eq!(id.to_string().parse::<ControlId>().unwrap(), id);
        }
        assert!("gain".parse::<ControlId>().is_err());
    }
}
