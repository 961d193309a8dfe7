//! Logical input identity and device-specific input codes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

/// Registry-assigned identifier of a logical input
///
/// The value is the catalogue row the input was created from, so it stays
/// stable across detach/attach cycles of the same backing device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputId(pub u32);

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Input category as presented to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputCategory {
    Cvbs,
    Component,
    Hdmi,
}

impl fmt::Display for InputCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cvbs => "cvbs",
            Self::Component => "component",
            Self::Hdmi => "hdmi",
        };
        f.write_str(s)
    }
}

/// One of a bridge device's serial output lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLane {
    /// Four-lane capable transmitter
    A,
    /// Single-lane transmitter
    B,
}

impl fmt::Display for OutputLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("a"),
            Self::B => f.write_str("b"),
        }
    }
}

/// Device-specific input code carried by catalogue rows
///
/// Indices are zero-based. The textual form (`cvbs-0`, `hdmi-1`, `ttl`,
/// `cvbs-hdmi-2`, ...) is what catalogue files and the API use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BridgeInput {
    Cvbs(u8),
    Svideo(u8),
    Component(u8),
    Hdmi(u8),
    Mhl(u8),
    Ttl,
    /// Composite channel decoded while HDMI stays the primary path
    CvbsWithHdmi(u8),
}

impl fmt::Display for BridgeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cvbs(n) => write!(f, "cvbs-{}", n),
            Self::Svideo(n) => write!(f, "svideo-{}", n),
            Self::Component(n) => write!(f, "component-{}", n),
            Self::Hdmi(n) => write!(f, "hdmi-{}", n),
            Self::Mhl(n) => write!(f, "mhl-{}", n),
            Self::Ttl => f.write_str("ttl"),
            Self::CvbsWithHdmi(n) => write!(f, "cvbs-hdmi-{}", n),
        }
    }
}

impl FromStr for BridgeInput {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "ttl" {
            return Ok(Self::Ttl);
        }

        let (kind, index) = s
            .rsplit_once('-')
            .ok_or_else(|| BridgeError::invalid(format!("malformed input code '{}'", s)))?;
        let index: u8 = index
            .parse()
            .map_err(|_| BridgeError::invalid(format!("bad input index in '{}'", s)))?;

        match kind {
            "cvbs" => Ok(Self::Cvbs(index)),
            "svideo" => Ok(Self::Svideo(index)),
            "component" => Ok(Self::Component(index)),
            "hdmi" => Ok(Self::Hdmi(index)),
            "mhl" => Ok(Self::Mhl(index)),
            "cvbs-hdmi" => Ok(Self::CvbsWithHdmi(index)),
            _ => Err(BridgeError::invalid(format!("unknown input kind '{}'", kind))),
        }
    }
}

impl TryFrom<String> for BridgeInput {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BridgeInput> for String {
    fn from(value: BridgeInput) -> Self {
        value.to_string()
    }
}
