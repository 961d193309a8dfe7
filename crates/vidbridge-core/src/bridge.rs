//! Capability interface implemented by bridge chip drivers
//!
//! Every backing device exposes the same capability set. A driver implements
//! the subset its hardware supports; the default bodies report
//! [`BridgeError::NotSupported`] so callers never probe for optional hooks.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::input::{BridgeInput, OutputLane};

/// Deep-color mode reported by an HDMI receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorDepth {
    #[default]
    Bits8,
    Bits10,
    Bits12,
    Bits16,
}

/// Timing parameters decoded from a locked digital input
///
/// Computed fresh for every query and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimingSnapshot {
    /// Pixel clock in Hz, already adjusted for color depth
    pub pixel_clock: u64,
    pub active_pixels: u32,
    pub active_lines: u32,
    pub total_pixels: u32,
    pub total_lines: u32,
    /// Frames per second, zero when the totals could not be read
    pub frame_rate: u32,
    pub interlaced: bool,
    pub pixel_repetition: u8,
    pub color_depth: ColorDepth,
}

/// Analog video standard detected by a standard-definition decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStandard {
    Ntsc,
    Ntsc443,
    PalM,
    Pal60,
    Pal,
    Secam,
    PalCombinationN,
    Unknown,
}

/// Live signal status of the currently selected input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputStatus {
    pub no_signal: bool,
}

impl InputStatus {
    pub fn is_present(&self) -> bool {
        !self.no_signal
    }
}

/// Time between frames as a rational number of seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInterval {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameInterval {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

/// Media-bus pixel code of the transmitted stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelCode {
    /// YUYV 4:2:2, two 8-bit samples per pixel
    #[serde(rename = "yuyv8_2x8")]
    Yuyv8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Colorspace {
    Smpte170m,
}

/// Frame format on the media bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MbusFormat {
    pub width: u32,
    pub height: u32,
    pub code: PixelCode,
    pub colorspace: Colorspace,
}

/// Picture adjustments applied by the component processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PictureControl {
    Brightness,
    Contrast,
    Saturation,
    Hue,
}

impl PictureControl {
    /// Accepted value range (inclusive)
    pub const fn range(self) -> (i32, i32) {
        match self {
            Self::Brightness => (-128, 127),
            Self::Contrast => (0, 255),
            Self::Saturation => (0, 255),
            Self::Hue => (-127, 128),
        }
    }
}

/// Serializable view of a device's routing state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSnapshot {
    pub powered: bool,
    /// Active mode, `None` while idle
    pub mode: Option<String>,
    pub lane_a: Option<String>,
    pub lane_b: Option<String>,
    /// Lane count of the last configured transmitter
    pub lanes: u8,
}

/// A physical bridge chip instance
pub trait BridgeDevice: Send + Sync {
    /// Device name used for catalogue family matching
    fn name(&self) -> &str;

    /// Bind `input` to `output`, programming the front end if the mode changes
    fn route(&self, output: OutputLane, input: BridgeInput) -> Result<()> {
        let _ = (output, input);
        Err(BridgeError::not_supported(self.name(), "route"))
    }

    /// Start or stop the serial transmitter
    fn set_stream(&self, on: bool) -> Result<()> {
        let _ = on;
        Err(BridgeError::not_supported(self.name(), "set_stream"))
    }

    fn set_power(&self, on: bool) -> Result<()> {
        let _ = on;
        Err(BridgeError::not_supported(self.name(), "set_power"))
    }

    fn query_timings(&self) -> Result<TimingSnapshot> {
        Err(BridgeError::not_supported(self.name(), "query_timings"))
    }

    fn query_standard(&self) -> Result<VideoStandard> {
        Err(BridgeError::not_supported(self.name(), "query_standard"))
    }

    fn input_status(&self) -> Result<InputStatus> {
        Err(BridgeError::not_supported(self.name(), "input_status"))
    }

    fn frame_interval(&self) -> Result<FrameInterval> {
        Err(BridgeError::not_supported(self.name(), "frame_interval"))
    }

    fn mbus_format(&self) -> Result<MbusFormat> {
        Err(BridgeError::not_supported(self.name(), "mbus_format"))
    }

    fn set_picture_control(&self, control: PictureControl, value: i32) -> Result<()> {
        let _ = (control, value);
        Err(BridgeError::not_supported(self.name(), "set_picture_control"))
    }

    fn routing(&self) -> Result<RoutingSnapshot> {
        Err(BridgeError::not_supported(self.name(), "routing"))
    }
}
