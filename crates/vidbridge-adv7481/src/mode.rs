//! Mode programmer: front-end register sequences per input selection

use std::fmt;
use std::time::Duration;
use tracing::{debug, trace, warn};
use vidbridge_core::{BridgeError, BridgeInput, Result};

use crate::link::{LinkError, Map, RegisterLink};
use crate::regs::{io, sdp};

/// Composite input channel, 1 through 8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel(u8);

impl Channel {
    pub const COUNT: u8 = 8;

    pub fn new(n: u8) -> Result<Self> {
        if (1..=Self::COUNT).contains(&n) {
            Ok(Self(n))
        } else {
            Err(BridgeError::invalid(format!("composite channel {} out of range 1..=8", n)))
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Analog mux code (zero-based)
    pub fn mux_code(self) -> u8 {
        self.0 - 1
    }
}

/// Input selection understood by the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adv7481Input {
    Hdmi,
    Cvbs(Channel),
    /// Composite channel decoded while HDMI stays the primary path
    CvbsWithHdmi(Channel),
    /// Parallel TTL input; no front-end sequence exists for it
    Ttl,
}

impl Adv7481Input {
    /// Modes in which the HDMI receiver is programmed
    pub fn has_hdmi(self) -> bool {
        matches!(self, Self::Hdmi | Self::CvbsWithHdmi(_))
    }

    /// Modes in which the SD core is programmed
    pub fn has_sd(self) -> bool {
        matches!(self, Self::Cvbs(_) | Self::CvbsWithHdmi(_))
    }

    pub fn is_programmable(self) -> bool {
        !matches!(self, Self::Ttl)
    }
}

impl fmt::Display for Adv7481Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hdmi => f.write_str("hdmi"),
            Self::Cvbs(ch) => write!(f, "cvbs{}", ch.number()),
            Self::CvbsWithHdmi(ch) => write!(f, "cvbs{}+hdmi", ch.number()),
            Self::Ttl => f.write_str("ttl"),
        }
    }
}

impl TryFrom<BridgeInput> for Adv7481Input {
    type Error = BridgeError;

    fn try_from(input: BridgeInput) -> Result<Self> {
        match input {
            BridgeInput::Cvbs(n) => Ok(Self::Cvbs(Channel::new(n.saturating_add(1))?)),
            BridgeInput::CvbsWithHdmi(n) => {
                Ok(Self::CvbsWithHdmi(Channel::new(n.saturating_add(1))?))
            }
            BridgeInput::Hdmi(_) | BridgeInput::Mhl(_) => Ok(Self::Hdmi),
            BridgeInput::Ttl => Ok(Self::Ttl),
            BridgeInput::Svideo(_) | BridgeInput::Component(_) => Err(BridgeError::invalid(
                format!("{} has no path on this chip", input),
            )),
        }
    }
}

/// Best-effort register sequence
///
/// Every transaction is attempted even after a failure; the outcome is
/// reported once by [`Sequence::finish`].
pub struct Sequence<'a, L> {
    link: &'a mut L,
    attempted: usize,
    failed: usize,
    first_error: Option<LinkError>,
}

impl<'a, L: RegisterLink> Sequence<'a, L> {
    pub fn new(link: &'a mut L) -> Self {
        Self {
            link,
            attempted: 0,
            failed: 0,
            first_error: None,
        }
    }

    fn record(&mut self, e: LinkError) {
        warn!("{}", e);
        self.failed += 1;
        self.first_error.get_or_insert(e);
    }

    pub fn write(&mut self, map: Map, reg: u8, value: u8) {
        self.attempted += 1;
        if let Err(e) = self.link.write(map, reg, value) {
            self.record(e);
        }
    }

    /// Write a block of `(reg, value)` pairs to one map
    pub fn write_all(&mut self, map: Map, block: &[(u8, u8)]) {
        for &(reg, value) in block {
            self.write(map, reg, value);
        }
    }

    pub fn read(&mut self, map: Map, reg: u8) -> Option<u8> {
        self.attempted += 1;
        match self.link.read(map, reg) {
            Ok(v) => Some(v),
            Err(e) => {
                self.record(e);
                None
            }
        }
    }

    /// Read-modify-write; the write is skipped if the read fails
    pub fn update(&mut self, map: Map, reg: u8, f: impl FnOnce(u8) -> u8) {
        if let Some(v) = self.read(map, reg) {
            self.write(map, reg, f(v));
        }
    }

    pub fn sleep(&mut self, duration: Duration) {
        self.link.sleep(duration);
    }

    pub fn failed(&self) -> bool {
        self.failed > 0
    }

    pub fn finish(self, what: &str) -> Result<()> {
        trace!(what, attempted = self.attempted, failed = self.failed, "Sequence done");
        match self.first_error {
            None => Ok(()),
            Some(e) => Err(BridgeError::Transport(format!(
                "{}: {} of {} transactions failed (first: {})",
                what, self.failed, self.attempted, e
            ))),
        }
    }
}

const HDMI_IO_BLOCK: &[(u8, u8)] = &[
    (0x11, 0x48), // SDR
    (0x04, 0x00), // CP core YUV out
    (0x12, 0xF2), // CP core SDR 4:2:2
    (0x17, 0x80), // saturate luma and chroma to 254
    (0x03, 0x86), // AV codes
    (0x0C, 0xE0), // phase adjustment
    (0x0E, 0xFF), // power down unused interfaces
];

const HDMI_RX_BLOCK: &[(u8, u8)] = &[
    (0x00, 0x08), // foreground channel A
    (0x98, 0xFF),
    (0x99, 0xA3),
    (0x9A, 0x00),
    (0x9B, 0x0A),
    (0x9D, 0x40),
    (0xCB, 0x09),
    (0x3D, 0x10),
    (0x3E, 0x69),
    (0x3F, 0x46),
    (0x4E, 0xFE),
    (0x4F, 0x18),
    (0x57, 0xA3),
    (0x58, 0x04),
    (0x85, 0x10),
    (0x83, 0x00), // all terminations
    (0xA3, 0x01),
    (0xBE, 0x00),
    (0x6C, 0x01), // HPA manual
    (0xF8, 0x01), // HPA asserted
    (0x0F, 0x00), // audio mute ramp fastest
];

const SDP_BLOCK: &[(u8, u8)] = &[
    (0x0F, 0x00),
    (0x00, 0x00),
    (0x03, 0x42),
    (0x04, 0x07),
    (0x13, 0x00),
    (0x17, 0x41),
    (0x31, 0x12),
    (0x52, 0xCD),
    (0x0E, 0xFF),
];

/// HDMI receiver in, YUV 4:2:2 out through transmitter A
pub fn hdmi_sequence<L: RegisterLink>(seq: &mut Sequence<'_, L>) {
    let power = io::RX_EN.encode(1)
        | io::RX_PWDN.encode(0)
        | io::XTAL_PWDN.encode(0)
        | io::CORE_PWDN.encode(0)
        | io::MASTER_PWDN.encode(0);
    seq.write(Map::Io, io::PWR_DOWN_CTRL, power);
    seq.write_all(Map::Io, HDMI_IO_BLOCK);

    let sel = io::CSI4_EN.encode(1) | io::PIX_OUT_EN.encode(1) | io::CSI4_IN_SEL.encode(0);
    seq.write(Map::Io, io::CSI_PIX_EN_SEL, sel);
    seq.write(Map::Cp, 0x7C, 0x00);

    // HDCP 1.1
    seq.write(Map::Repeater, 0x40, 0x83);
    seq.write_all(Map::Hdmi, HDMI_RX_BLOCK);
}

/// Composite front end through the SD core
pub fn cvbs_sequence<L: RegisterLink>(seq: &mut Sequence<'_, L>) {
    seq.write(Map::Io, io::PWR_DOWN_CTRL, 0x30);
    seq.write_all(Map::Sdp, SDP_BLOCK);
    seq.update(Map::Io, io::CSI_PIX_EN_SEL, |v| io::CSI4_IN_SEL.update(v, 1));
    seq.write(Map::Sdp, sdp::AUTODETECT, 0x81);
}

pub fn analog_mux<L: RegisterLink>(seq: &mut Sequence<'_, L>, channel: Channel) {
    seq.write(Map::Sdp, sdp::INPUT_MUX, channel.mux_code());
}

/// Program the front end for `input`
///
/// TTL has no sequence and fails before any write.
pub fn program<L: RegisterLink>(link: &mut L, input: Adv7481Input) -> Result<()> {
    debug!(mode = %input, "Programming input mode");
    let mut seq = Sequence::new(link);

    match input {
        Adv7481Input::Hdmi => hdmi_sequence(&mut seq),
        Adv7481Input::Cvbs(ch) => {
            cvbs_sequence(&mut seq);
            analog_mux(&mut seq, ch);
        }
        Adv7481Input::CvbsWithHdmi(ch) => {
            hdmi_sequence(&mut seq);
            cvbs_sequence(&mut seq);
            analog_mux(&mut seq, ch);
        }
        Adv7481Input::Ttl => {
            return Err(BridgeError::invalid("ttl input has no mode sequence"));
        }
    }

    seq.finish(&format!("mode {}", input))
}
