//! ADV7481 device: the routing state and register link behind one guard

use embedded_hal::digital::OutputPin;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};
use vidbridge_core::{
    BridgeDevice, BridgeError, BridgeInput, Colorspace, FrameInterval, InputStatus, MbusFormat,
    OutputLane, PictureControl, PixelCode, Result, RoutingSnapshot, TimingSnapshot, VideoStandard,
};

use crate::edid::{self, DEFAULT_EDID};
use crate::link::{Map, MapAddresses, RegisterLink};
use crate::mode::{self, Adv7481Input, Sequence};
use crate::regs::{cp, io};
use crate::routing::RoutingState;
use crate::timing::{self, PollBudget};

/// Settle time after the software reset
pub const SOFT_RESET_DELAY: Duration = Duration::from_millis(10);
/// Reset line held low
pub const RESET_LOW: Duration = Duration::from_millis(100);
/// Wait after releasing the reset line
pub const RESET_HIGH: Duration = Duration::from_millis(10);

/// Interval reported when no frame rate can be measured
pub const NOMINAL_INTERVAL: FrameInterval = FrameInterval::new(1, 60);

struct Inner<L> {
    link: L,
    routing: RoutingState,
}

pub struct Adv7481<L> {
    name: String,
    maps: MapAddresses,
    lock_budget: PollBudget,
    sdp_budget: PollBudget,
    inner: Mutex<Inner<L>>,
}

impl<L: RegisterLink> Adv7481<L> {
    pub fn new(name: impl Into<String>, link: L) -> Self {
        Self {
            name: name.into(),
            maps: MapAddresses::default(),
            lock_budget: PollBudget::LOCK,
            sdp_budget: PollBudget::SDP,
            inner: Mutex::new(Inner {
                link,
                routing: RoutingState::default(),
            }),
        }
    }

    /// Sub-block addresses programmed by [`Adv7481::initialize`]
    pub fn with_maps(mut self, maps: MapAddresses) -> Self {
        self.maps = maps;
        self
    }

    pub fn with_budgets(mut self, lock: PollBudget, sdp: PollBudget) -> Self {
        self.lock_budget = lock;
        self.sdp_budget = sdp;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<L>>> {
        Ok(self.inner.lock()?)
    }

    /// Software reset, map addressing, EDID upload and SD front end
    pub fn initialize(&self) -> Result<()> {
        let mut guard = self.lock()?;
        let maps = self.maps;
        let mut seq = Sequence::new(&mut guard.link);

        seq.write(Map::Io, io::RESET, io::MAIN_RESET);
        seq.sleep(SOFT_RESET_DELAY);

        seq.write(Map::Io, io::PWR_DN2_XTAL_HIGH, 0x76);
        seq.write(Map::Io, io::CP_VID_STD, 0x4A);
        seq.write(Map::Io, io::I2C_CFG, io::I2C_AUTOINC_EN);

        let map_regs = [
            (io::DPLL_ADDR, Map::Dpll),
            (io::CP_ADDR, Map::Cp),
            (io::HDMI_ADDR, Map::Hdmi),
            (io::EDID_ADDR, Map::Edid),
            (io::REP_ADDR, Map::Repeater),
            (io::INF_ADDR, Map::Infoframe),
            (io::CBUS_ADDR, Map::Cbus),
            (io::CEC_ADDR, Map::Cec),
            (io::SDP_ADDR, Map::Sdp),
            (io::TXB_ADDR, Map::TxB),
            (io::TXA_ADDR, Map::TxA),
        ];
        for (reg, map) in map_regs {
            seq.write(Map::Io, reg, maps.of(map) << 1);
        }

        edid::upload(&mut seq, &DEFAULT_EDID);
        mode::cvbs_sequence(&mut seq);

        let result = seq.finish("initialize");
        match &result {
            Ok(()) => info!(device = %self.name, "Initialized"),
            Err(e) => warn!(device = %self.name, "Initialization incomplete: {}", e),
        }
        result
    }

    /// Pulse the reset line: low for 100 ms, then high and wait 10 ms
    pub fn hardware_reset<P: OutputPin>(&self, pin: &mut P) -> Result<()> {
        let mut guard = self.lock()?;
        let pin_err = |e: P::Error| BridgeError::Transport(format!("reset line: {:?}", e));

        pin.set_low().map_err(pin_err)?;
        guard.link.sleep(RESET_LOW);
        pin.set_high().map_err(pin_err)?;
        guard.link.sleep(RESET_HIGH);

        debug!(device = %self.name, "Hardware reset");
        Ok(())
    }

    /// Active mode, if any
    pub fn mode(&self) -> Result<Option<Adv7481Input>> {
        Ok(self.lock()?.routing.mode)
    }

    fn timing_mode(&self, routing: &RoutingState, op: &str) -> Result<()> {
        match routing.mode {
            Some(m) if m.has_hdmi() => Ok(()),
            _ => Err(BridgeError::invalid(format!(
                "{}: {} needs an HDMI mode",
                self.name, op
            ))),
        }
    }
}

impl<L: RegisterLink> BridgeDevice for Adv7481<L> {
    fn name(&self) -> &str {
        &self.name
    }

    fn route(&self, output: OutputLane, input: BridgeInput) -> Result<()> {
        let input = Adv7481Input::try_from(input)?;
        let mut guard = self.lock()?;
        let Inner { link, routing } = &mut *guard;
        routing.route(link, output, input)
    }

    fn set_stream(&self, on: bool) -> Result<()> {
        let mut guard = self.lock()?;
        let Inner { link, routing } = &mut *guard;
        routing.set_stream(link, on)
    }

    fn set_power(&self, on: bool) -> Result<()> {
        let mut guard = self.lock()?;
        guard.routing.powered = on;
        debug!(device = %self.name, on, "Power");
        Ok(())
    }

    fn query_timings(&self) -> Result<TimingSnapshot> {
        let mut guard = self.lock()?;
        self.timing_mode(&guard.routing, "query_timings")?;
        timing::read_hdmi_timings(&mut guard.link, &self.lock_budget)
    }

    fn query_standard(&self) -> Result<VideoStandard> {
        let mut guard = self.lock()?;
        match guard.routing.mode {
            Some(m) if m.has_sd() => timing::read_sd_standard(&mut guard.link, &self.sdp_budget),
            _ => Err(BridgeError::invalid(format!(
                "{}: query_standard needs a composite mode",
                self.name
            ))),
        }
    }

    fn input_status(&self) -> Result<InputStatus> {
        let mut guard = self.lock()?;
        let locked = match guard.routing.mode {
            Some(Adv7481Input::Hdmi) => timing::pll_locked(&mut guard.link)?,
            _ => timing::sd_locked(&mut guard.link)?,
        };
        if !locked {
            debug!(device = %self.name, "No signal");
        }
        Ok(InputStatus { no_signal: !locked })
    }

    fn frame_interval(&self) -> Result<FrameInterval> {
        let mut guard = self.lock()?;
        if self.timing_mode(&guard.routing, "frame_interval").is_err() {
            return Ok(NOMINAL_INTERVAL);
        }

        match timing::read_hdmi_timings(&mut guard.link, &self.lock_budget) {
            Ok(t) if t.frame_rate > 0 => Ok(FrameInterval::new(1, t.frame_rate)),
            Ok(_) => Ok(NOMINAL_INTERVAL),
            Err(e) => {
                debug!(device = %self.name, "Frame rate unavailable: {}", e);
                Ok(NOMINAL_INTERVAL)
            }
        }
    }

    fn mbus_format(&self) -> Result<MbusFormat> {
        let mut guard = self.lock()?;
        self.timing_mode(&guard.routing, "mbus_format")?;
        let t = timing::read_hdmi_timings(&mut guard.link, &self.lock_budget)?;

        let height = if t.interlaced { t.active_lines / 2 } else { t.active_lines };
        Ok(MbusFormat {
            width: t.active_pixels,
            height,
            code: PixelCode::Yuyv8,
            colorspace: Colorspace::Smpte170m,
        })
    }

    fn set_picture_control(&self, control: PictureControl, value: i32) -> Result<()> {
        let (min, max) = control.range();
        if !(min..=max).contains(&value) {
            return Err(BridgeError::invalid(format!(
                "{:?} out of range {}..={}: {}",
                control, min, max, value
            )));
        }

        let reg = match control {
            PictureControl::Brightness => cp::BRIGHTNESS,
            PictureControl::Contrast => cp::CONTRAST,
            PictureControl::Saturation => cp::SATURATION,
            PictureControl::Hue => cp::HUE,
        };

        let mut guard = self.lock()?;
        let mut seq = Sequence::new(&mut guard.link);
        seq.update(Map::Cp, cp::VID_ADJ, |v| v | cp::VID_ADJ_EN.encode(1));
        // Two's complement for the signed controls
        seq.write(Map::Cp, reg, value as u8);
        seq.finish("picture control")
    }

    fn routing(&self) -> Result<RoutingSnapshot> {
        Ok(self.lock()?.routing.snapshot())
    }
}
