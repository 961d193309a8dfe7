//! In-memory register link with a virtual clock
//!
//! Clones share one register file, so a test (or the daemon's `sim`
//! backend) can keep a handle for scripting and inspection after moving a
//! clone into a device.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::link::{LinkError, Map, RegisterLink, SETTLE_DELAY};
use crate::regs::{hdmi, io, sdp};

#[derive(Debug, Default)]
struct SimBus {
    regs: HashMap<(Map, u8), u8>,
    scripts: HashMap<(Map, u8), VecDeque<u8>>,
    fail_reads: HashSet<(Map, u8)>,
    fail_writes: HashSet<(Map, u8)>,
    reads: Vec<(Map, u8)>,
    writes: Vec<(Map, u8, u8)>,
    sleeps: Vec<Duration>,
    elapsed: Duration,
}

/// HDMI signal parameters to preload into the receiver's status registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimHdmiSignal {
    /// Integer TMDS frequency in MHz (9 bits)
    pub tmds_mhz: u16,
    /// Fractional TMDS frequency in 1/128 MHz
    pub tmds_frac: u8,
    pub active_pixels: u16,
    pub active_lines: u16,
    pub total_pixels: u16,
    pub total_lines: u16,
    pub interlaced: bool,
    pub pixel_repetition: u8,
    /// Deep-color field value (0 = 8-bit)
    pub deep_color: u8,
}

impl SimHdmiSignal {
    /// 1920x1080 progressive at 60 Hz, 148.5 MHz
    pub const FHD60: Self = Self {
        tmds_mhz: 148,
        tmds_frac: 64,
        active_pixels: 1920,
        active_lines: 1080,
        total_pixels: 2200,
        total_lines: 1125,
        interlaced: false,
        pixel_repetition: 0,
        deep_color: 0,
    };
}

/// Simulated register link
#[derive(Debug, Clone, Default)]
pub struct SimLink {
    bus: Arc<Mutex<SimBus>>,
}

impl SimLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn bus(&self) -> MutexGuard<'_, SimBus> {
        self.bus.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the value a register holds
    pub fn set(&self, map: Map, reg: u8, value: u8) {
        self.bus().regs.insert((map, reg), value);
    }

    pub fn get(&self, map: Map, reg: u8) -> Option<u8> {
        self.bus().regs.get(&(map, reg)).copied()
    }

    /// Queue values returned by successive reads before the stored value
    pub fn script(&self, map: Map, reg: u8, values: impl IntoIterator<Item = u8>) {
        self.bus()
            .scripts
            .entry((map, reg))
            .or_default()
            .extend(values);
    }

    pub fn fail_write(&self, map: Map, reg: u8) {
        self.bus().fail_writes.insert((map, reg));
    }

    pub fn fail_read(&self, map: Map, reg: u8) {
        self.bus().fail_reads.insert((map, reg));
    }

    /// Every attempted write, in order
    pub fn writes(&self) -> Vec<(Map, u8, u8)> {
        self.bus().writes.clone()
    }

    pub fn writes_to(&self, map: Map) -> Vec<(u8, u8)> {
        self.bus()
            .writes
            .iter()
            .filter(|(m, _, _)| *m == map)
            .map(|(_, reg, value)| (*reg, *value))
            .collect()
    }

    pub fn reads(&self) -> Vec<(Map, u8)> {
        self.bus().reads.clone()
    }

    /// Sleeps requested by callers, excluding per-transaction settle delays
    pub fn sleeps(&self) -> Vec<Duration> {
        self.bus().sleeps.clone()
    }

    /// Virtual time elapsed, including settle delays
    pub fn elapsed(&self) -> Duration {
        self.bus().elapsed
    }

    pub fn clear_log(&self) {
        let mut bus = self.bus();
        bus.reads.clear();
        bus.writes.clear();
        bus.sleeps.clear();
    }

    /// Load a locked HDMI signal into the receiver status registers
    pub fn load_hdmi_signal(&self, signal: &SimHdmiSignal) {
        let mut bus = self.bus();
        let regs = &mut bus.regs;

        regs.insert((Map::Hdmi, hdmi::PARAM4), hdmi::TMDS_PLL_LOCKED.encode(1));
        regs.insert((Map::Hdmi, hdmi::TMDS_FREQ), (signal.tmds_mhz >> 1) as u8);
        regs.insert(
            (Map::Hdmi, hdmi::TMDS_FREQ_FRAC),
            hdmi::TMDS_FREQ_LSB.encode((signal.tmds_mhz & 1) as u8)
                | hdmi::TMDS_FREQ_FRAC_BITS.encode(signal.tmds_frac),
        );
        regs.insert((Map::Io, io::RAW_STATUS_3), io::DE_REGEN_LOCKED_RAW.encode(1));

        regs.insert(
            (Map::Hdmi, hdmi::LINE_WIDTH_1),
            hdmi::VERT_FILTER_LOCKED.encode(1)
                | hdmi::DE_REGEN_FILTER_LOCKED.encode(1)
                | hdmi::LINE_WIDTH_HI.encode((signal.active_pixels >> 8) as u8),
        );
        regs.insert((Map::Hdmi, hdmi::LINE_WIDTH_2), signal.active_pixels as u8);
        regs.insert(
            (Map::Hdmi, hdmi::FIELD0_HEIGHT_1),
            hdmi::FIELD0_HEIGHT_HI.encode((signal.active_lines >> 8) as u8),
        );
        regs.insert((Map::Hdmi, hdmi::FIELD0_HEIGHT_2), signal.active_lines as u8);
        regs.insert(
            (Map::Hdmi, hdmi::TOTAL_LINE_WIDTH_1),
            hdmi::TOTAL_LINE_WIDTH_HI.encode((signal.total_pixels >> 8) as u8),
        );
        regs.insert((Map::Hdmi, hdmi::TOTAL_LINE_WIDTH_2), signal.total_pixels as u8);
        regs.insert(
            (Map::Hdmi, hdmi::FIELD0_TOTAL_HEIGHT_1),
            hdmi::FIELD0_TOTAL_HEIGHT_HI.encode((signal.total_lines >> 8) as u8),
        );
        regs.insert((Map::Hdmi, hdmi::FIELD0_TOTAL_HEIGHT_2), signal.total_lines as u8);
        regs.insert(
            (Map::Hdmi, hdmi::PARAM5),
            hdmi::PIXEL_REPETITION.encode(signal.pixel_repetition)
                | hdmi::INTERLACED.encode(signal.interlaced as u8),
        );
        regs.insert(
            (Map::Hdmi, hdmi::FIELD1_HEIGHT_1),
            hdmi::DEEP_COLOR_MODE.encode(signal.deep_color),
        );
    }

    /// Load a locked standard-definition signal with the given standard code
    pub fn load_sd_signal(&self, standard_code: u8) {
        self.set(
            Map::Sdp,
            sdp::STATUS1,
            sdp::IN_LOCK.encode(1) | sdp::AD_RESULT.encode(standard_code),
        );
    }
}

impl RegisterLink for SimLink {
    fn read(&mut self, map: Map, reg: u8) -> Result<u8, LinkError> {
        let mut bus = self.bus();
        bus.elapsed += SETTLE_DELAY;
        bus.reads.push((map, reg));

        if bus.fail_reads.contains(&(map, reg)) {
            return Err(LinkError::Read {
                map,
                reg,
                reason: "injected".into(),
            });
        }

        if let Some(value) = bus.scripts.get_mut(&(map, reg)).and_then(|q| q.pop_front()) {
            return Ok(value);
        }
        Ok(bus.regs.get(&(map, reg)).copied().unwrap_or(0))
    }

    fn write(&mut self, map: Map, reg: u8, value: u8) -> Result<(), LinkError> {
        let mut bus = self.bus();
        bus.elapsed += SETTLE_DELAY;
        bus.writes.push((map, reg, value));

        if bus.fail_writes.contains(&(map, reg)) {
            return Err(LinkError::Write {
                map,
                reg,
                reason: "injected".into(),
            });
        }

        bus.regs.insert((map, reg), value);
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) {
        let mut bus = self.bus();
        bus.elapsed += duration;
        bus.sleeps.push(duration);
    }
}
