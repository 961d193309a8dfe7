//! Timing and lock poller
//!
//! Lock bits are sampled under an explicit retry budget. An exhausted HDMI
//! lock budget is logged and decoding continues; only a missing TMDS PLL
//! lock is fatal. The SD poller debounces its status register and fails on
//! instability.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use vidbridge_core::{BridgeError, ColorDepth, Result, TimingSnapshot, VideoStandard};

use crate::link::{LinkError, Map, RegisterLink};
use crate::regs::{self, hdmi, io, sdp};

/// Bounded retry count with a per-iteration sleep window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollBudget {
    pub tries: u32,
    pub min_sleep: Duration,
    pub max_sleep: Duration,
}

impl PollBudget {
    /// HDMI timing lock
    pub const LOCK: Self = Self::new(20, 5000, 6000);
    /// SD status debounce
    pub const SDP: Self = Self::new(30, 5000, 6000);

    pub const fn new(tries: u32, min_sleep_us: u64, max_sleep_us: u64) -> Self {
        Self {
            tries,
            min_sleep: Duration::from_micros(min_sleep_us),
            max_sleep: Duration::from_micros(max_sleep_us),
        }
    }

    fn wait<L: RegisterLink>(&self, link: &mut L) {
        link.sleep_range(self.min_sleep, self.max_sleep);
    }
}

/// Sample `locked` until it reports true or the budget runs out
///
/// Returns whether lock was seen.
fn poll_lock<L, F>(link: &mut L, budget: &PollBudget, what: &str, mut locked: F) -> Result<bool>
where
    L: RegisterLink,
    F: FnMut(&mut L) -> std::result::Result<bool, LinkError>,
{
    for _ in 0..budget.tries {
        if locked(link)? {
            return Ok(true);
        }
        budget.wait(link);
    }
    warn!(tries = budget.tries, "{} not locked", what);
    Ok(false)
}

pub fn decode_color_depth(code: u8) -> ColorDepth {
    match code {
        1 => ColorDepth::Bits10,
        2 => ColorDepth::Bits12,
        3 => ColorDepth::Bits16,
        _ => ColorDepth::Bits8,
    }
}

/// Scale a TMDS clock to the pixel clock for the given color depth
pub fn adjust_pixel_clock(clock: u64, depth: ColorDepth) -> u64 {
    match depth {
        ColorDepth::Bits10 => clock * 4 / 5,
        ColorDepth::Bits12 => clock * 2 / 3,
        ColorDepth::Bits16 => clock / 2,
        ColorDepth::Bits8 => clock,
    }
}

/// Frames per second from pixel clock and frame totals
///
/// The division order is fixed; zero totals yield zero.
pub fn frame_rate(
    pixel_clock: u64,
    total_pixels: u32,
    total_lines: u32,
    field_factor: u32,
    pixel_repetition: u8,
) -> u32 {
    if total_pixels == 0 || total_lines == 0 {
        return 0;
    }
    let mut rate = pixel_clock * u64::from(field_factor) / u64::from(total_lines);
    rate /= u64::from(total_pixels);
    rate /= u64::from(pixel_repetition) + 1;
    u32::try_from(rate).unwrap_or(u32::MAX)
}

/// TMDS clock in Hz from the integer and fraction registers
pub fn decode_tmds(freq: u8, frac: u8) -> u64 {
    let mhz = (u64::from(freq) << 1) | u64::from(hdmi::TMDS_FREQ_LSB.decode(frac));
    let frac = u64::from(hdmi::TMDS_FREQ_FRAC_BITS.decode(frac));
    mhz * 1_000_000 + frac * 1_000_000 / 128
}

pub fn pll_locked<L: RegisterLink>(link: &mut L) -> Result<bool> {
    let param4 = link.read(Map::Hdmi, hdmi::PARAM4)?;
    Ok(hdmi::TMDS_PLL_LOCKED.is_set(param4))
}

/// Produce a timing snapshot from the HDMI receiver
pub fn read_hdmi_timings<L: RegisterLink>(link: &mut L, budget: &PollBudget) -> Result<TimingSnapshot> {
    if !pll_locked(link)? {
        return Err(BridgeError::not_ready("TMDS PLL not locked"));
    }

    let freq = link.read(Map::Hdmi, hdmi::TMDS_FREQ)?;
    let frac = link.read(Map::Hdmi, hdmi::TMDS_FREQ_FRAC)?;
    let tmds = decode_tmds(freq, frac);

    poll_lock(link, budget, "DE regeneration", |l| {
        Ok(io::DE_REGEN_LOCKED_RAW.is_set(l.read(Map::Io, io::RAW_STATUS_3)?))
    })?;
    poll_lock(link, budget, "vertical/DE filter", |l| {
        let v = l.read(Map::Hdmi, hdmi::LINE_WIDTH_1)?;
        Ok(hdmi::VERT_FILTER_LOCKED.is_set(v) && hdmi::DE_REGEN_FILTER_LOCKED.is_set(v))
    })?;

    let depth = decode_color_depth(hdmi::DEEP_COLOR_MODE.decode(
        link.read(Map::Hdmi, hdmi::FIELD1_HEIGHT_1)?,
    ));
    let param5 = link.read(Map::Hdmi, hdmi::PARAM5)?;
    let pixel_repetition = hdmi::PIXEL_REPETITION.decode(param5);
    let interlaced = hdmi::INTERLACED.is_set(param5);
    let field_factor = if interlaced { 2 } else { 1 };

    let mut pair = |hi_reg: u8, hi: regs::Field, lo_reg: u8| -> Result<u32> {
        let h = link.read(Map::Hdmi, hi_reg)?;
        let l = link.read(Map::Hdmi, lo_reg)?;
        Ok(regs::join(hi, h, l))
    };
    let active_pixels = pair(hdmi::LINE_WIDTH_1, hdmi::LINE_WIDTH_HI, hdmi::LINE_WIDTH_2)?;
    let total_pixels = pair(
        hdmi::TOTAL_LINE_WIDTH_1,
        hdmi::TOTAL_LINE_WIDTH_HI,
        hdmi::TOTAL_LINE_WIDTH_2,
    )?;
    let active_lines = pair(hdmi::FIELD0_HEIGHT_1, hdmi::FIELD0_HEIGHT_HI, hdmi::FIELD0_HEIGHT_2)?;
    let total_lines = pair(
        hdmi::FIELD0_TOTAL_HEIGHT_1,
        hdmi::FIELD0_TOTAL_HEIGHT_HI,
        hdmi::FIELD0_TOTAL_HEIGHT_2,
    )?;

    let pixel_clock = adjust_pixel_clock(tmds, depth);
    let frame_rate = frame_rate(
        pixel_clock,
        total_pixels,
        total_lines,
        field_factor,
        pixel_repetition,
    );

    debug!(active_pixels, active_lines, frame_rate, "HDMI timings");
    Ok(TimingSnapshot {
        pixel_clock,
        active_pixels,
        active_lines,
        total_pixels,
        total_lines,
        frame_rate,
        interlaced,
        pixel_repetition,
        color_depth: depth,
    })
}

pub fn decode_standard(code: u8) -> VideoStandard {
    match code {
        0 => VideoStandard::Ntsc,
        1 => VideoStandard::Ntsc443,
        2 => VideoStandard::PalM,
        3 => VideoStandard::Pal60,
        4 => VideoStandard::Pal,
        5 => VideoStandard::Secam,
        6 => VideoStandard::PalCombinationN,
        // SECAM 525
        7 => VideoStandard::Secam,
        _ => VideoStandard::Unknown,
    }
}

/// Debounced SD decoder standard detection
pub fn read_sd_standard<L: RegisterLink>(link: &mut L, budget: &PollBudget) -> Result<VideoStandard> {
    let mut stable = None;
    for _ in 0..budget.tries {
        let first = link.read(Map::Sdp, sdp::STATUS1)?;
        budget.wait(link);
        let second = link.read(Map::Sdp, sdp::STATUS1)?;
        if first == second {
            stable = Some(first);
            break;
        }
    }

    let status = stable.ok_or_else(|| {
        warn!(tries = budget.tries, "SD status unstable");
        BridgeError::Timeout("SD status never stabilized".into())
    })?;
    if !sdp::IN_LOCK.is_set(status) {
        return Err(BridgeError::not_ready(format!(
            "SD input not locked (status {:#04x})",
            status
        )));
    }

    Ok(decode_standard(sdp::AD_RESULT.decode(status)))
}

/// SD decoder lock bit, sampled once
pub fn sd_locked<L: RegisterLink>(link: &mut L) -> Result<bool> {
    Ok(sdp::IN_LOCK.is_set(link.read(Map::Sdp, sdp::STATUS1)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimHdmiSignal, SimLink};

    #[test]
    fn test_frame_rate_division_order() {
        assert_eq!(frame_rate(74, 1650, 750, 1, 0), 74 / 750 / 1650);
        assert_eq!(frame_rate(74_250_000, 1650, 750, 1, 0), 60);
        // 74_250_000 * 2 / 1125 = 132000, / 2200 = 60, / 2 = 30
        assert_eq!(frame_rate(74_250_000, 2200, 1125, 2, 1), 30);
        assert_eq!(frame_rate(148_500_000, 0, 1125, 1, 0), 0);
        assert_eq!(frame_rate(148_500_000, 2200, 0, 1, 0), 0);
    }

    #[test]
    fn test_color_depth_adjustment() {
        assert_eq!(adjust_pixel_clock(100, ColorDepth::Bits10), 80);
        assert_eq!(adjust_pixel_clock(100, ColorDepth::Bits12), 66);
        assert_eq!(adjust_pixel_clock(100, ColorDepth::Bits16), 50);
        assert_eq!(adjust_pixel_clock(100, ColorDepth::Bits8), 100);
    }

    #[test]
    fn test_decode_tmds() {
        // 148 MHz + 64/128
        assert_eq!(decode_tmds(74, 0x40), 148_500_000);
        assert_eq!(decode_tmds(37, 0x80 | 0x20), 75_250_000);
    }

    #[test]
    fn test_unlocked_pll_reads_nothing_else() {
        let handle = SimLink::new();
        let mut link = handle.clone();

        let err = read_hdmi_timings(&mut link, &PollBudget::LOCK).unwrap_err();
        assert!(matches!(err, BridgeError::NotReady(_)));
        assert_eq!(handle.reads(), vec![(Map::Hdmi, hdmi::PARAM4)]);
        assert!(handle.sleeps().is_empty());
    }

    #[test]
    fn test_locked_fhd_snapshot() {
        let handle = SimLink::new();
        handle.load_hdmi_signal(&SimHdmiSignal::FHD60);
        let mut link = handle.clone();

        let t = read_hdmi_timings(&mut link, &PollBudget::LOCK).unwrap();
        assert_eq!(t.pixel_clock, 148_500_000);
        assert_eq!((t.active_pixels, t.active_lines), (1920, 1080));
        assert_eq!((t.total_pixels, t.total_lines), (2200, 1125));
        assert_eq!(t.frame_rate, 60);
        assert!(!t.interlaced);
        assert!(handle.sleeps().is_empty());
    }

    #[test]
    fn test_exhausted_lock_budget_still_decodes() {
        let handle = SimLink::new();
        handle.load_hdmi_signal(&SimHdmiSignal {
            deep_color: 1,
            ..SimHdmiSignal::FHD60
        });
        handle.set(Map::Io, io::RAW_STATUS_3, 0x00);
        let mut link = handle.clone();

        let budget = PollBudget::new(4, 5000, 6000);
        let t = read_hdmi_timings(&mut link, &budget).unwrap();
        assert_eq!(handle.sleeps().len(), 4);
        assert_eq!(t.color_depth, ColorDepth::Bits10);
        assert_eq!(t.pixel_clock, 118_800_000);
        assert_eq!(t.active_pixels, 1920);
    }

    #[test]
    fn test_lock_budgets_are_independent() {
        let handle = SimLink::new();
        handle.load_hdmi_signal(&SimHdmiSignal::FHD60);
        handle.set(Map::Io, io::RAW_STATUS_3, 0x00);
        // Filter lock arrives on the third sample
        let locked = handle.get(Map::Hdmi, hdmi::LINE_WIDTH_1).unwrap();
        handle.script(Map::Hdmi, hdmi::LINE_WIDTH_1, [0x07, 0x07]);
        let mut link = handle.clone();

        let budget = PollBudget::new(3, 5000, 6000);
        read_hdmi_timings(&mut link, &budget).unwrap();
        // 3 for the first loop, 2 before the filter locks
        assert_eq!(handle.sleeps().len(), 5);
        assert_eq!(handle.get(Map::Hdmi, hdmi::LINE_WIDTH_1), Some(locked));
    }

    #[test]
    fn test_sd_standard_detected() {
        let handle = SimLink::new();
        handle.load_sd_signal(4);
        let mut link = handle.clone();
        assert_eq!(read_sd_standard(&mut link, &PollBudget::SDP).unwrap(), VideoStandard::Pal);

        handle.load_sd_signal(7);
        assert_eq!(read_sd_standard(&mut link, &PollBudget::SDP).unwrap(), VideoStandard::Secam);

        handle.load_sd_signal(9);
        assert_eq!(read_sd_standard(&mut link, &PollBudget::SDP).unwrap(), VideoStandard::Unknown);
    }

    #[test]
    fn test_sd_unstable_times_out() {
        let handle = SimLink::new();
        // Alternating samples never agree
        handle.script(Map::Sdp, sdp::STATUS1, (0..60).map(|i| (i % 2) as u8));
        let mut link = handle.clone();

        let err = read_sd_standard(&mut link, &PollBudget::SDP).unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)));
        assert_eq!(handle.reads().len(), 60);
        assert_eq!(handle.sleeps().len(), 30);
    }

    #[test]
    fn test_sd_unlocked_is_not_ready() {
        let handle = SimLink::new();
        handle.set(Map::Sdp, sdp::STATUS1, 0x40);
        let mut link = handle.clone();
        assert!(matches!(
            read_sd_standard(&mut link, &PollBudget::SDP),
            Err(BridgeError::NotReady(_))
        ));
    }
}
