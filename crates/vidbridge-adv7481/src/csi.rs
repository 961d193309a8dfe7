//! Output lane configurator for the two CSI transmitters

use std::time::Duration;
use tracing::debug;
use vidbridge_core::{OutputLane, Result};

use crate::link::{Map, RegisterLink};
use crate::mode::{Adv7481Input, Sequence};
use crate::regs::{csi, io};

/// Wait after enabling the transmitter PLL
pub const PLL_SETTLE: Duration = Duration::from_millis(200);
/// Wait after powering the lanes
pub const LANE_SETTLE: Duration = Duration::from_millis(100);
/// Wait between the two closing calibration writes
pub const CAL_SETTLE: Duration = Duration::from_millis(100);

const PHY_BLOCK: &[(u8, u8)] = &[(0xD6, 0x07), (0xC4, 0x0A), (0x71, 0x33), (0x72, 0x11)];

pub fn tx_map(lane: OutputLane) -> Map {
    match lane {
        OutputLane::A => Map::TxA,
        OutputLane::B => Map::TxB,
    }
}

/// Pick the transmitter and lane count for streaming
///
/// Output A carries 2 lanes for HDMI and 1 otherwise; output B is always
/// 1 lane. With nothing routed, output A at 1 lane.
pub fn lane_policy(
    lane_a: Option<Adv7481Input>,
    lane_b: Option<Adv7481Input>,
) -> (OutputLane, u8) {
    match (lane_a, lane_b) {
        (Some(Adv7481Input::Hdmi), _) => (OutputLane::A, 2),
        (Some(_), _) => (OutputLane::A, 1),
        (None, Some(_)) => (OutputLane::B, 1),
        (None, None) => (OutputLane::A, 1),
    }
}

fn pixel_select(lane: OutputLane) -> u8 {
    match lane {
        OutputLane::A => {
            io::CSI4_EN.encode(1) | io::PIX_OUT_EN.encode(1) | io::CSI4_IN_SEL.encode(0)
        }
        // 1-lane transmitter, SD core routed through the pixel port
        OutputLane::B => {
            io::CSI1_EN.encode(1)
                | io::PIX_OUT_EN.encode(1)
                | io::SD_THRU_PIX_OUT.encode(1)
                | io::CSI4_IN_SEL.encode(0)
        }
    }
}

/// Bring a transmitter up with `lanes` data lanes
///
/// The three settle waits are unconditional minimums.
pub fn power_up<L: RegisterLink>(link: &mut L, lane: OutputLane, lanes: u8) -> Result<()> {
    debug!(lane = %lane, lanes, "Powering up transmitter");
    let map = tx_map(lane);
    let mut seq = Sequence::new(link);

    let mut cfg = csi::TX_PWRDN.encode(1) | csi::NUM_LANES.encode(lanes);
    seq.write(map, csi::TX_CFG1, cfg);
    seq.write(Map::Io, io::CSI_PIX_EN_SEL, pixel_select(lane));
    cfg |= csi::AUTO_PARAMS.encode(1);
    seq.write(map, csi::TX_CFG1, cfg);

    seq.write_all(map, PHY_BLOCK);
    // D-PHY power up
    seq.write(map, 0xF0, 0x00);
    seq.write(map, 0x31, 0x82);
    seq.write(map, 0x1E, 0x40);

    // PLL enable
    seq.write(map, 0xDA, 0x01);
    seq.sleep(PLL_SETTLE);

    let cfg = csi::TX_PWRDN.encode(0) | csi::AUTO_PARAMS.encode(1) | csi::NUM_LANES.encode(lanes);
    seq.write(map, csi::TX_CFG1, cfg);
    seq.sleep(LANE_SETTLE);

    seq.write(map, 0xC1, 0x2B);
    seq.sleep(CAL_SETTLE);
    seq.write(map, 0x31, 0x80);

    seq.finish(&format!("tx{} power up", lane))
}

/// Hold a transmitter in power-down
pub fn power_down<L: RegisterLink>(link: &mut L, lane: OutputLane, lanes: u8) -> Result<()> {
    debug!(lane = %lane, "Powering down transmitter");
    let mut seq = Sequence::new(link);
    let cfg = csi::TX_PWRDN.encode(1) | csi::AUTO_PARAMS.encode(1) | csi::NUM_LANES.encode(lanes);
    seq.write(tx_map(lane), csi::TX_CFG1, cfg);
    seq.finish(&format!("tx{} power down", lane))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Channel;
    use crate::sim::SimLink;

    #[test]
    fn test_lane_policy() {
        let cvbs = Adv7481Input::Cvbs(Channel::new(1).unwrap());
        assert_eq!(lane_policy(Some(Adv7481Input::Hdmi), None), (OutputLane::A, 2));
        assert_eq!(lane_policy(Some(cvbs), Some(cvbs)), (OutputLane::A, 1));
        assert_eq!(lane_policy(None, Some(cvbs)), (OutputLane::B, 1));
        assert_eq!(lane_policy(None, None), (OutputLane::A, 1));
    }

    #[test]
    fn test_power_up_stage_order() {
        let handle = SimLink::new();
        let mut link = handle.clone();
        power_up(&mut link, OutputLane::A, 2).unwrap();

        let tx = handle.writes_to(Map::TxA);
        assert_eq!(tx.first(), Some(&(csi::TX_CFG1, 0x82)));
        assert_eq!(tx[1], (csi::TX_CFG1, 0xA2));
        assert_eq!(tx.last(), Some(&(0x31, 0x80)));
        assert!(tx.contains(&(csi::TX_CFG1, 0x22)));
        assert_eq!(handle.get(Map::Io, io::CSI_PIX_EN_SEL), Some(0x81));

        assert_eq!(handle.sleeps(), vec![PLL_SETTLE, LANE_SETTLE, CAL_SETTLE]);
    }

    #[test]
    fn test_lane_b_routes_sd_through_pixel_port() {
        let handle = SimLink::new();
        let mut link = handle.clone();
        power_up(&mut link, OutputLane::B, 1).unwrap();

        assert_eq!(handle.get(Map::Io, io::CSI_PIX_EN_SEL), Some(0x51));
        assert!(handle.writes_to(Map::TxA).is_empty());
        assert_eq!(handle.get(Map::TxB, csi::TX_CFG1), Some(0x21));
    }
}
