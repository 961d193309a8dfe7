//! Routing state: output-lane bindings, active mode and stream control

use tracing::{debug, info};
use vidbridge_core::{BridgeError, OutputLane, Result, RoutingSnapshot};

use crate::csi;
use crate::link::{Map, RegisterLink};
use crate::mode::{self, Adv7481Input, Sequence};
use crate::regs::io;

/// Per-device routing record, mutated only under the device guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingState {
    pub powered: bool,
    pub lane_a: Option<Adv7481Input>,
    pub lane_b: Option<Adv7481Input>,
    /// Programmed mode, `None` until the first successful route
    pub mode: Option<Adv7481Input>,
    pub lanes: u8,
    /// Transmitter brought up by the last stream start
    pub streaming: Option<OutputLane>,
}

impl Default for RoutingState {
    fn default() -> Self {
        Self {
            powered: false,
            lane_a: None,
            lane_b: None,
            mode: None,
            lanes: 1,
            streaming: None,
        }
    }
}

impl RoutingState {
    /// Reject disallowed combinations before any register access
    pub fn validate(&self, output: OutputLane, input: Adv7481Input) -> Result<()> {
        if output == OutputLane::B && matches!(input, Adv7481Input::Hdmi | Adv7481Input::Ttl) {
            return Err(BridgeError::invalid(format!("output b cannot carry {}", input)));
        }
        if !input.is_programmable() {
            return Err(BridgeError::invalid(format!("{} cannot be selected as a mode", input)));
        }
        Ok(())
    }

    /// Bind `input` to `output`, programming the front end when the mode changes
    ///
    /// The binding is recorded even if a register write fails; the mode is
    /// updated only when programming succeeds.
    pub fn route<L: RegisterLink>(
        &mut self,
        link: &mut L,
        output: OutputLane,
        input: Adv7481Input,
    ) -> Result<()> {
        self.validate(output, input)?;

        let select = match output {
            OutputLane::A => {
                let source = if input.has_hdmi() { io::SOURCE_CP } else { io::SOURCE_SD };
                let mut seq = Sequence::new(link);
                seq.update(Map::Io, io::PWR_DOWN_CTRL, |v| v | source);
                self.lane_a = Some(input);
                seq.finish("source select")
            }
            OutputLane::B => {
                self.lane_b = Some(input);
                Ok(())
            }
        };
        info!(output = %output, input = %input, "Routed");

        let programmed = if self.mode == Some(input) {
            debug!(mode = %input, "Mode unchanged");
            Ok(())
        } else {
            mode::program(link, input).map(|()| self.mode = Some(input))
        };

        select.and(programmed)
    }

    /// Start or stop the transmitter chosen by the lane policy
    pub fn set_stream<L: RegisterLink>(&mut self, link: &mut L, on: bool) -> Result<()> {
        if !on {
            return match self.streaming.take() {
                Some(lane) => csi::power_down(link, lane, self.lanes),
                None => Ok(()),
            };
        }

        let (lane, lanes) = csi::lane_policy(self.lane_a, self.lane_b);
        self.lanes = lanes;
        self.streaming = Some(lane);
        info!(lane = %lane, lanes, "Starting stream");
        csi::power_up(link, lane, lanes)
    }

    pub fn snapshot(&self) -> RoutingSnapshot {
        RoutingSnapshot {
            powered: self.powered,
            mode: self.mode.map(|m| m.to_string()),
            lane_a: self.lane_a.map(|m| m.to_string()),
            lane_b: self.lane_b.map(|m| m.to_string()),
            lanes: self.lanes,
        }
    }
}
