//! ADV7481 video bridge driver
//!
//! Front-end mode programming, CSI output lanes, routing state and
//! timing/lock polling over a synchronous register link. The device
//! implements `vidbridge_core::BridgeDevice`.

pub mod csi;
pub mod device;
pub mod edid;
pub mod link;
pub mod mode;
pub mod regs;
pub mod routing;
pub mod sim;
pub mod timing;

pub use device::Adv7481;
pub use link::{I2cLink, LinkError, Map, MapAddresses, RegisterLink, SETTLE_DELAY};
pub use mode::{Adv7481Input, Channel};
pub use routing::RoutingState;
pub use sim::{SimHdmiSignal, SimLink};
pub use timing::PollBudget;
