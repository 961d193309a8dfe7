//! vidbridge core - bridge-agnostic types, input registry and control surface
//!
//! This crate provides the layer above individual bridge chips:
//! - The `BridgeDevice` capability trait implemented by chip drivers
//! - A catalogue of logical inputs and the device families that back them
//! - The input registry and its owning `BridgeContext`
//! - Addressable per-input controls (node address, frame rate)

pub mod bridge;
pub mod catalogue;
pub mod context;
pub mod controls;
pub mod error;
pub mod input;
pub mod registry;

pub use bridge::{
    BridgeDevice, ColorDepth, Colorspace, FrameInterval, InputStatus, MbusFormat, PictureControl,
    PixelCode, RoutingSnapshot, TimingSnapshot, VideoStandard,
};
pub use catalogue::{Catalogue, CatalogueRow};
pub use context::BridgeContext;
pub use controls::{frac_to_q16, ControlId, ControlInfo, ControlValue};
pub use error::{BridgeError, Result};
pub use input::{BridgeInput, InputCategory, InputId, OutputLane};
pub use registry::{InputInfo, InputRegistry, LogicalInput};
