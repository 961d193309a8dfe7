//! Register link: byte read/write on the chip's sub-block maps
//!
//! Every transaction is followed by a settle delay, which is part of
//! the link's contract rather than something callers insert.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;
use vidbridge_core::BridgeError;

/// Delay after every register transaction
pub const SETTLE_DELAY: Duration = Duration::from_micros(100);

/// Independently addressable register map of the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Map {
    Io,
    Dpll,
    Cp,
    Hdmi,
    Edid,
    Repeater,
    Infoframe,
    Cbus,
    Cec,
    Sdp,
    TxB,
    TxA,
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Io => "io",
            Self::Dpll => "dpll",
            Self::Cp => "cp",
            Self::Hdmi => "hdmi",
            Self::Edid => "edid",
            Self::Repeater => "rep",
            Self::Infoframe => "inf",
            Self::Cbus => "cbus",
            Self::Cec => "cec",
            Self::Sdp => "sdp",
            Self::TxB => "txb",
            Self::TxA => "txa",
        };
        f.write_str(s)
    }
}

/// 7-bit bus addresses of every map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapAddresses {
    pub io: u8,
    pub dpll: u8,
    pub cp: u8,
    pub hdmi: u8,
    pub edid: u8,
    pub repeater: u8,
    pub infoframe: u8,
    pub cbus: u8,
    pub cec: u8,
    pub sdp: u8,
    pub txb: u8,
    pub txa: u8,
}

impl Default for MapAddresses {
    fn default() -> Self {
        Self {
            io: 0x70,
            dpll: 0x26,
            cp: 0x22,
            hdmi: 0x3A,
            edid: 0x3C,
            repeater: 0x32,
            infoframe: 0x31,
            cbus: 0x78,
            cec: 0x41,
            sdp: 0x79,
            txb: 0x48,
            txa: 0x4A,
        }
    }
}

impl MapAddresses {
    pub fn of(&self, map: Map) -> u8 {
        match map {
            Map::Io => self.io,
            Map::Dpll => self.dpll,
            Map::Cp => self.cp,
            Map::Hdmi => self.hdmi,
            Map::Edid => self.edid,
            Map::Repeater => self.repeater,
            Map::Infoframe => self.infoframe,
            Map::Cbus => self.cbus,
            Map::Cec => self.cec,
            Map::Sdp => self.sdp,
            Map::TxB => self.txb,
            Map::TxA => self.txa,
        }
    }
}

/// A failed bus transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("read {map}[{reg:#04x}] failed: {reason}")]
    Read { map: Map, reg: u8, reason: String },
    #[error("write {map}[{reg:#04x}] failed: {reason}")]
    Write { map: Map, reg: u8, reason: String },
}

impl From<LinkError> for BridgeError {
    fn from(e: LinkError) -> Self {
        BridgeError::Transport(e.to_string())
    }
}

/// Synchronous register access to one chip
pub trait RegisterLink: Send {
    fn read(&mut self, map: Map, reg: u8) -> Result<u8, LinkError>;

    fn write(&mut self, map: Map, reg: u8, value: u8) -> Result<(), LinkError>;

    /// Block the calling thread
    fn sleep(&mut self, duration: Duration);

    /// Sleep for a bounded interval in `[min, max]`
    ///
    /// The default waits for the lower bound.
    fn sleep_range(&mut self, min: Duration, max: Duration) {
        let _ = max;
        self.sleep(min);
    }
}

/// Register link over an `embedded-hal` I2C bus
pub struct I2cLink<I2C, D> {
    i2c: I2C,
    delay: D,
    addresses: MapAddresses,
    settle: Duration,
}

impl<I2C, D> I2cLink<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D, addresses: MapAddresses) -> Self {
        Self {
            i2c,
            delay,
            addresses,
            settle: SETTLE_DELAY,
        }
    }

    /// Override the per-transaction settle delay
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn addresses(&self) -> &MapAddresses {
        &self.addresses
    }

    /// Release the bus and delay provider
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn settle(&mut self) {
        let us = u32::try_from(self.settle.as_micros()).unwrap_or(u32::MAX);
        self.delay.delay_us(us);
    }
}

impl<I2C, D> RegisterLink for I2cLink<I2C, D>
where
    I2C: I2c + Send,
    D: DelayNs + Send,
{
    fn read(&mut self, map: Map, reg: u8) -> Result<u8, LinkError> {
        let address = self.addresses.of(map);
        let mut buf = [0u8; 1];
        let result = self.i2c.write_read(address, &[reg], &mut buf);
        self.settle();

        result.map_err(|e| LinkError::Read {
            map,
            reg,
            reason: format!("{:?}", e.kind()),
        })?;
        trace!(map = %map, reg = format_args!("{:#04x}", reg), value = format_args!("{:#04x}", buf[0]), "rd");
        Ok(buf[0])
    }

    fn write(&mut self, map: Map, reg: u8, value: u8) -> Result<(), LinkError> {
        let address = self.addresses.of(map);
        let result = self.i2c.write(address, &[reg, value]);
        self.settle();

        result.map_err(|e| LinkError::Write {
            map,
            reg,
            reason: format!("{:?}", e.kind()),
        })?;
        trace!(map = %map, reg = format_args!("{:#04x}", reg), value = format_args!("{:#04x}", value), "wr");
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) {
        let us = u32::try_from(duration.as_micros()).unwrap_or(u32::MAX);
        self.delay.delay_us(us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    #[derive(Default)]
    struct Bus {
        ops: Vec<(u8, Vec<u8>)>,
        nack: bool,
        reply: u8,
    }

    #[derive(Debug)]
    struct Nack;

    impl embedded_hal::i2c::Error for Nack {
        fn kind(&self) -> ErrorKind {
            ErrorKind::NoAcknowledge(embedded_hal::i2c::NoAcknowledgeSource::Address)
        }
    }

    impl ErrorType for Bus {
        type Error = Nack;
    }

    impl I2c for Bus {
        fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Nack> {
            if self.nack {
                return Err(Nack);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.ops.push((address, bytes.to_vec())),
                    Operation::Read(buf) => buf.fill(self.reply),
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Clock {
        total_ns: u64,
    }

    impl DelayNs for Clock {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    #[test]
    fn test_write_targets_map_address() {
        let mut link = I2cLink::new(Bus::default(), Clock::default(), MapAddresses::default());
        link.write(Map::Hdmi, 0x07, 0x01).unwrap();
        link.write(Map::TxA, 0x00, 0x81).unwrap();

        let (bus, clock) = link.release();
        assert_eq!(bus.ops, vec![(0x3A, vec![0x07, 0x01]), (0x4A, vec![0x00, 0x81])]);
        assert_eq!(clock.total_ns, 2 * 100_000);
    }

    #[test]
    fn test_read_returns_byte() {
        let bus = Bus {
            reply: 0x5A,
            ..Default::default()
        };
        let mut link = I2cLink::new(bus, Clock::default(), MapAddresses::default());
        assert_eq!(link.read(Map::Sdp, 0x10).unwrap(), 0x5A);
    }

    #[test]
    fn test_nack_is_link_error() {
        let bus = Bus {
            nack: true,
            ..Default::default()
        };
        let mut link = I2cLink::new(bus, Clock::default(), MapAddresses::default());
        let err = link.write(Map::Io, 0xFF, 0xFF).unwrap_err();
        assert!(matches!(err, LinkError::Write { map: Map::Io, reg: 0xFF, .. }));
        assert!(matches!(BridgeError::from(err), BridgeError::Transport(_)));

        // Settle delay still applies
        let (_, clock) = link.release();
        assert_eq!(clock.total_ns, 100_000);
    }
}
