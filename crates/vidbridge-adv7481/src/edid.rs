//! Default EDID and its upload to the receiver

use tracing::debug;
use vidbridge_core::Result;

use crate::link::{Map, RegisterLink};
use crate::mode::Sequence;
use crate::regs::hdmi;

pub const EDID_SIZE: usize = 256;
pub const BLOCK_SIZE: usize = 128;

/// Base block plus one CEA-861 extension
///
/// Advertises 1080p/720p/480p, LPCM/AC-3/DTS audio and an HDMI vendor block
/// with a 165 MHz TMDS ceiling.
pub const DEFAULT_EDID: [u8; EDID_SIZE] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x45, 0x23, 0xDD, 0xDD, 0x01, 0x01, 0x01, 0x01,
    0x01, 0x16, 0x01, 0x03, 0x80, 0x90, 0x51, 0x78, 0x0A, 0x0D, 0xC9, 0xA0, 0x57, 0x47, 0x98, 0x27,
    0x12, 0x48, 0x4C, 0x21, 0x08, 0x00, 0x81, 0x80, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01,
    0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x02, 0x3A, 0x80, 0x18, 0x71, 0x38, 0x2D, 0x40, 0x58, 0x2C,
    0x45, 0x00, 0xA0, 0x2A, 0x53, 0x00, 0x00, 0x1E, 0x01, 0x1D, 0x00, 0x72, 0x51, 0xD0, 0x1E, 0x20,
    0x6E, 0x28, 0x55, 0x00, 0xA0, 0x2A, 0x53, 0x00, 0x00, 0x1E, 0x00, 0x00, 0x00, 0xFD, 0x00, 0x3A,
    0x3E, 0x0F, 0x46, 0x0F, 0x00, 0x0A, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x00, 0x00, 0x00, 0xFC,
    0x00, 0x54, 0x56, 0x0A, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x01, 0x9A,
    0x02, 0x03, 0x37, 0xF0, 0x4A, 0x10, 0x04, 0x05, 0x03, 0x02, 0x07, 0x06, 0x20, 0x01, 0x3C, 0x29,
    0x09, 0x07, 0x07, 0x15, 0x07, 0x50, 0x3D, 0x07, 0x50, 0x83, 0x01, 0x00, 0x00, 0x76, 0x03, 0x0C,
    0x00, 0x30, 0x00, 0x80, 0x21, 0x2F, 0x88, 0x0C, 0x20, 0x90, 0x08, 0x10, 0x18, 0x10, 0x28, 0x10,
    0x78, 0x10, 0x06, 0x26, 0xE2, 0x00, 0x7B, 0x01, 0x1D, 0x80, 0x18, 0x71, 0x1C, 0x16, 0x20, 0x58,
    0x2C, 0x25, 0x00, 0xA0, 0x2A, 0x53, 0x00, 0x00, 0x9E, 0x8C, 0x0A, 0xD0, 0x8A, 0x20, 0xE0, 0x2D,
    0x10, 0x10, 0x3E, 0x96, 0x00, 0xA0, 0x2A, 0x53, 0x00, 0x00, 0x18, 0x8C, 0x0A, 0xD0, 0x8A, 0x20,
    0xE0, 0x2D, 0x10, 0x10, 0x3E, 0x96, 0x00, 0x38, 0x2A, 0x43, 0x00, 0x00, 0x18, 0x8C, 0x0A, 0xA0,
    0x14, 0x51, 0xF0, 0x16, 0x00, 0x26, 0x7C, 0x43, 0x00, 0x38, 0x2A, 0x43, 0x00, 0x00, 0x98, 0x38,
];

/// True when every 128-byte block sums to zero
pub fn checksum_ok(edid: &[u8]) -> bool {
    !edid.is_empty()
        && edid.len() % BLOCK_SIZE == 0
        && edid
            .chunks(BLOCK_SIZE)
            .all(|block| block.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)) == 0)
}

/// Write `edid` into the EDID map under manual control, then enable it on port A
pub fn upload<L: RegisterLink>(seq: &mut Sequence<'_, L>, edid: &[u8; EDID_SIZE]) {
    debug!("Uploading EDID");
    seq.write(Map::Hdmi, hdmi::EDID_MANUAL, 0x01);
    seq.write(Map::Hdmi, hdmi::EDID_AUTO_ENABLE, 0x08);
    // 256-byte primary EDID
    seq.write(Map::Hdmi, hdmi::EDID_SIZE, 0x80);

    for (i, byte) in edid.iter().enumerate() {
        seq.write(Map::Edid, i as u8, *byte);
    }

    seq.write(Map::Hdmi, hdmi::PORT_EDID_ENABLE, 0x01);
}

/// Upload the default table as a standalone sequence
pub fn upload_default<L: RegisterLink>(link: &mut L) -> Result<()> {
    let mut seq = Sequence::new(link);
    upload(&mut seq, &DEFAULT_EDID);
    seq.finish("edid upload")
}
