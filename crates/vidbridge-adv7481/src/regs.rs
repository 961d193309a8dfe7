//! Register addresses and typed bit fields of the ADV7481 maps

/// A contiguous bit field within an 8-bit register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub shift: u8,
    pub width: u8,
}

impl Field {
    pub const fn bit(n: u8) -> Self {
        Self { shift: n, width: 1 }
    }

    /// Bits `hi..=lo`
    pub const fn bits(hi: u8, lo: u8) -> Self {
        Self {
            shift: lo,
            width: hi - lo + 1,
        }
    }

    pub const fn mask(self) -> u8 {
        (((1u16 << self.width) - 1) << self.shift) as u8
    }

    pub const fn decode(self, reg: u8) -> u8 {
        (reg & self.mask()) >> self.shift
    }

    /// Place `value` in the field; bits beyond the width are dropped
    pub const fn encode(self, value: u8) -> u8 {
        (value << self.shift) & self.mask()
    }

    pub const fn is_set(self, reg: u8) -> bool {
        self.decode(reg) != 0
    }

    /// Replace the field in `reg`, keeping the other bits
    pub const fn update(self, reg: u8, value: u8) -> u8 {
        (reg & !self.mask()) | self.encode(value)
    }
}

/// Combine a masked high register with a full low register
pub fn join(hi: Field, hi_reg: u8, lo_reg: u8) -> u32 {
    (u32::from(hi.decode(hi_reg)) << 8) | u32::from(lo_reg)
}

pub mod io {
    use super::Field;

    pub const PWR_DOWN_CTRL: u8 = 0x00;
    pub const RX_EN: Field = Field::bit(6);
    pub const RX_PWDN: Field = Field::bit(5);
    pub const XTAL_PWDN: Field = Field::bit(2);
    pub const CORE_PWDN: Field = Field::bit(1);
    pub const MASTER_PWDN: Field = Field::bit(0);

    /// Output-A source select, ORed into `PWR_DOWN_CTRL`
    pub const SOURCE_SD: u8 = 0x10;
    pub const SOURCE_CP: u8 = 0x00;

    pub const PWR_DN2_XTAL_HIGH: u8 = 0x01;
    pub const CP_VID_STD: u8 = 0x05;

    pub const CSI_PIX_EN_SEL: u8 = 0x10;
    pub const CSI4_EN: Field = Field::bit(7);
    pub const CSI1_EN: Field = Field::bit(6);
    pub const SD_THRU_PIX_OUT: Field = Field::bit(4);
    /// Source of the 4-lane transmitter: 0 = CP core, 1 = SD core
    pub const CSI4_IN_SEL: Field = Field::bits(3, 2);
    pub const PIX_OUT_EN: Field = Field::bit(0);

    pub const RAW_STATUS_3: u8 = 0x71;
    pub const DE_REGEN_LOCKED_RAW: Field = Field::bit(0);

    pub const I2C_CFG: u8 = 0xF2;
    pub const I2C_AUTOINC_EN: u8 = 0x01;

    pub const DPLL_ADDR: u8 = 0xF3;
    pub const CP_ADDR: u8 = 0xF4;
    pub const HDMI_ADDR: u8 = 0xF5;
    pub const EDID_ADDR: u8 = 0xF6;
    pub const REP_ADDR: u8 = 0xF7;
    pub const INF_ADDR: u8 = 0xF8;
    pub const CBUS_ADDR: u8 = 0xF9;
    pub const CEC_ADDR: u8 = 0xFA;
    pub const SDP_ADDR: u8 = 0xFB;
    pub const TXB_ADDR: u8 = 0xFC;
    pub const TXA_ADDR: u8 = 0xFD;

    pub const RESET: u8 = 0xFF;
    pub const MAIN_RESET: u8 = 0xFF;
}

pub mod hdmi {
    use super::Field;

    pub const PARAM4: u8 = 0x04;
    pub const TMDS_PLL_LOCKED: Field = Field::bit(1);

    pub const PARAM5: u8 = 0x05;
    pub const PIXEL_REPETITION: Field = Field::bits(3, 0);
    pub const INTERLACED: Field = Field::bit(4);

    pub const LINE_WIDTH_1: u8 = 0x07;
    pub const VERT_FILTER_LOCKED: Field = Field::bit(7);
    pub const DE_REGEN_FILTER_LOCKED: Field = Field::bit(5);
    pub const LINE_WIDTH_HI: Field = Field::bits(4, 0);
    pub const LINE_WIDTH_2: u8 = 0x08;

    pub const FIELD0_HEIGHT_1: u8 = 0x09;
    pub const FIELD0_HEIGHT_HI: Field = Field::bits(4, 0);
    pub const FIELD0_HEIGHT_2: u8 = 0x0A;

    pub const FIELD1_HEIGHT_1: u8 = 0x0B;
    pub const DEEP_COLOR_MODE: Field = Field::bits(7, 6);

    pub const TOTAL_LINE_WIDTH_1: u8 = 0x1E;
    pub const TOTAL_LINE_WIDTH_HI: Field = Field::bits(5, 0);
    pub const TOTAL_LINE_WIDTH_2: u8 = 0x1F;

    pub const FIELD0_TOTAL_HEIGHT_1: u8 = 0x26;
    pub const FIELD0_TOTAL_HEIGHT_HI: Field = Field::bits(5, 0);
    pub const FIELD0_TOTAL_HEIGHT_2: u8 = 0x27;

    /// TMDS frequency bits 8:1, in MHz
    pub const TMDS_FREQ: u8 = 0x51;
    pub const TMDS_FREQ_FRAC: u8 = 0x52;
    pub const TMDS_FREQ_LSB: Field = Field::bit(7);
    /// Fraction in 1/128 MHz
    pub const TMDS_FREQ_FRAC_BITS: Field = Field::bits(6, 0);

    pub const PORT_EDID_ENABLE: u8 = 0x07;
    pub const EDID_SIZE: u8 = 0x70;
    pub const EDID_MANUAL: u8 = 0x74;
    pub const EDID_AUTO_ENABLE: u8 = 0x7A;
}

pub mod csi {
    use super::Field;

    pub const TX_CFG1: u8 = 0x00;
    pub const TX_PWRDN: Field = Field::bit(7);
    pub const AUTO_PARAMS: Field = Field::bit(5);
    pub const NUM_LANES: Field = Field::bits(2, 0);
}

pub mod sdp {
    use super::Field;

    pub const INPUT_MUX: u8 = 0x00;

    pub const STATUS1: u8 = 0x10;
    pub const IN_LOCK: Field = Field::bit(0);
    pub const AD_RESULT: Field = Field::bits(7, 4);

    pub const AUTODETECT: u8 = 0x0E;
}

pub mod cp {
    use super::Field;

    pub const CONTRAST: u8 = 0x3A;
    pub const SATURATION: u8 = 0x3B;
    pub const BRIGHTNESS: u8 = 0x3C;
    pub const HUE: u8 = 0x3D;
    pub const VID_ADJ: u8 = 0x3E;
    pub const VID_ADJ_EN: Field = Field::bit(7);
}
