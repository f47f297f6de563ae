// SPDX-License-Identifier: MPL-2.0

//! SD Host Controller register definitions.
//!
//! Refer to SD Host Controller Simplified Specification Version 4.20,
//! Section 2.2 (SD Host Standard Register).

use bitflags::bitflags;

/// Standard registers used by the DMA core, with their byte offsets.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum SdhcRegs {
    /// SDMA System Address / Argument 2 (32-bit). Holds the 32-bit block
    /// count in version 4 mode.
    SdmaAddress = 0x00,
    /// Block Size (16-bit).
    BlockSize = 0x04,
    /// 16-bit Block Count (16-bit).
    BlockCount = 0x06,
    /// Argument (32-bit).
    Argument = 0x08,
    /// Transfer Mode (16-bit).
    TransferMode = 0x0C,
    /// Command (16-bit).
    Command = 0x0E,
    /// Present State (32-bit).
    PresentState = 0x24,
    /// Host Control 1 (8-bit), carries the DMA select field.
    HostControl1 = 0x28,
    /// Normal Interrupt Status (16-bit), error status in the upper half
    /// when read as 32 bits.
    NormalIrqStatus = 0x30,
    /// Error Interrupt Status (16-bit).
    ErrorIrqStatus = 0x32,
    /// Host Control 2 (16-bit).
    HostControl2 = 0x3E,
    /// Capabilities, bits 31:0.
    Capabilities = 0x40,
    /// Capabilities, bits 63:32.
    Capabilities1 = 0x44,
    /// ADMA Error Status (8-bit).
    AdmaErrorStatus = 0x54,
    /// ADMA System Address, bits 31:0.
    AdmaAddressLow = 0x58,
    /// ADMA System Address, bits 63:32.
    AdmaAddressHigh = 0x5C,
    /// ADMA3 Integrated Descriptor Address, bits 31:0.
    Adma3IdAddressLow = 0x78,
    /// ADMA3 Integrated Descriptor Address, bits 63:32.
    Adma3IdAddressHigh = 0x7C,
    /// Host Controller Version (16-bit).
    HostVersion = 0xFE,
}

impl SdhcRegs {
    /// Returns the byte offset from the register base.
    pub const fn offset(self) -> u16 {
        self as u16
    }
}

bitflags! {
    /// Normal Interrupt Status register (offset 0x30).
    pub struct NormalIrq: u16 {
        const CMD_COMPLETE  = 1 << 0;
        const XFER_COMPLETE = 1 << 1;
        const BLOCK_GAP     = 1 << 2;
        const DMA           = 1 << 3;
        const BUF_WRITE     = 1 << 4;
        const BUF_READ      = 1 << 5;
        const CARD_INSERT   = 1 << 6;
        const CARD_REMOVE   = 1 << 7;
        const CARD          = 1 << 8;
        const CQE           = 1 << 14;
        /// Summary bit, set when any error status bit is set.
        const ERROR         = 1 << 15;
    }
}

bitflags! {
    /// Error Interrupt Status register (offset 0x32).
    pub struct ErrorIrq: u16 {
        const CMD_TIMEOUT   = 1 << 0;
        const CMD_CRC       = 1 << 1;
        const CMD_END_BIT   = 1 << 2;
        const CMD_INDEX     = 1 << 3;
        const DATA_TIMEOUT  = 1 << 4;
        const DATA_CRC      = 1 << 5;
        const DATA_END_BIT  = 1 << 6;
        const CURRENT_LIMIT = 1 << 7;
        const AUTO_CMD      = 1 << 8;
        const ADMA          = 1 << 9;
        const TUNING        = 1 << 10;
        const RESPONSE      = 1 << 11;
    }
}

/// Splits a 32-bit read of the interrupt status register into its normal
/// and error halves.
pub fn split_irq_status(raw: u32) -> (NormalIrq, ErrorIrq) {
    (
        NormalIrq::from_bits_truncate(raw as u16),
        ErrorIrq::from_bits_truncate((raw >> 16) as u16),
    )
}

/// Host Control 1 DMA select field, bits 4:3.
pub mod dma_select {
    pub const MASK: u8 = 0x18;
    pub const SDMA: u8 = 0x00;
    pub const ADMA1: u8 = 0x08;
    pub const ADMA2_32: u8 = 0x10;
    /// 64-bit ADMA2 in version 3 mode. ADMA2 or ADMA3 in version 4 mode.
    pub const ADMA2_64_OR_ADMA3: u8 = 0x18;
}

bitflags! {
    /// Host Control 2 register (offset 0x3E), the bits this core touches.
    pub struct HostControl2: u16 {
        /// ADMA2 26-bit data length mode.
        const ADMA2_LEN_MODE  = 1 << 10;
        const CMD23_ENABLE    = 1 << 11;
        const HOST_V4_ENABLE  = 1 << 12;
        const ADDRESSING_64   = 1 << 13;
        const ASYNC_IRQ       = 1 << 14;
        const PRESET_VALUE    = 1 << 15;
    }
}

bitflags! {
    /// Capabilities register, bits 31:0 (offset 0x40).
    pub struct Capabilities: u32 {
        const ADMA2          = 1 << 19;
        const ADMA1          = 1 << 20;
        const SDMA           = 1 << 22;
        const SYS_ADDR_64_V4 = 1 << 27;
        const SYS_ADDR_64_V3 = 1 << 28;
    }
}

bitflags! {
    /// Capabilities register, bits 63:32 (offset 0x44).
    pub struct Capabilities1: u32 {
        const ADMA3 = 1 << 27;
    }
}

bitflags! {
    /// Transfer Mode register (offset 0x0C).
    pub struct TransferMode: u16 {
        const DMA              = 1 << 0;
        const BLOCK_COUNT      = 1 << 1;
        const AUTO_CMD12       = 1 << 2;
        const AUTO_CMD23       = 1 << 3;
        const READ             = 1 << 4;
        const MULTI_BLOCK      = 1 << 5;
        /// Response type R5 (SDIO) instead of R1 (memory).
        const RESP_R5          = 1 << 6;
        const RESP_ERR_CHECK   = 1 << 7;
        const RESP_IRQ_DISABLE = 1 << 8;
    }
}

bitflags! {
    /// Flag half of the Command register (offset 0x0E), bits 5:0.
    pub struct CommandFlags: u8 {
        const RESP_LONG       = 0x01;
        const RESP_SHORT      = 0x02;
        const RESP_SHORT_BUSY = 0x03;
        const CRC_CHECK       = 0x08;
        const INDEX_CHECK     = 0x10;
        const DATA_PRESENT    = 0x20;
    }
}

/// Composes the Command register from a command index and its flags.
pub fn make_command(index: u8, flags: CommandFlags) -> u16 {
    ((u16::from(index) & 0x3F) << 8) | u16::from(flags.bits())
}

/// Composes the 32-bit value covering Transfer Mode (low half) and
/// Command (high half).
pub fn make_xfer_command(command: u16, mode: TransferMode) -> u32 {
    (u32::from(command) << 16) | u32::from(mode.bits())
}
