// SPDX-License-Identifier: MPL-2.0

//! Slot capabilities and configuration.

use core::time::Duration;

use bitflags::bitflags;
use int_to_c_enum::TryFromInt;

use crate::{
    dma::DmaMode,
    io::SdhcIo,
    regs::{Capabilities, Capabilities1, HostControl2, SdhcRegs},
};

/// Host controller specification version.
///
/// The numbering is one above the raw Specification Version Number field of
/// the Host Controller Version register.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, TryFromInt)]
pub enum SpecVersion {
    V1_00 = 1,
    V2_00 = 2,
    V3_00 = 3,
    V4_00 = 4,
    V4_10 = 5,
    V4_20 = 6,
}

impl SpecVersion {
    /// Decodes the Host Controller Version register.
    ///
    /// Versions newer than the last known one are treated as the last one.
    pub fn from_register(raw: u16) -> Self {
        let number = (raw & 0xFF) as u8;
        SpecVersion::try_from(number.saturating_add(1)).unwrap_or(SpecVersion::V4_20)
    }

    /// Whether Host Control 2 has the ADMA2 26-bit length mode bit.
    pub fn has_adma2_len_mode(self) -> bool {
        self >= SpecVersion::V4_10
    }

    /// Whether the controller can run ADMA3.
    pub fn has_adma3(self) -> bool {
        self >= SpecVersion::V4_20
    }
}

bitflags! {
    /// DMA engines implemented by the controller.
    pub struct DmaModes: u8 {
        const SDMA  = 1 << 0;
        const ADMA1 = 1 << 1;
        const ADMA2 = 1 << 2;
        const ADMA3 = 1 << 3;
    }
}

/// Hardware capabilities of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCaps {
    /// DMA engines the controller implements.
    pub modes: DmaModes,
    /// 64-bit system addressing is enabled.
    pub addr64: bool,
    /// Host version 4 mode is enabled.
    pub v4_mode: bool,
    /// Specification version of the controller.
    pub version: SpecVersion,
}

impl SlotCaps {
    /// Reads the capabilities from the controller registers.
    ///
    /// 64-bit addressing is reported only when the controller supports it
    /// and Host Control 2 has it enabled.
    pub fn from_registers<I: SdhcIo>(io: &I) -> Self {
        let caps = Capabilities::from_bits_truncate(io.read_u32(SdhcRegs::Capabilities));
        let caps1 = Capabilities1::from_bits_truncate(io.read_u32(SdhcRegs::Capabilities1));
        let ctrl2 = HostControl2::from_bits_truncate(io.read_u16(SdhcRegs::HostControl2));
        let version = SpecVersion::from_register(io.read_u16(SdhcRegs::HostVersion));
        let v4_mode = version >= SpecVersion::V4_00 && ctrl2.contains(HostControl2::HOST_V4_ENABLE);

        let mut modes = DmaModes::empty();
        modes.set(DmaModes::SDMA, caps.contains(Capabilities::SDMA));
        modes.set(DmaModes::ADMA1, caps.contains(Capabilities::ADMA1));
        modes.set(DmaModes::ADMA2, caps.contains(Capabilities::ADMA2));
        modes.set(DmaModes::ADMA3, caps1.contains(Capabilities1::ADMA3));

        let addr64_supported = if v4_mode {
            caps.contains(Capabilities::SYS_ADDR_64_V4)
        } else {
            caps.contains(Capabilities::SYS_ADDR_64_V3)
        };
        let addr64 = addr64_supported && (!v4_mode || ctrl2.contains(HostControl2::ADDRESSING_64));

        Self {
            modes,
            addr64,
            v4_mode,
            version,
        }
    }

    /// Returns the alignment required of DMA addresses.
    pub fn dma_alignment(&self) -> u64 {
        if self.addr64 { 8 } else { 4 }
    }
}

/// How a slot picks its DMA mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DmaPolicy {
    /// Pick the most capable mode per request.
    #[default]
    Auto,
    /// Always use the given mode.
    Pinned(DmaMode),
}

/// Software configuration of a slot.
#[derive(Debug, Clone, Copy)]
pub struct SlotConfig {
    pub dma_policy: DmaPolicy,
    /// Upper bound on the wait for a transfer to complete.
    pub completion_timeout: Duration,
    /// Delay between two reads of the interrupt status register.
    pub poll_interval: Duration,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            dma_policy: DmaPolicy::Auto,
            completion_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_micros(10),
        }
    }
}
