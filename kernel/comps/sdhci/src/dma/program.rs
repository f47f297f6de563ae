// SPDX-License-Identifier: MPL-2.0

//! DMA engine address and mode-select programming.

use super::{DmaMode, desc::LengthMode};
use crate::{
    caps::SlotCaps,
    io::SdhcIo,
    prelude::*,
    regs::{HostControl2, SdhcRegs, dma_select},
};

/// Checks that `daddr` can be handed to the DMA engine.
pub fn validate_address(daddr: u64, caps: &SlotCaps) -> Result<()> {
    if daddr == 0 {
        return_errno_with_msg!(InvalidArgs, "null DMA address");
    }
    if daddr % caps.dma_alignment() != 0 {
        return_errno_with_msg!(InvalidArgs, "misaligned DMA address");
    }
    if !caps.addr64 && daddr > u64::from(u32::MAX) {
        return_errno_with_msg!(InvalidArgs, "DMA address above 4 GiB");
    }
    Ok(())
}

/// Writes the SDMA system address.
pub fn program_sdma<I: SdhcIo>(io: &mut I, daddr: u64, caps: &SlotCaps) -> Result<()> {
    validate_address(daddr, caps)?;
    let Ok(low) = u32::try_from(daddr) else {
        return_errno_with_msg!(InvalidArgs, "SDMA address above 4 GiB");
    };
    io.write_u32(SdhcRegs::SdmaAddress, low);
    Ok(())
}

fn write_pair<I: SdhcIo>(io: &mut I, low: SdhcRegs, high: SdhcRegs, daddr: u64, caps: &SlotCaps) {
    io.write_u32(low, daddr as u32);
    if caps.addr64 {
        io.write_u32(high, (daddr >> 32) as u32);
    }
}

/// Writes the address of an ADMA1/ADMA2 descriptor table.
pub fn program_adma<I: SdhcIo>(io: &mut I, table: u64, caps: &SlotCaps) -> Result<()> {
    validate_address(table, caps)?;
    write_pair(io, SdhcRegs::AdmaAddressLow, SdhcRegs::AdmaAddressHigh, table, caps);
    Ok(())
}

/// Writes the address of an ADMA3 integrated descriptor table.
pub fn program_adma3<I: SdhcIo>(io: &mut I, table: u64, caps: &SlotCaps) -> Result<()> {
    validate_address(table, caps)?;
    write_pair(
        io,
        SdhcRegs::Adma3IdAddressLow,
        SdhcRegs::Adma3IdAddressHigh,
        table,
        caps,
    );
    Ok(())
}

/// Returns the DMA-select field of Host Control 1 for `mode`.
pub fn dma_select_bits(mode: DmaMode, caps: &SlotCaps) -> Result<u8> {
    let bits = match mode {
        DmaMode::Sdma => dma_select::SDMA,
        DmaMode::Adma1 => dma_select::ADMA1,
        DmaMode::Adma2 if caps.addr64 && !caps.v4_mode => dma_select::ADMA2_64_OR_ADMA3,
        DmaMode::Adma2 => dma_select::ADMA2_32,
        DmaMode::Adma3 => dma_select::ADMA2_64_OR_ADMA3,
        DmaMode::None => return_errno_with_msg!(InvalidArgs, "no DMA engine to select"),
    };
    Ok(bits)
}

/// Points the DMA-select field of Host Control 1 at the engine of `mode`.
pub fn select_engine<I: SdhcIo>(io: &mut I, mode: DmaMode, caps: &SlotCaps) -> Result<()> {
    let bits = dma_select_bits(mode, caps)?;
    let ctrl = io.read_u8(SdhcRegs::HostControl1);
    io.write_u8(SdhcRegs::HostControl1, (ctrl & !dma_select::MASK) | bits);
    Ok(())
}

/// Programs the ADMA2 length mode of Host Control 2 once at slot set-up and
/// returns the mode descriptors must be encoded with.
pub fn configure_length_mode<I: SdhcIo>(io: &mut I, caps: &SlotCaps) -> LengthMode {
    let len_mode = LengthMode::for_caps(caps);
    if caps.version.has_adma2_len_mode() {
        let mut ctrl2 = HostControl2::from_bits_truncate(io.read_u16(SdhcRegs::HostControl2));
        ctrl2.set(HostControl2::ADMA2_LEN_MODE, len_mode == LengthMode::Bits26);
        io.write_u16(SdhcRegs::HostControl2, ctrl2.bits());
    }
    len_mode
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        caps::{DmaModes, SpecVersion},
        test_util::{MockIo, RegWrite},
    };

    fn caps(addr64: bool, v4_mode: bool, version: SpecVersion) -> SlotCaps {
        SlotCaps {
            modes: DmaModes::all(),
            addr64,
            v4_mode,
            version,
        }
    }

    #[test]
    fn address_validation() {
        let c32 = caps(false, false, SpecVersion::V3_00);
        let c64 = caps(true, true, SpecVersion::V4_20);
        assert_eq!(validate_address(0, &c32).unwrap_err().errno(), InvalidArgs);
        assert!(validate_address(0x1004, &c32).is_ok());
        assert_eq!(validate_address(0x1004, &c64).unwrap_err().errno(), InvalidArgs);
        assert_eq!(validate_address(0x1002, &c32).unwrap_err().errno(), InvalidArgs);
        assert_eq!(
            validate_address(0x1_0000_0000, &c32).unwrap_err().errno(),
            InvalidArgs
        );
        assert!(validate_address(0x1_0000_0000, &c64).is_ok());
    }

    #[test]
    fn sdma_rejects_high_address() {
        let mut io = MockIo::new();
        let c64 = caps(true, true, SpecVersion::V4_20);
        let err = program_sdma(&mut io, 0x1_0000_0000, &c64).unwrap_err();
        assert_eq!(err.errno(), InvalidArgs);
        assert!(io.writes().is_empty());

        program_sdma(&mut io, 0x8000_0000, &c64).unwrap();
        assert_eq!(io.writes(), &[RegWrite::U32(0x00, 0x8000_0000)]);
    }

    #[test]
    fn adma_address_pairs() {
        let mut io = MockIo::new();
        program_adma(&mut io, 0x2_4000_0000, &caps(true, false, SpecVersion::V3_00)).unwrap();
        program_adma3(&mut io, 0x3_0000_1000, &caps(true, true, SpecVersion::V4_20)).unwrap();
        program_adma(&mut io, 0x4000_0000, &caps(false, false, SpecVersion::V3_00)).unwrap();
        assert_eq!(
            io.writes(),
            &[
                RegWrite::U32(0x58, 0x4000_0000),
                RegWrite::U32(0x5C, 0x2),
                RegWrite::U32(0x78, 0x0000_1000),
                RegWrite::U32(0x7C, 0x3),
                RegWrite::U32(0x58, 0x4000_0000),
            ]
        );
    }

    #[test]
    fn dma_select_field() {
        let v3_64 = caps(true, false, SpecVersion::V3_00);
        let v4_64 = caps(true, true, SpecVersion::V4_20);
        let v3_32 = caps(false, false, SpecVersion::V3_00);
        assert_eq!(dma_select_bits(DmaMode::Sdma, &v3_32).unwrap(), 0x00);
        assert_eq!(dma_select_bits(DmaMode::Adma1, &v3_32).unwrap(), 0x08);
        assert_eq!(dma_select_bits(DmaMode::Adma2, &v3_32).unwrap(), 0x10);
        assert_eq!(dma_select_bits(DmaMode::Adma2, &v3_64).unwrap(), 0x18);
        assert_eq!(dma_select_bits(DmaMode::Adma2, &v4_64).unwrap(), 0x10);
        assert_eq!(dma_select_bits(DmaMode::Adma3, &v4_64).unwrap(), 0x18);
        assert!(dma_select_bits(DmaMode::None, &v3_32).is_err());
    }

    #[test]
    fn select_engine_clears_previous_selection() {
        let mut io = MockIo::new();
        io.set_u8(SdhcRegs::HostControl1, 0x1F);
        select_engine(&mut io, DmaMode::Adma1, &caps(false, false, SpecVersion::V3_00)).unwrap();
        assert_eq!(io.get_u8(SdhcRegs::HostControl1), 0x0F);
        select_engine(&mut io, DmaMode::Sdma, &caps(false, false, SpecVersion::V3_00)).unwrap();
        assert_eq!(io.get_u8(SdhcRegs::HostControl1), 0x07);
    }

    #[test]
    fn length_mode_configuration() {
        let mut io = MockIo::new();
        io.set_u16(SdhcRegs::HostControl2, HostControl2::HOST_V4_ENABLE.bits());
        let mode = configure_length_mode(&mut io, &caps(true, true, SpecVersion::V4_10));
        assert_eq!(mode, LengthMode::Bits26);
        assert_eq!(io.get_u16(SdhcRegs::HostControl2), 0x1400);

        let mut io = MockIo::new();
        let mode = configure_length_mode(&mut io, &caps(false, false, SpecVersion::V3_00));
        assert_eq!(mode, LengthMode::Bits16);
        assert!(io.writes().is_empty());
    }
}
