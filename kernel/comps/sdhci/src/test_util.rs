// SPDX-License-Identifier: MPL-2.0

//! A register-file model of a host controller for unit tests.

use alloc::vec::Vec;
use core::time::Duration;

use crate::{
    io::{DmaDirection, SdhcIo},
    regs::SdhcRegs,
};

const REG_FILE_SIZE: usize = 0x100;
/// Normal and error interrupt status, write-one-to-clear.
const W1C_RANGE: core::ops::Range<usize> = 0x30..0x34;

/// A register write seen by the mock, as (offset, value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegWrite {
    U8(u16, u8),
    U16(u16, u16),
    U32(u16, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    Write(RegWrite),
    Sync(u64, usize, DmaDirection),
}

/// Status bits raised once a number of delays elapsed.
struct Raise {
    after: usize,
    reg: SdhcRegs,
    bits: u32,
}

pub struct MockIo {
    regs: [u8; REG_FILE_SIZE],
    events: Vec<MockEvent>,
    raises: Vec<Raise>,
    delays: usize,
}

impl MockIo {
    pub fn new() -> Self {
        Self {
            regs: [0; REG_FILE_SIZE],
            events: Vec::new(),
            raises: Vec::new(),
            delays: 0,
        }
    }

    fn load(&self, reg: SdhcRegs, width: usize) -> u32 {
        let off = reg.offset() as usize;
        let mut bytes = [0u8; 4];
        bytes[..width].copy_from_slice(&self.regs[off..off + width]);
        u32::from_le_bytes(bytes)
    }

    fn store(&mut self, reg: SdhcRegs, width: usize, val: u32) {
        let off = reg.offset() as usize;
        self.regs[off..off + width].copy_from_slice(&val.to_le_bytes()[..width]);
    }

    /// Applies a bus write, honoring write-one-to-clear bytes.
    fn bus_write(&mut self, reg: SdhcRegs, width: usize, val: u32) {
        let off = reg.offset() as usize;
        for (i, byte) in val.to_le_bytes()[..width].iter().enumerate() {
            if W1C_RANGE.contains(&(off + i)) {
                self.regs[off + i] &= !byte;
            } else {
                self.regs[off + i] = *byte;
            }
        }
    }

    pub fn set_u8(&mut self, reg: SdhcRegs, val: u8) {
        self.store(reg, 1, val.into());
    }

    pub fn set_u16(&mut self, reg: SdhcRegs, val: u16) {
        self.store(reg, 2, val.into());
    }

    pub fn set_u32(&mut self, reg: SdhcRegs, val: u32) {
        self.store(reg, 4, val);
    }

    pub fn get_u8(&self, reg: SdhcRegs) -> u8 {
        self.load(reg, 1) as u8
    }

    pub fn get_u16(&self, reg: SdhcRegs) -> u16 {
        self.load(reg, 2) as u16
    }

    pub fn get_u32(&self, reg: SdhcRegs) -> u32 {
        self.load(reg, 4)
    }

    /// ORs `bits` into the 32-bit register `reg` after `after` delays.
    pub fn raise_after(&mut self, after: usize, reg: SdhcRegs, bits: u32) {
        self.raises.push(Raise { after, reg, bits });
    }

    pub fn events(&self) -> &[MockEvent] {
        &self.events
    }

    pub fn writes(&self) -> Vec<RegWrite> {
        self.events
            .iter()
            .filter_map(|e| match e {
                MockEvent::Write(w) => Some(*w),
                MockEvent::Sync(..) => None,
            })
            .collect()
    }

    /// Returns the writes that targeted `offset`.
    pub fn writes_to(&self, offset: u16) -> Vec<RegWrite> {
        self.writes()
            .into_iter()
            .filter(|w| match *w {
                RegWrite::U8(o, _) | RegWrite::U16(o, _) | RegWrite::U32(o, _) => o == offset,
            })
            .collect()
    }

    pub fn syncs(&self) -> Vec<(u64, usize, DmaDirection)> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                MockEvent::Sync(daddr, len, dir) => Some((daddr, len, dir)),
                MockEvent::Write(_) => None,
            })
            .collect()
    }

    pub fn delays(&self) -> usize {
        self.delays
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}

impl Default for MockIo {
    fn default() -> Self {
        Self::new()
    }
}

impl SdhcIo for MockIo {
    fn read_u8(&self, reg: SdhcRegs) -> u8 {
        self.get_u8(reg)
    }

    fn read_u16(&self, reg: SdhcRegs) -> u16 {
        self.get_u16(reg)
    }

    fn read_u32(&self, reg: SdhcRegs) -> u32 {
        self.get_u32(reg)
    }

    fn write_u8(&mut self, reg: SdhcRegs, val: u8) {
        self.events
            .push(MockEvent::Write(RegWrite::U8(reg.offset(), val)));
        self.bus_write(reg, 1, val.into());
    }

    fn write_u16(&mut self, reg: SdhcRegs, val: u16) {
        self.events
            .push(MockEvent::Write(RegWrite::U16(reg.offset(), val)));
        self.bus_write(reg, 2, val.into());
    }

    fn write_u32(&mut self, reg: SdhcRegs, val: u32) {
        self.events
            .push(MockEvent::Write(RegWrite::U32(reg.offset(), val)));
        self.bus_write(reg, 4, val);
    }

    fn sync_dma(&mut self, daddr: u64, len: usize, dir: DmaDirection) {
        self.events.push(MockEvent::Sync(daddr, len, dir));
    }

    fn delay(&mut self, _duration: Duration) {
        self.delays += 1;
        let delays = self.delays;
        let due: Vec<_> = self
            .raises
            .iter()
            .filter(|r| r.after == delays)
            .map(|r| (r.reg, r.bits))
            .collect();
        for (reg, bits) in due {
            let val = self.get_u32(reg) | bits;
            self.set_u32(reg, val);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interrupt_status_is_write_one_to_clear() {
        let mut io = MockIo::new();
        io.set_u32(SdhcRegs::NormalIrqStatus, 0x0020_800A);
        io.write_u16(SdhcRegs::NormalIrqStatus, 0x0002);
        assert_eq!(io.read_u32(SdhcRegs::NormalIrqStatus), 0x0020_8008);
        io.write_u32(SdhcRegs::NormalIrqStatus, 0x0020_8000);
        assert_eq!(io.read_u32(SdhcRegs::NormalIrqStatus), 0x0000_0008);

        io.write_u8(SdhcRegs::HostControl1, 0x18);
        assert_eq!(io.read_u8(SdhcRegs::HostControl1), 0x18);
    }

    #[test]
    fn raised_bits_appear_after_delays() {
        let mut io = MockIo::new();
        io.raise_after(3, SdhcRegs::NormalIrqStatus, 0x2);
        let status = io.poll_status(
            SdhcRegs::NormalIrqStatus,
            0x2,
            Duration::from_millis(1),
            Duration::from_micros(10),
        );
        assert_eq!(status, Some(0x2));
        assert_eq!(io.delays(), 3);
    }
}
