// SPDX-License-Identifier: MPL-2.0

//! The register/bus layer consumed by the DMA core.

use core::time::Duration;

use crate::{prelude::*, regs::SdhcRegs};

/// The direction of a DMA transfer, as seen by the cache maintenance code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDirection {
    /// CPU writes, device reads. Dirty lines must be cleaned before the
    /// device starts.
    ToDevice,
    /// Device writes, CPU reads. Lines must be invalidated after the device
    /// finished.
    FromDevice,
}

/// Register and cache access of one SD host controller slot.
///
/// Implementations map register offsets onto the controller's MMIO window
/// and perform cache maintenance on memory shared with the DMA engine.
/// Addresses passed to [`SdhcIo::sync_dma`] are device addresses.
pub trait SdhcIo {
    fn read_u8(&self, reg: SdhcRegs) -> u8;
    fn read_u16(&self, reg: SdhcRegs) -> u16;
    fn read_u32(&self, reg: SdhcRegs) -> u32;
    fn write_u8(&mut self, reg: SdhcRegs, val: u8);
    fn write_u16(&mut self, reg: SdhcRegs, val: u16);
    fn write_u32(&mut self, reg: SdhcRegs, val: u32);

    /// Makes `[daddr, daddr + len)` coherent between CPU and device for a
    /// transfer in the given direction.
    fn sync_dma(&mut self, daddr: u64, len: usize, dir: DmaDirection);

    /// Busy-waits for at least `duration`.
    fn delay(&mut self, duration: Duration);

    /// Polls a 32-bit register until any bit of `mask` is set.
    ///
    /// Returns the last value read, or `None` if `timeout` elapsed first.
    fn poll_status(
        &mut self,
        reg: SdhcRegs,
        mask: u32,
        timeout: Duration,
        interval: Duration,
    ) -> Option<u32> {
        let mut waited = Duration::ZERO;
        loop {
            let val = self.read_u32(reg);
            if val & mask != 0 {
                return Some(val);
            }
            if waited >= timeout {
                return None;
            }
            self.delay(interval);
            waited += interval;
        }
    }
}

/// A pre-allocated memory region shared with the DMA engine.
///
/// `mem` is the CPU view and `daddr` the address the controller uses to
/// reach the first byte of `mem`.
#[derive(Debug)]
pub struct DmaRegion<'a> {
    mem: &'a mut [u8],
    daddr: u64,
}

impl<'a> DmaRegion<'a> {
    /// Creates a region from its CPU view and device address.
    pub fn new(mem: &'a mut [u8], daddr: u64) -> Self {
        Self { mem, daddr }
    }

    /// Returns the device address of the first byte.
    pub fn daddr(&self) -> u64 {
        self.daddr
    }

    /// Returns the capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.mem.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.mem
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.mem
    }

    /// Returns the writable window `[offset, offset + len)`.
    pub(crate) fn window(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        let Some(end) = offset.checked_add(len) else {
            return_errno!(OutOfMemory);
        };
        if end > self.mem.len() {
            return_errno_with_msg!(OutOfMemory, "descriptor region exhausted");
        }
        Ok(&mut self.mem[offset..end])
    }
}

/// The location of a descriptor table written into a [`DmaRegion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescTableRef {
    /// Device address of the first descriptor.
    pub daddr: u64,
    /// Number of bytes written.
    pub len: usize,
}
