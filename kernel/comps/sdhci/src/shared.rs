// SPDX-License-Identifier: MPL-2.0

//! A slot shared between the submitting context and the interrupt handler.

use spin::{Mutex, MutexGuard};

use crate::{
    cmd::Request,
    io::SdhcIo,
    prelude::*,
    regs::{NormalIrq, SdhcRegs, split_irq_status},
    slot::{IrqOutcome, Slot},
};

/// A [`Slot`] behind a spin lock.
///
/// The interrupt handler never spins on the lock: if the submitting context
/// holds it, [`SharedSlot::handle_irq`] fails with `TryLockFailed` and the
/// status is left for the holder to observe.
pub struct SharedSlot<'a, I: SdhcIo> {
    slot: Mutex<Slot<'a, I>>,
}

impl<'a, I: SdhcIo> SharedSlot<'a, I> {
    pub fn new(slot: Slot<'a, I>) -> Self {
        Self {
            slot: Mutex::new(slot),
        }
    }

    /// Locks the slot for submission or polling.
    pub fn lock(&self) -> MutexGuard<'_, Slot<'a, I>> {
        self.slot.lock()
    }

    /// Runs `f` with the slot locked.
    pub fn with_slot<R>(&self, f: impl FnOnce(&mut Slot<'a, I>) -> R) -> R {
        f(&mut *self.slot.lock())
    }

    /// Services a controller interrupt for `req`.
    pub fn handle_irq(&self, req: &mut Request) -> Result<IrqOutcome> {
        let Some(mut slot) = self.slot.try_lock() else {
            debug!("[SDHC]: slot busy, deferring interrupt");
            return_errno_with_msg!(TryLockFailed, "slot locked by another context");
        };
        let status = slot.io().read_u32(SdhcRegs::NormalIrqStatus);
        let (normal, error) = split_irq_status(status);
        let relevant = NormalIrq::XFER_COMPLETE | NormalIrq::DMA | NormalIrq::ERROR;
        if !normal.intersects(relevant) && error.is_empty() {
            return Ok(IrqOutcome::Pending);
        }
        slot.handle_interrupt(req, status)
    }

    pub fn into_inner(self) -> Slot<'a, I> {
        self.slot.into_inner()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        caps::{DmaModes, SlotCaps, SlotConfig, SpecVersion},
        cmd::{Command, CommandData, DataDirection, RequestTag, ResponseType, TransferState},
        io::DmaRegion,
        test_util::MockIo,
    };

    fn shared<'a>(desc: &'a mut [u8], int: &'a mut [u8]) -> SharedSlot<'a, MockIo> {
        let caps = SlotCaps {
            modes: DmaModes::SDMA | DmaModes::ADMA2,
            addr64: false,
            v4_mode: false,
            version: SpecVersion::V3_00,
        };
        SharedSlot::new(Slot::new(
            MockIo::new(),
            caps,
            SlotConfig::default(),
            DmaRegion::new(desc, 0x7000_0000),
            DmaRegion::new(int, 0x7100_0000),
        ))
    }

    fn request() -> Request {
        let data = CommandData::new(DataDirection::Read, 4, 512, 0x4000_0000);
        Request::single(
            RequestTag(1),
            Command::new(18, 0, ResponseType::R1).with_data(data),
        )
    }

    #[test]
    fn irq_path_does_not_spin() {
        let (mut desc, mut int) = ([0u8; 64], [0u8; 64]);
        let shared = shared(&mut desc, &mut int);
        let mut req = request();
        shared.with_slot(|slot| slot.prepare_transfer(&mut req)).unwrap();

        let guard = shared.lock();
        let err = shared.handle_irq(&mut req).unwrap_err();
        assert_eq!(err.errno(), TryLockFailed);
        drop(guard);

        assert_eq!(shared.handle_irq(&mut req).unwrap(), IrqOutcome::Pending);
        assert_eq!(req.state(), TransferState::Armed);
    }

    #[test]
    fn irq_path_completes_request() {
        let (mut desc, mut int) = ([0u8; 64], [0u8; 64]);
        let shared = shared(&mut desc, &mut int);
        let mut req = request();
        shared.with_slot(|slot| slot.prepare_transfer(&mut req)).unwrap();
        shared
            .lock()
            .io_mut()
            .set_u16(SdhcRegs::NormalIrqStatus, NormalIrq::XFER_COMPLETE.bits());

        assert_eq!(shared.handle_irq(&mut req).unwrap(), IrqOutcome::Completed);
        assert_eq!(req.state(), TransferState::Completed);
        shared.with_slot(|slot| slot.finish_transfer(&mut req)).unwrap();
        assert_eq!(shared.into_inner().current_request(), None);
    }
}
