// SPDX-License-Identifier: MPL-2.0

//! Polling a slot until its current request finishes.

use crate::{
    cmd::Request,
    io::SdhcIo,
    prelude::*,
    regs::{NormalIrq, SdhcRegs},
    slot::{IrqOutcome, Slot},
};

/// Interrupt status bits that move a transfer forward.
const WAKE_BITS: NormalIrq = NormalIrq::from_bits_truncate(
    NormalIrq::XFER_COMPLETE.bits() | NormalIrq::DMA.bits() | NormalIrq::ERROR.bits(),
);

impl<I: SdhcIo> Slot<'_, I> {
    /// Polls the interrupt status until `req` completes or fails.
    ///
    /// SDMA boundary interrupts are serviced on the way. When no status
    /// shows up within the configured timeout, the slot drops the request.
    /// Only the slot's current request can be waited on.
    pub fn wait_for_completion(&mut self, req: &mut Request) -> Result<()> {
        if self.current != Some(req.tag()) {
            return_errno_with_msg!(InvalidArgs, "request is not running on this slot");
        }
        let timeout = self.config.completion_timeout;
        let interval = self.config.poll_interval;
        loop {
            let Some(status) = self.io.poll_status(
                SdhcRegs::NormalIrqStatus,
                u32::from(WAKE_BITS.bits()),
                timeout,
                interval,
            ) else {
                if self.current == Some(req.tag()) {
                    self.current = None;
                }
                error!(
                    "[SDHC]: request {} timed out in state {:?}",
                    req.tag().0,
                    req.state()
                );
                return Err(req.fail(Error::new(Timeout)));
            };

            match self.handle_interrupt(req, status)? {
                IrqOutcome::Completed => return Ok(()),
                IrqOutcome::Resumed | IrqOutcome::Pending => continue,
            }
        }
    }
}
