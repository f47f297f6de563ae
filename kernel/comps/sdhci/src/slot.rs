// SPDX-License-Identifier: MPL-2.0

//! The DMA context of one host controller slot.

use crate::{
    caps::{SlotCaps, SlotConfig},
    cmd::{CommandData, DataDirection, Request, RequestTag, TransferState},
    dma::{
        DmaMode,
        desc::{self, LengthMode},
        geometry::desc_geometry,
        program,
        select::select_mode,
        split::{SubBufferList, fragments, segment_limit},
    },
    error::Errno,
    io::{DescTableRef, DmaDirection, DmaRegion, SdhcIo},
    prelude::*,
    regs::{NormalIrq, SdhcRegs, split_irq_status},
};

/// What an interrupt status meant for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqOutcome {
    /// No bit relevant to the transfer was set.
    Pending,
    /// The transfer finished.
    Completed,
    /// The SDMA engine stopped at a buffer boundary and was re-armed.
    Resumed,
}

/// A host controller slot running one DMA transfer at a time.
///
/// The slot owns the register handle of its controller and two
/// pre-allocated regions shared with the DMA engine: one for ADMA1/ADMA2
/// descriptor tables and ADMA3 command chains, one for ADMA3 integrated
/// descriptors. Both are rewritten by every prepared request.
pub struct Slot<'a, I: SdhcIo> {
    pub(crate) io: I,
    caps: SlotCaps,
    pub(crate) config: SlotConfig,
    mode: DmaMode,
    len_mode: LengthMode,
    desc_region: DmaRegion<'a>,
    integrated_region: DmaRegion<'a>,
    pub(crate) current: Option<RequestTag>,
}

impl<'a, I: SdhcIo> Slot<'a, I> {
    /// Creates a slot and programs the ADMA2 length mode.
    pub fn new(
        mut io: I,
        caps: SlotCaps,
        config: SlotConfig,
        desc_region: DmaRegion<'a>,
        integrated_region: DmaRegion<'a>,
    ) -> Self {
        let len_mode = program::configure_length_mode(&mut io, &caps);
        info!(
            "[SDHC]: slot ready, version {:?}, modes {:?}, 64-bit {}, length mode {:?}",
            caps.version, caps.modes, caps.addr64, len_mode
        );
        Self {
            io,
            caps,
            config,
            mode: DmaMode::None,
            len_mode,
            desc_region,
            integrated_region,
            current: None,
        }
    }

    pub fn caps(&self) -> &SlotCaps {
        &self.caps
    }

    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    /// Returns the mode picked for the last prepared request.
    pub fn mode(&self) -> DmaMode {
        self.mode
    }

    pub fn len_mode(&self) -> LengthMode {
        self.len_mode
    }

    /// Returns the tag of the request the slot is running.
    pub fn current_request(&self) -> Option<RequestTag> {
        self.current
    }

    pub fn io(&self) -> &I {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut I {
        &mut self.io
    }

    /// Picks the DMA mode of `req` and caches it on the slot.
    pub fn specify_transmission_mode(&mut self, req: &Request) -> Result<DmaMode> {
        let mode = select_mode(&self.caps, self.config.dma_policy, req)?;
        self.mode = mode;
        Ok(mode)
    }

    /// Builds and flushes the descriptors of `req`, programs the engine and
    /// makes `req` the slot's current request.
    ///
    /// On failure the request is left `Errored` and the DMA select field is
    /// untouched, except for a request still in flight on this slot, which
    /// is refused with `Busy` and keeps running.
    pub fn prepare_transfer(&mut self, req: &mut Request) -> Result<()> {
        if let Some(tag) = self.current {
            if tag != req.tag() {
                return Err(req.fail(Error::with_msg(Busy, "slot runs another request")));
            }
            // A live request with this tag keeps its state.
            if !req.state().is_terminal() {
                return_errno_with_msg!(Busy, "request is still in flight");
            }
        }

        req.reset();
        if let Err(e) = self.arm(req) {
            warn!("[SDHC]: failed to prepare request {}: {}", req.tag().0, e);
            return Err(req.fail(e));
        }

        self.current = Some(req.tag());
        req.set_state(TransferState::Armed);
        debug!(
            "[SDHC]: request {} armed in {:?} mode",
            req.tag().0,
            req.mode()
        );
        Ok(())
    }

    fn arm(&mut self, req: &mut Request) -> Result<()> {
        let mode = self.specify_transmission_mode(req)?;
        req.set_mode(mode);
        if mode != DmaMode::Adma3 && req.commands().len() > 1 {
            return_errno_with_msg!(InvalidArgs, "command batch needs ADMA3");
        }
        if mode == DmaMode::None {
            return Ok(());
        }
        let Some(data) = req.lead().and_then(|lead| lead.data.as_ref()) else {
            return_errno_with_msg!(InvalidArgs, "DMA mode without a data phase");
        };

        match mode {
            DmaMode::Sdma => {
                Self::sync_for_device(&mut self.io, data);
                program::program_sdma(&mut self.io, data.daddr, &self.caps)?;
            }
            DmaMode::Adma1 | DmaMode::Adma2 => {
                let table = self.build_chain(mode, data)?;
                Self::sync_for_device(&mut self.io, data);
                program::program_adma(&mut self.io, table.daddr, &self.caps)?;
                req.set_tables(Some(table), None);
            }
            DmaMode::Adma3 => {
                let tables = desc::build_adma3(
                    req.commands(),
                    &self.caps,
                    self.len_mode,
                    &mut self.desc_region,
                    &mut self.integrated_region,
                )?;
                desc::trace_words("chains", &self.desc_region.as_slice()[..tables.chains.len]);
                desc::trace_words(
                    "integrated",
                    &self.integrated_region.as_slice()[..tables.integrated.len],
                );
                self.flush_table(tables.chains);
                self.flush_table(tables.integrated);
                for data in req.commands().iter().filter_map(|cmd| cmd.data.as_ref()) {
                    Self::sync_for_device(&mut self.io, data);
                }
                program::program_adma3(&mut self.io, tables.integrated.daddr, &self.caps)?;
                req.set_tables(Some(tables.chains), Some(tables.integrated));
            }
            DmaMode::None => return Ok(()),
        }

        program::select_engine(&mut self.io, mode, &self.caps)
    }

    /// Encodes the ADMA1/ADMA2 table of `data` at the start of the
    /// descriptor region and flushes it.
    fn build_chain(&mut self, mode: DmaMode, data: &CommandData) -> Result<DescTableRef> {
        let mut list = SubBufferList::new();
        let limit = segment_limit(mode, self.len_mode)?;
        let subs = fragments(data, limit, &mut list)?;
        let len = desc_geometry(mode, subs, &self.caps)?.total_size();
        let out = self.desc_region.window(0, len)?;
        let written = match mode {
            DmaMode::Adma1 => desc::encode_adma1(subs, &self.caps, out)?,
            _ => desc::encode_adma2(subs, &self.caps, self.len_mode, out)?,
        };
        desc::trace_words("table", &self.desc_region.as_slice()[..written]);

        let table = DescTableRef {
            daddr: self.desc_region.daddr(),
            len: written,
        };
        self.flush_table(table);
        Ok(table)
    }

    fn flush_table(&mut self, table: DescTableRef) {
        self.io
            .sync_dma(table.daddr, table.len, DmaDirection::ToDevice);
    }

    /// Cleans the data buffers the device is about to read.
    fn sync_for_device(io: &mut I, data: &CommandData) {
        if data.dir == DataDirection::Write {
            Self::sync_data(io, data, DmaDirection::ToDevice);
        }
    }

    fn sync_data(io: &mut I, data: &CommandData, dir: DmaDirection) {
        match &data.sub_buffers {
            Some(subs) => {
                for sub in subs {
                    io.sync_dma(sub.daddr, sub.len as usize, dir);
                }
            }
            None => io.sync_dma(data.daddr, data.size() as usize, dir),
        }
    }

    /// Decodes an interrupt status for the slot's current request.
    ///
    /// Serves both the interrupt handler and the completion wait loop.
    pub fn handle_interrupt(&mut self, req: &mut Request, raw_status: u32) -> Result<IrqOutcome> {
        if self.current != Some(req.tag()) {
            return_errno_with_msg!(InvalidArgs, "request is not running on this slot");
        }
        if req.state() == TransferState::Armed {
            req.set_state(TransferState::Running);
        }

        let (normal, error) = split_irq_status(raw_status);
        if normal.contains(NormalIrq::ERROR) || !error.is_empty() {
            self.io.write_u32(
                SdhcRegs::NormalIrqStatus,
                u32::from(NormalIrq::ERROR.bits()) | (u32::from(error.bits()) << 16),
            );
            let errno = Errno::from_error_status(error);
            if errno == Errno::AdmaFailed {
                let adma_status = self.io.read_u8(SdhcRegs::AdmaErrorStatus);
                warn!("[SDHC]: ADMA error status {:#04x}", adma_status);
            }
            warn!(
                "[SDHC]: request {} failed with {:?}, error status {:#06x}",
                req.tag().0,
                errno,
                error.bits()
            );
            return Err(req.fail(Error::new(errno)));
        }

        if normal.contains(NormalIrq::XFER_COMPLETE) {
            let ack = normal & (NormalIrq::XFER_COMPLETE | NormalIrq::DMA);
            self.io.write_u16(SdhcRegs::NormalIrqStatus, ack.bits());
            req.set_state(TransferState::Completed);
            // The ADMA3 integrated table stays referenced until the request
            // is prepared again.
            if matches!(req.mode(), DmaMode::Adma1 | DmaMode::Adma2) {
                req.release_desc_table();
            }
            debug!("[SDHC]: request {} completed", req.tag().0);
            return Ok(IrqOutcome::Completed);
        }

        if normal.contains(NormalIrq::DMA) {
            self.io
                .write_u16(SdhcRegs::NormalIrqStatus, NormalIrq::DMA.bits());
            if req.mode() != DmaMode::Sdma {
                error!(
                    "[SDHC]: DMA interrupt in {:?} mode for request {}",
                    req.mode(),
                    req.tag().0
                );
                return Err(req.fail(Error::new(UnexpectedIrq)));
            }

            req.set_state(TransferState::Resuming);
            let next = u64::from(self.io.read_u32(SdhcRegs::SdmaAddress));
            trace!("[SDHC]: SDMA boundary, resuming at {:#x}", next);
            req.set_resume_cursor(next);
            if let Err(e) = program::program_sdma(&mut self.io, next, &self.caps) {
                return Err(req.fail(e));
            }
            req.set_state(TransferState::Running);
            return Ok(IrqOutcome::Resumed);
        }

        Ok(IrqOutcome::Pending)
    }

    /// Hands the data of a finished request back to the CPU, releases the
    /// slot and returns the request's outcome.
    ///
    /// A request still in flight is refused and the slot keeps running it.
    pub fn finish_transfer(&mut self, req: &mut Request) -> Result<()> {
        if !req.state().is_terminal() {
            return_errno_with_msg!(InvalidArgs, "request has not finished");
        }
        if self.current == Some(req.tag()) {
            self.current = None;
        }
        if req.mode() != DmaMode::None {
            for data in req.commands().iter().filter_map(|cmd| cmd.data.as_ref()) {
                if data.dir == DataDirection::Read {
                    Self::sync_data(&mut self.io, data, DmaDirection::FromDevice);
                }
            }
        }

        match req.error() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
