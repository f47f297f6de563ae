// SPDX-License-Identifier: MPL-2.0

//! The DMA core of an SD/SDIO/eMMC host controller driver.
//!
//! A [`Slot`] picks one of the controller's DMA engines (SDMA, ADMA1, ADMA2
//! or ADMA3) per request, builds the descriptor tables the engine walks,
//! programs the engine and follows the transfer to completion through the
//! interrupt status bits.

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod caps;
pub mod cmd;
pub mod dma;
mod error;
pub mod io;
mod prelude;
pub mod regs;
pub mod shared;
pub mod slot;
#[cfg(test)]
mod test_util;
mod wait;

pub use self::{
    caps::{DmaModes, DmaPolicy, SlotCaps, SlotConfig, SpecVersion},
    cmd::{Command, CommandData, Request, RequestTag, SubBuffer, TransferState},
    dma::DmaMode,
    error::{Errno, Error, status_code},
    io::{DmaDirection, DmaRegion, SdhcIo},
    shared::SharedSlot,
    slot::{IrqOutcome, Slot},
};
