// SPDX-License-Identifier: MPL-2.0

//! DMA mode selection, descriptor construction and engine programming.

pub mod desc;
pub mod geometry;
pub mod program;
pub mod select;
pub mod split;

use int_to_c_enum::TryFromInt;

/// Transfer modes of the controller's data path.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromInt)]
pub enum DmaMode {
    /// No DMA; the data is moved through the buffer data port.
    None = 0,
    Sdma = 1,
    Adma1 = 2,
    Adma2 = 3,
    Adma3 = 4,
}

impl DmaMode {
    pub fn is_adma(self) -> bool {
        matches!(self, DmaMode::Adma1 | DmaMode::Adma2 | DmaMode::Adma3)
    }
}
