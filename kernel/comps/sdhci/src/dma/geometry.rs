// SPDX-License-Identifier: MPL-2.0

//! Descriptor count and size of a chain.

use super::DmaMode;
use crate::{caps::SlotCaps, cmd::SubBuffer, prelude::*};

/// Page size of ADMA1 chains. Every ADMA1 fragment has exactly this size
/// and alignment.
pub const ADMA1_PAGE_SIZE: usize = 4096;

/// Size of an ADMA1 descriptor.
pub const ADMA1_DESC_SIZE: usize = 4;
/// Size of an ADMA2 descriptor with 32-bit addressing.
pub const ADMA2_32_DESC_SIZE: usize = 8;
/// Size of an ADMA2 descriptor with 64-bit addressing in version 3 mode.
pub const ADMA2_64_DESC_SIZE: usize = 12;
/// Size of an ADMA2 descriptor with 64-bit addressing in version 4 mode.
pub const ADMA2_64_V4_DESC_SIZE: usize = 16;

/// The shape of a descriptor chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescGeometry {
    pub count: usize,
    pub desc_size: usize,
}

impl DescGeometry {
    /// Returns the number of bytes the chain occupies.
    pub fn total_size(&self) -> usize {
        self.count * self.desc_size
    }
}

/// Returns the size of one ADMA2/ADMA3 data descriptor.
pub fn adma2_desc_size(caps: &SlotCaps) -> usize {
    match (caps.addr64, caps.v4_mode) {
        (false, _) => ADMA2_32_DESC_SIZE,
        (true, false) => ADMA2_64_DESC_SIZE,
        (true, true) => ADMA2_64_V4_DESC_SIZE,
    }
}

/// Computes the chain geometry for `sub_buffers` in the given mode.
pub fn desc_geometry(
    mode: DmaMode,
    sub_buffers: &[SubBuffer],
    caps: &SlotCaps,
) -> Result<DescGeometry> {
    let Some(first) = sub_buffers.first() else {
        return_errno_with_msg!(InvalidArgs, "no sub-buffers to describe");
    };

    match mode {
        DmaMode::Adma1 => {
            if first.len as usize % ADMA1_PAGE_SIZE != 0 {
                return_errno_with_msg!(InvalidArgs, "ADMA1 fragment not page sized");
            }
            for sub in sub_buffers {
                if sub.len != first.len {
                    return_errno_with_msg!(InvalidArgs, "ADMA1 fragments differ in size");
                }
                if sub.daddr % ADMA1_PAGE_SIZE as u64 != 0 {
                    return_errno_with_msg!(InvalidArgs, "ADMA1 fragment not page aligned");
                }
                if sub.daddr + u64::from(sub.len) > u64::from(u32::MAX) + 1 {
                    return_errno_with_msg!(InvalidArgs, "ADMA1 fragment above 4 GiB");
                }
            }
            Ok(DescGeometry {
                count: sub_buffers.len() + 1,
                desc_size: ADMA1_DESC_SIZE,
            })
        }
        DmaMode::Adma2 | DmaMode::Adma3 => Ok(DescGeometry {
            count: sub_buffers.len(),
            desc_size: adma2_desc_size(caps),
        }),
        DmaMode::None | DmaMode::Sdma => {
            return_errno_with_msg!(InvalidArgs, "mode has no descriptors")
        }
    }
}
