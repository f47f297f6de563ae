// SPDX-License-Identifier: MPL-2.0

//! DMA mode selection.

use super::{DmaMode, geometry::ADMA1_PAGE_SIZE};
use crate::{
    caps::{DmaModes, DmaPolicy, SlotCaps},
    cmd::{CommandData, Request},
    prelude::*,
};

/// One entry of the mode priority table.
struct ModeRule {
    mode: DmaMode,
    cap: DmaModes,
    precondition: fn(&SlotCaps, &CommandData) -> bool,
}

/// Mode priority table, evaluated in order. Every rule whose capability bit
/// is set and whose precondition holds replaces the earlier pick, so a later
/// rule wins over an earlier one.
const MODE_RULES: [ModeRule; 4] = [
    ModeRule {
        mode: DmaMode::Sdma,
        cap: DmaModes::SDMA,
        precondition: |_, data| data.block_len > 32,
    },
    ModeRule {
        mode: DmaMode::Adma1,
        cap: DmaModes::ADMA1,
        precondition: |_, data| {
            data.block_len as usize % ADMA1_PAGE_SIZE == 0
                && data.daddr % ADMA1_PAGE_SIZE as u64 == 0
        },
    },
    ModeRule {
        mode: DmaMode::Adma2,
        cap: DmaModes::ADMA2,
        precondition: |_, data| data.block_count > 1,
    },
    ModeRule {
        mode: DmaMode::Adma3,
        cap: DmaModes::ADMA3,
        precondition: |caps, data| caps.version.has_adma3() && data.block_count > 1,
    },
];

/// Picks the DMA mode for `req` from its lead command.
///
/// Open-ended transfers and commands without data use no DMA. A pinned
/// policy bypasses the priority table. In every case a data buffer that
/// breaks the addressing alignment falls back to no DMA.
pub fn select_mode(caps: &SlotCaps, policy: DmaPolicy, req: &Request) -> Result<DmaMode> {
    let Some(lead) = req.lead() else {
        return_errno_with_msg!(InvalidArgs, "request without commands");
    };
    if lead.infinite {
        return Ok(DmaMode::None);
    }
    let Some(data) = &lead.data else {
        return Ok(DmaMode::None);
    };

    let mode = match policy {
        DmaPolicy::Pinned(mode) => mode,
        DmaPolicy::Auto => MODE_RULES
            .iter()
            .rfind(|rule| caps.modes.contains(rule.cap) && (rule.precondition)(caps, data))
            .map_or(DmaMode::None, |rule| rule.mode),
    };

    if mode != DmaMode::None && data.daddr % caps.dma_alignment() != 0 {
        debug!(
            "[SDHC]: buffer {:#x} not {}-byte aligned, falling back to no DMA",
            data.daddr,
            caps.dma_alignment()
        );
        return Ok(DmaMode::None);
    }
    Ok(mode)
}
