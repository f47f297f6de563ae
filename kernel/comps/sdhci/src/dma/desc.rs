// SPDX-License-Identifier: MPL-2.0

//! ADMA descriptor layouts and encoders.
//!
//! All descriptor words are stored little-endian. The low six bits of the
//! first word of every descriptor form its attribute field: `valid`, `end`,
//! `int` and a three-bit `act` code in bits 5:3.

use bitflags::bitflags;

use super::{
    DmaMode,
    geometry::{ADMA1_DESC_SIZE, desc_geometry},
    split::{SubBufferList, fragments, segment_limit},
};
use crate::{
    caps::SlotCaps,
    cmd::{Command, SubBuffer},
    io::{DescTableRef, DmaRegion},
    prelude::*,
};

/// Maximum number of commands in one ADMA3 batch.
pub const MAX_BATCH_COMMANDS: usize = 16;

/// Size of an ADMA3 command descriptor: four (attribute, value) pairs.
pub const ADMA3_CMD_DESC_SIZE: usize = 32;
/// Size of an ADMA3 integrated descriptor with 32-bit addressing.
pub const ADMA3_INTEGRATED_32_SIZE: usize = 8;
/// Size of an ADMA3 integrated descriptor with 64-bit addressing.
pub const ADMA3_INTEGRATED_64_SIZE: usize = 16;

/// Alignment of every command sub-chain in the descriptor region.
const CHAIN_ALIGN: usize = 8;

bitflags! {
    /// Flag bits of the descriptor attribute field.
    pub struct DescFlags: u32 {
        const VALID = 1 << 0;
        const END   = 1 << 1;
        const INT   = 1 << 2;
    }
}

/// The `act` code of a descriptor, already shifted into bits 5:3.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescAct {
    Nop = 0b000 << 3,
    /// ADMA3 command descriptor.
    Command = 0b001 << 3,
    /// ADMA1 page size descriptor.
    Set = 0b010 << 3,
    Transfer = 0b100 << 3,
    Link = 0b110 << 3,
    /// ADMA3 integrated descriptor.
    Integrated = 0b111 << 3,
}

/// Packs an attribute field.
pub const fn attr(act: DescAct, flags: DescFlags) -> u32 {
    act as u32 | flags.bits()
}

/// How the length field of ADMA2/ADMA3 data descriptors is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthMode {
    Bits16,
    /// The upper ten length bits are stored in bits 15:6 of word 0.
    Bits26,
}

impl LengthMode {
    /// Picks the widest length mode the controller supports.
    pub fn for_caps(caps: &SlotCaps) -> Self {
        if caps.version.has_adma2_len_mode() {
            LengthMode::Bits26
        } else {
            LengthMode::Bits16
        }
    }

    /// Returns the largest length one descriptor can carry.
    pub const fn max_len(self) -> u64 {
        match self {
            LengthMode::Bits16 => 1 << 16,
            LengthMode::Bits26 => 1 << 26,
        }
    }

    /// Returns the length bits of word 0. The maximum length encodes as 0.
    pub const fn encode(self, len: u32) -> u32 {
        let low = (len & 0xFFFF) << 16;
        match self {
            LengthMode::Bits16 => low,
            LengthMode::Bits26 => low | (((len >> 16) & 0x3FF) << 6),
        }
    }

    /// Recovers the length from word 0.
    pub const fn decode(self, word0: u32) -> u32 {
        let mut len = word0 >> 16;
        if let LengthMode::Bits26 = self {
            len |= ((word0 >> 6) & 0x3FF) << 16;
        }
        if len == 0 { self.max_len() as u32 } else { len }
    }
}

/// Returns the ADMA1 set descriptor carrying the uniform page size.
pub const fn adma1_set_word(page_size: u32) -> u32 {
    ((page_size & 0xFFFF) << 12) | attr(DescAct::Set, DescFlags::VALID)
}

/// Returns the ADMA1 transfer descriptor of a page.
pub const fn adma1_tran_word(daddr: u32) -> u32 {
    (daddr & 0xFFFF_F000) | attr(DescAct::Transfer, DescFlags::VALID)
}

/// Returns word 0 of an ADMA2/ADMA3 data descriptor.
pub fn adma2_word0(len: u32, len_mode: LengthMode, end: bool) -> u32 {
    let mut flags = DescFlags::VALID;
    flags.set(DescFlags::END, end);
    len_mode.encode(len) | attr(DescAct::Transfer, flags)
}

/// Sequential little-endian word writer over a descriptor window.
struct WordWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WordWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, word: u32) {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&word.to_le_bytes());
        self.pos += 4;
    }

    /// ORs `bits` into the word at byte offset `at`.
    fn or_at(&mut self, at: usize, bits: u32) {
        let bytes = &mut self.buf[at..at + 4];
        let mut word = [0u8; 4];
        word.copy_from_slice(bytes);
        bytes.copy_from_slice(&(u32::from_le_bytes(word) | bits).to_le_bytes());
    }
}

fn ensure_room(out: &[u8], needed: usize) -> Result<()> {
    if out.len() < needed {
        return_errno_with_msg!(OutOfMemory, "descriptor window too small");
    }
    Ok(())
}

/// Writes an ADMA1 chain for `subs` into `out`, returning the bytes written.
pub fn encode_adma1(subs: &[SubBuffer], caps: &SlotCaps, out: &mut [u8]) -> Result<usize> {
    let geo = desc_geometry(DmaMode::Adma1, subs, caps)?;
    ensure_room(out, geo.total_size())?;

    let mut w = WordWriter::new(out);
    w.put(adma1_set_word(subs[0].len));
    for sub in subs {
        w.put(adma1_tran_word(sub.daddr as u32));
    }
    w.or_at((geo.count - 1) * ADMA1_DESC_SIZE, DescFlags::END.bits());
    Ok(geo.total_size())
}

/// Writes an ADMA2 data chain for `subs` into `out`, returning the bytes
/// written. ADMA3 sub-chains use the same records.
pub fn encode_adma2(
    subs: &[SubBuffer],
    caps: &SlotCaps,
    len_mode: LengthMode,
    out: &mut [u8],
) -> Result<usize> {
    let geo = desc_geometry(DmaMode::Adma2, subs, caps)?;
    ensure_room(out, geo.total_size())?;

    let mut w = WordWriter::new(out);
    for (i, sub) in subs.iter().enumerate() {
        if sub.len == 0 || u64::from(sub.len) > len_mode.max_len() {
            return_errno_with_msg!(InvalidArgs, "sub-buffer length not encodable");
        }
        if !caps.addr64 && sub.daddr > u64::from(u32::MAX) {
            return_errno_with_msg!(InvalidArgs, "sub-buffer above 4 GiB");
        }
        w.put(adma2_word0(sub.len, len_mode, i + 1 == subs.len()));
        w.put(sub.daddr as u32);
        if caps.addr64 {
            w.put((sub.daddr >> 32) as u32);
            if caps.v4_mode {
                w.put(0);
            }
        }
    }
    debug_assert_eq!(w.pos, geo.total_size());
    Ok(geo.total_size())
}

/// Writes the ADMA3 command descriptor of `cmd`.
///
/// The end bit is set in the last attribute only for a command without a
/// data phase, which terminates its sub-chain.
fn encode_command_desc(cmd: &Command, out: &mut [u8]) {
    let (block_count, block_len) = cmd
        .data
        .as_ref()
        .map_or((0, 0), |data| (data.block_count, data.block_len));
    let values = [
        block_count,
        block_len,
        cmd.argument,
        cmd.xfer_command(cmd.has_data()),
    ];

    let mut w = WordWriter::new(out);
    for (i, value) in values.into_iter().enumerate() {
        let mut flags = DescFlags::VALID;
        if i == values.len() - 1 && !cmd.has_data() {
            flags |= DescFlags::END;
        }
        w.put(attr(DescAct::Command, flags));
        w.put(value);
    }
}

/// The two tables of an ADMA3 batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adma3Tables {
    /// Command descriptors and their data chains.
    pub chains: DescTableRef,
    /// Integrated descriptors, one per command.
    pub integrated: DescTableRef,
}

/// Returns the size of one ADMA3 integrated descriptor.
pub fn integrated_desc_size(caps: &SlotCaps) -> usize {
    if caps.addr64 {
        ADMA3_INTEGRATED_64_SIZE
    } else {
        ADMA3_INTEGRATED_32_SIZE
    }
}

/// Builds the ADMA3 tables of a command batch.
///
/// Every command gets a sub-chain in `chains`: its command descriptor
/// followed by its data descriptors. `integrated` receives one integrated
/// descriptor per command pointing at that sub-chain.
pub fn build_adma3(
    commands: &[Command],
    caps: &SlotCaps,
    len_mode: LengthMode,
    chains: &mut DmaRegion<'_>,
    integrated: &mut DmaRegion<'_>,
) -> Result<Adma3Tables> {
    if commands.is_empty() {
        return_errno_with_msg!(InvalidArgs, "empty ADMA3 batch");
    }
    if commands.len() > MAX_BATCH_COMMANDS {
        return_errno_with_msg!(OutOfRange, "ADMA3 batch too large");
    }

    let limit = segment_limit(DmaMode::Adma3, len_mode)?;
    let mut chain_addrs = [0u64; MAX_BATCH_COMMANDS];
    let mut subs = SubBufferList::new();
    let mut offset: usize = 0;
    for (cmd, chain_addr) in commands.iter().zip(chain_addrs.iter_mut()) {
        offset = offset.next_multiple_of(CHAIN_ALIGN);
        *chain_addr = chains.daddr() + offset as u64;

        encode_command_desc(cmd, chains.window(offset, ADMA3_CMD_DESC_SIZE)?);
        offset += ADMA3_CMD_DESC_SIZE;

        let Some(data) = &cmd.data else {
            continue;
        };
        let data_subs = fragments(data, limit, &mut subs)?;
        let len = desc_geometry(DmaMode::Adma3, data_subs, caps)?.total_size();
        offset += encode_adma2(data_subs, caps, len_mode, chains.window(offset, len)?)?;
    }

    let int_size = integrated_desc_size(caps);
    let int_len = commands.len() * int_size;
    let mut w = WordWriter::new(integrated.window(0, int_len)?);
    for (i, chain_addr) in chain_addrs[..commands.len()].iter().enumerate() {
        let mut flags = DescFlags::VALID;
        if i + 1 == commands.len() {
            flags |= DescFlags::END;
        }
        w.put(attr(DescAct::Integrated, flags));
        w.put(*chain_addr as u32);
        if caps.addr64 {
            w.put((*chain_addr >> 32) as u32);
            w.put(0);
        }
    }

    Ok(Adma3Tables {
        chains: DescTableRef {
            daddr: chains.daddr(),
            len: offset,
        },
        integrated: DescTableRef {
            daddr: integrated.daddr(),
            len: int_len,
        },
    })
}

/// Logs every descriptor word of `bytes` at trace level.
pub(crate) fn trace_words(name: &str, bytes: &[u8]) {
    if !log::log_enabled!(log::Level::Trace) {
        return;
    }
    for (i, chunk) in bytes.chunks_exact(4).enumerate() {
        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        trace!("[SDHC]: {} +{:#05x}: {:#010x}", name, i * 4, word);
    }
}
