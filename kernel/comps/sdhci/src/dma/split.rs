// SPDX-License-Identifier: MPL-2.0

//! Splitting of data buffers into hardware-addressable fragments.

use core::ops::Deref;

use super::{DmaMode, desc::LengthMode, geometry::ADMA1_PAGE_SIZE};
use crate::{
    cmd::{CommandData, SubBuffer},
    prelude::*,
};

/// Capacity of a [`SubBufferList`].
pub const MAX_SUB_BUFFERS: usize = 128;

/// A fixed-capacity list of fragments, owned by the caller of one
/// descriptor build.
#[derive(Debug, Clone)]
pub struct SubBufferList {
    entries: [SubBuffer; MAX_SUB_BUFFERS],
    len: usize,
}

impl SubBufferList {
    pub const fn new() -> Self {
        Self {
            entries: [SubBuffer::new(0, 0); MAX_SUB_BUFFERS],
            len: 0,
        }
    }

    /// Appends a fragment, failing once the list is full.
    pub fn push(&mut self, sub: SubBuffer) -> Result<()> {
        if self.len == MAX_SUB_BUFFERS {
            return_errno_with_msg!(InvalidArgs, "too many sub-buffers");
        }
        self.entries[self.len] = sub;
        self.len += 1;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn as_slice(&self) -> &[SubBuffer] {
        &self.entries[..self.len]
    }
}

impl Default for SubBufferList {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for SubBufferList {
    type Target = [SubBuffer];

    fn deref(&self) -> &[SubBuffer] {
        self.as_slice()
    }
}

/// Returns the largest fragment a chain of the given mode can describe.
pub fn segment_limit(mode: DmaMode, len_mode: LengthMode) -> Result<u64> {
    match mode {
        DmaMode::Adma1 => Ok(ADMA1_PAGE_SIZE as u64),
        DmaMode::Adma2 | DmaMode::Adma3 => Ok(len_mode.max_len()),
        DmaMode::None | DmaMode::Sdma => {
            return_errno_with_msg!(InvalidArgs, "mode has no fragments")
        }
    }
}

/// Splits `size` bytes starting at `daddr` into fragments of at most
/// `limit` bytes, written to `list`.
///
/// All fragments but the last are exactly `limit` bytes long.
pub fn split_buffer(daddr: u64, size: u64, limit: u64, list: &mut SubBufferList) -> Result<()> {
    if size == 0 || limit == 0 || limit > u64::from(u32::MAX) {
        return_errno_with_msg!(InvalidArgs, "bad buffer or segment size");
    }
    if size.div_ceil(limit) > MAX_SUB_BUFFERS as u64 {
        return_errno_with_msg!(InvalidArgs, "buffer needs too many sub-buffers");
    }

    list.clear();
    let mut offset = 0;
    while offset < size {
        let len = (size - offset).min(limit);
        list.push(SubBuffer::new(daddr + offset, len as u32))?;
        offset += len;
    }
    Ok(())
}

/// Returns the fragments of `data`: the caller-supplied list if present,
/// else the buffer split into `list`.
pub fn fragments<'d>(
    data: &'d CommandData,
    limit: u64,
    list: &'d mut SubBufferList,
) -> Result<&'d [SubBuffer]> {
    if let Some(subs) = &data.sub_buffers {
        return Ok(subs.as_slice());
    }
    split_buffer(data.daddr, data.size(), limit, list)?;
    Ok(list.as_slice())
}
