/*
 * A decode table of order TABLEBITS is a flat array of (1 << TABLEBITS)
 * entries, indexed by the next TABLEBITS bits of compressed data.  Since fpng
 * never emits codewords longer than TABLEBITS, there are no subtables: every
 * codeword of length n owns 2**(TABLEBITS - n) entries, spaced 2**n apart
 * because DEFLATE codewords are stored bit-reversed.
 *
 * Each entry carries the decoded symbol and its codeword length.  A length of
 * zero marks a bit pattern that no codeword covers (an incomplete code).
 *
 * Literal entries may additionally carry a speculative second symbol: when the
 * first codeword is short enough that the following codeword also fits in the
 * TABLEBITS window, the symbol decoded from the remaining high bits is stored
 * alongside, saving one table lookup in the pixel loop.
 */

use crate::deflate_constants::{DEFLATE_END_OF_BLOCK, DEFLATE_NUM_LITERALS};
use std::fmt::Debug;

#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub struct DecodeEntry {
    symbol: u16,
    next_symbol: u16,
    len: u8,
    next_len: u8,
}

impl Debug for DecodeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entry: sym {} len {}", self.symbol, self.len)?;
        if self.next_len != 0 {
            write!(f, " next: sym {} len {}", self.next_symbol, self.next_len)?;
        }
        Ok(())
    }
}

impl DecodeEntry {
    pub const INVALID: DecodeEntry = DecodeEntry {
        symbol: 0,
        next_symbol: 0,
        len: 0,
        next_len: 0,
    };

    #[inline(always)]
    pub const fn new(symbol: u16, len: u8) -> Self {
        Self {
            symbol,
            next_symbol: 0,
            len,
            next_len: 0,
        }
    }

    /// Returns this entry with `next` packed as its speculative second symbol.
    #[inline(always)]
    pub const fn with_next(self, next: DecodeEntry) -> Self {
        Self {
            next_symbol: next.symbol,
            next_len: next.len,
            ..self
        }
    }

    #[inline(always)]
    pub const fn symbol(self) -> u16 {
        self.symbol
    }

    #[inline(always)]
    pub const fn len(self) -> usize {
        self.len as usize
    }

    #[inline(always)]
    pub const fn is_valid(self) -> bool {
        self.len != 0
    }

    #[inline(always)]
    pub const fn is_literal(self) -> bool {
        self.symbol < DEFLATE_NUM_LITERALS
    }

    #[inline(always)]
    pub const fn is_end_of_block(self) -> bool {
        self.symbol == DEFLATE_END_OF_BLOCK
    }

    #[inline(always)]
    pub const fn literal(self) -> u8 {
        self.symbol as u8
    }

    /*
     * The speculative second symbol, as a plain entry.  The returned entry
     * never carries a further speculative symbol: its bits were not part of
     * the lookup that produced it.
     */
    #[inline(always)]
    pub const fn next(self) -> Option<DecodeEntry> {
        if self.next_len != 0 {
            Some(DecodeEntry::new(self.next_symbol, self.next_len))
        } else {
            None
        }
    }
}
