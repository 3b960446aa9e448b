/*****************************************************************************
 *                              Huffman decoding                             *
 *****************************************************************************/

pub mod decode_entry;

use crate::decompress_pixels::{LenType, DECODER_TABLEBITS, DECODER_TABLESIZE};
use crate::decompress_utils::decode_entry::DecodeEntry;
use crate::deflate_constants::DEFLATE_MAX_CODEWORD_LEN;
use crate::masked_array::MaskedArray;
use nightly_quirks::branch_pred::unlikely;

pub type DecodeTable = MaskedArray<DecodeEntry, DECODER_TABLESIZE>;

/*
 * Bit-reverse the low 'len' bits of a canonical codeword.  Codewords are
 * assigned MSB-first but DEFLATE packs them LSB-first, so tables are indexed
 * by the reversed value.
 */
#[inline(always)]
const fn reverse_codeword(codeword: u32, len: usize) -> usize {
    (codeword.reverse_bits() >> (32 - len)) as usize
}

/*
 * Build a flat table for decoding symbols from a Huffman code.  As input,
 * this function takes the codeword length of each symbol, 0 meaning unused.
 * As output, it produces a decode table for the canonical Huffman code
 * described by those lengths, indexed by the next DECODER_TABLEBITS bits of
 * the stream (low-order bit first).
 *
 * Returns %true if successful; %false if the codeword lengths do not form a
 * complete Huffman code, or use codewords too long for a flat table.  The one
 * incomplete code accepted is a single used symbol, whatever its length; the
 * table entries no codeword covers stay invalid.
 */
pub fn build_decode_table(decode_table: &mut DecodeTable, lens: &[LenType]) -> bool {
    // Count how many codewords have each length, including 0.
    let mut len_counts = [0u32; DEFLATE_MAX_CODEWORD_LEN + 1];
    for &len in lens {
        if unlikely(len as usize > DECODER_TABLEBITS) {
            return false;
        }
        len_counts[len as usize] += 1;
    }

    /*
     * First codeword of each length, by the canonical cumulative doubling.
     * After the last length 'codespace' holds the used codespace out of
     * 2^(DEFLATE_MAX_CODEWORD_LEN + 1).
     */
    let mut next_code = [0u32; DEFLATE_MAX_CODEWORD_LEN + 2];
    let mut codespace: u32 = 0;
    for len in 1..=DEFLATE_MAX_CODEWORD_LEN {
        codespace = (codespace + len_counts[len]) << 1;
        next_code[len + 1] = codespace;
    }

    if codespace != 1 << (DEFLATE_MAX_CODEWORD_LEN + 1) {
        let used_syms: u32 = len_counts[1..].iter().sum();
        if used_syms != 1 {
            return false;
        }
    }

    /*
     * Note: the table must be fully reset, in case the stream is malformed
     * and contains bits from the part of the codespace an incomplete code
     * doesn't use.
     */
    decode_table.fill(DecodeEntry::INVALID);

    for (sym, &len) in lens.iter().enumerate() {
        let len = len as usize;
        if len == 0 {
            continue;
        }

        let codeword = next_code[len];
        next_code[len] += 1;

        let entry = DecodeEntry::new(sym as u16, len as u8);
        let stride = 1 << len;
        let mut index = reverse_codeword(codeword, len);
        while index < DECODER_TABLESIZE {
            decode_table[index] = entry;
            index += stride;
        }
    }

    true
}

/*
 * Second pass over a literal/length table: for every literal entry whose
 * codeword leaves at least 'min_codeword_len' bits of the window unused, look
 * up the symbol those remaining bits decode to and pack it into the entry when
 * its whole codeword fits in the window too.
 *
 * Decoding stays correct without this pass; it only saves lookups.
 */
pub fn add_speculative_entries(decode_table: &mut DecodeTable, min_codeword_len: usize) {
    for codeword in 0..DECODER_TABLESIZE {
        let entry = decode_table[codeword];
        if !entry.is_valid() || !entry.is_literal() {
            continue;
        }

        let bits_left = DECODER_TABLEBITS - entry.len();
        if bits_left < min_codeword_len {
            continue;
        }

        // Only the primary symbol of 'next' is read, which this pass never changes
        let next = decode_table[codeword >> entry.len()];
        if !next.is_valid() || next.len() > bits_left {
            continue;
        }

        decode_table[codeword] = entry.with_next(next);
    }
}
