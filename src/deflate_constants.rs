/*
 * deflate_constants.rs - constants for the DEFLATE compression format, limited
 * to what a single dynamic (or stored) block from fpng can contain.
 */

/* Valid block types  */
pub const DEFLATE_BLOCKTYPE_UNCOMPRESSED: u32 = 0;
pub const DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN: u32 = 2;

/* Minimum and maximum supported match lengths (in bytes)  */
pub const DEFLATE_MIN_MATCH_LEN: usize = 3;
pub const DEFLATE_MAX_MATCH_LEN: usize = 258;

/* Number of symbols in each Huffman code.  Note: for the literal/length
 * and offset codes, these are actually the maximum values; a given block
 * might use fewer symbols.  */
pub const DEFLATE_NUM_PRECODE_SYMS: usize = 19;
pub const DEFLATE_NUM_LITLEN_SYMS: usize = 288;
pub const DEFLATE_NUM_OFFSET_SYMS: usize = 32;

/* Division between literals and lengths in the literal/length alphabet  */
pub const DEFLATE_NUM_LITERALS: u16 = 256;
pub const DEFLATE_END_OF_BLOCK: u16 = 256;
pub const DEFLATE_FIRST_LEN_SYM: u16 = 257;

/* Maximum codeword length, in bits, within each Huffman code  */
pub const DEFLATE_MAX_PRE_CODEWORD_LEN: usize = 7;
pub const DEFLATE_MAX_CODEWORD_LEN: usize = 15;

/* The order in which precode lengths are stored.  */
pub const DEFLATE_PRECODE_LENS_PERMUTATION: [u8; DEFLATE_NUM_PRECODE_SYMS] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/* Number of length symbols with a defined meaning (257..=285)  */
pub const DEFLATE_NUM_LEN_SLOTS: usize = 29;

/* Base match length of each length symbol, indexed by (symbol - 257)  */
pub const DEFLATE_LENGTH_BASE: [u16; DEFLATE_NUM_LEN_SLOTS] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

/* Number of extra length bits of each length symbol, indexed by (symbol - 257)  */
pub const DEFLATE_LENGTH_EXTRA_BITS: [u8; DEFLATE_NUM_LEN_SLOTS] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

pub const DEFLATE_MAX_EXTRA_LENGTH_BITS: usize = 5;

const_assert!(DEFLATE_FIRST_LEN_SYM as usize + DEFLATE_NUM_LEN_SLOTS <= DEFLATE_NUM_LITLEN_SYMS);
const_assert!(DEFLATE_LENGTH_BASE[DEFLATE_NUM_LEN_SLOTS - 1] as usize == DEFLATE_MAX_MATCH_LEN);
