use crate::{
    bitstream::{can_ensure, BitStream},
    decompress_pixels::{LenType, DECODER_TABLEBITS},
    decompress_utils::{add_speculative_entries, build_decode_table},
    deflate_constants::{
        DEFLATE_BLOCKTYPE_UNCOMPRESSED, DEFLATE_MAX_PRE_CODEWORD_LEN, DEFLATE_NUM_LITLEN_SYMS,
        DEFLATE_NUM_OFFSET_SYMS, DEFLATE_NUM_PRECODE_SYMS, DEFLATE_PRECODE_LENS_PERMUTATION,
    },
    png_constants::{
        FPNG_MIN_ZLIB_LEN, PNG_FILTER_NONE, ZLIB_ADLER32_LEN, ZLIB_CMF, ZLIB_FLG, ZLIB_HEADER_LEN,
    },
    safety_check, FpngDecodeError, FpngDecodeTables,
};

pub struct BlockHeader {
    pub is_final_block: bool,
    pub block_type: u32,
}

/*
 * Check the two byte zlib header fpng writes and return the offset of the
 * first DEFLATE block.
 */
pub fn decode_zlib_header(src: &[u8], zlib_len: usize) -> Result<usize, FpngDecodeError> {
    safety_check!(zlib_len >= FPNG_MIN_ZLIB_LEN && src.len() >= ZLIB_HEADER_LEN);
    safety_check!(src[0] == ZLIB_CMF && src[1] == ZLIB_FLG);
    Ok(ZLIB_HEADER_LEN)
}

#[inline(always)]
pub fn decode_block_header(input_bitstream: &mut BitStream) -> Result<BlockHeader, FpngDecodeError> {
    const_assert!(can_ensure(1 + 2));

    /* BFINAL: 1 bit  */
    let is_final_block = input_bitstream.pop_bits(1)? != 0;

    /* BTYPE: 2 bits  */
    let block_type = input_bitstream.pop_bits(2)?;

    Ok(BlockHeader {
        is_final_block,
        block_type,
    })
}

/*
 * Read the Huffman code description of a dynamic block and build the
 * literal/length decode table into 'tables'.
 *
 * On top of the DEFLATE rules this rejects anything fpng would not write:
 * literal/length codewords longer than DECODER_TABLEBITS, and any offset code
 * other than the single 1 bit code for a distance of one pixel
 * ('num_chans' bytes), optionally followed by a second 1 bit code.
 */
pub fn decode_dynamic_huffman_block(
    tables: &mut FpngDecodeTables,
    input_bitstream: &mut BitStream,
    num_chans: usize,
    speculative: bool,
) -> Result<(), FpngDecodeError> {
    debug_assert!(num_chans == 3 || num_chans == 4);

    /* Read the codeword length counts.  */

    const_assert!(DEFLATE_NUM_LITLEN_SYMS == ((1 << 5) - 1) + 257);
    let num_litlen_syms = (input_bitstream.pop_bits(5)? + 257) as usize;

    const_assert!(DEFLATE_NUM_OFFSET_SYMS == ((1 << 5) - 1) + 1);
    let num_offset_syms = (input_bitstream.pop_bits(5)? + 1) as usize;

    let total_syms = num_litlen_syms + num_offset_syms;
    safety_check!(total_syms <= DEFLATE_NUM_LITLEN_SYMS + DEFLATE_NUM_OFFSET_SYMS);

    const_assert!(DEFLATE_NUM_PRECODE_SYMS == ((1 << 4) - 1) + 4);
    let num_explicit_precode_lens = (input_bitstream.pop_bits(4)? + 4) as usize;

    /* Read the precode codeword lengths.  */
    const_assert!(DEFLATE_MAX_PRE_CODEWORD_LEN == (1 << 3) - 1);
    let mut precode_lens = [0 as LenType; DEFLATE_NUM_PRECODE_SYMS];
    for &presym in &DEFLATE_PRECODE_LENS_PERMUTATION[..num_explicit_precode_lens] {
        precode_lens[presym as usize] = input_bitstream.pop_bits(3)? as LenType;
    }

    /* Build the decode table for the precode.  */
    safety_check!(build_decode_table(
        &mut tables.precode_decode_table,
        &precode_lens
    ));

    /* Expand the literal/length and offset codeword lengths.  */
    let mut lens = [0 as LenType; DEFLATE_NUM_LITLEN_SYMS + DEFLATE_NUM_OFFSET_SYMS];
    let mut i = 0;
    while i < total_syms {
        /* Read the next precode symbol.  */
        let entry =
            tables.precode_decode_table[input_bitstream.bits(DECODER_TABLEBITS) as usize];
        safety_check!(entry.is_valid());
        input_bitstream.remove_bits(entry.len())?;
        let presym = entry.symbol();

        if presym < 16 {
            /* Explicit codeword length; fpng never needs subtables  */
            safety_check!(presym as usize <= DECODER_TABLEBITS);
            lens[i] = presym as LenType;
            i += 1;
            continue;
        }

        /* Run-length encoded codeword lengths  */
        let (rep_count, rep_val) = match presym {
            16 => {
                /* Repeat the previous length 3 - 6 times  */
                safety_check!(i != 0);
                (3 + input_bitstream.pop_bits(2)? as usize, lens[i - 1])
            }
            17 => {
                /* Repeat zero 3 - 10 times  */
                (3 + input_bitstream.pop_bits(3)? as usize, 0)
            }
            _ => {
                /* Repeat zero 11 - 138 times  */
                (11 + input_bitstream.pop_bits(7)? as usize, 0)
            }
        };

        safety_check!(i + rep_count <= total_syms);
        lens[i..(i + rep_count)].fill(rep_val);
        i += rep_count;
    }

    let (litlen_lens, offset_lens) = lens[..total_syms].split_at(num_litlen_syms);

    /*
     * The first fpng versions issued a single 1 bit offset code, later ones
     * add a second so that stricter inflaters accept the stream.  Both are
     * decoded the same way: the pixel loop skips one bit per match.
     */
    let num_one_bit_offset_codes = offset_lens.iter().filter(|&&len| len == 1).count();
    safety_check!((1..=2).contains(&num_one_bit_offset_codes));
    safety_check!(offset_lens.get(num_chans - 1) == Some(&1));
    if num_one_bit_offset_codes == 2 {
        safety_check!(offset_lens.get(num_chans) == Some(&1));
    }

    safety_check!(build_decode_table(
        &mut tables.litlen_decode_table,
        litlen_lens
    ));

    if speculative {
        let min_codeword_len = litlen_lens
            .iter()
            .copied()
            .filter(|&len| len != 0)
            .min()
            .unwrap_or(DECODER_TABLEBITS as LenType);
        add_speculative_entries(&mut tables.litlen_decode_table, min_codeword_len as usize);
    }

    Ok(())
}

/*
 * Decode a zlib stream made of stored blocks holding PNG scanlines, all with
 * filter type 0.  Raw blocks are an uncommon case so this isn't well
 * optimized.  Supports 3->4 and 4->3 byte/pixel conversion: a converted alpha
 * channel is set to 0xFF.
 */
pub fn decode_stored_blocks(
    src: &[u8],
    zlib_len: usize,
    dst: &mut [u8],
    width: usize,
    height: usize,
    src_chans: usize,
    dst_chans: usize,
) -> Result<(), FpngDecodeError> {
    if !matches!(src_chans, 3 | 4) || !matches!(dst_chans, 3 | 4) {
        return Err(FpngDecodeError::InvalidArg);
    }

    let src_bpl = width
        .checked_mul(src_chans)
        .ok_or(FpngDecodeError::InvalidArg)?;
    let dst_len = width
        .checked_mul(dst_chans)
        .and_then(|dst_bpl| dst_bpl.checked_mul(height))
        .ok_or(FpngDecodeError::InvalidArg)?;
    if dst_len == 0 || dst.len() != dst_len {
        return Err(FpngDecodeError::InvalidArg);
    }

    let mut src_ofs = decode_zlib_header(src, zlib_len)?;
    let mut dst_ofs = 0;
    let mut raster_ofs = 0;
    let mut comp_ofs = 0;

    loop {
        /* Block header: BFINAL, BTYPE, then padding to the byte boundary  */
        safety_check!(src_ofs < src.len());
        let is_final_block = (src[src_ofs] & 1) != 0;
        let block_type = ((src[src_ofs] >> 1) & 3) as u32;
        safety_check!(block_type == DEFLATE_BLOCKTYPE_UNCOMPRESSED);
        src_ofs += 1;

        safety_check!(src_ofs + 4 <= src.len());
        let len = u16::from_le_bytes([src[src_ofs], src[src_ofs + 1]]);
        let nlen = u16::from_le_bytes([src[src_ofs + 2], src[src_ofs + 3]]);
        src_ofs += 4;

        safety_check!(len == !nlen);

        let len = len as usize;
        safety_check!(src_ofs + len <= src.len());

        for &c in &src[src_ofs..(src_ofs + len)] {
            if raster_ofs == 0 {
                // Check filter type
                safety_check!(c as u16 == PNG_FILTER_NONE);
                debug_assert_eq!(comp_ofs, 0);
            } else {
                if comp_ofs < dst_chans {
                    safety_check!(dst_ofs < dst_len);
                    dst[dst_ofs] = c;
                    dst_ofs += 1;
                }

                comp_ofs += 1;
                if comp_ofs == src_chans {
                    if dst_chans > src_chans {
                        safety_check!(dst_ofs < dst_len);
                        dst[dst_ofs] = 0xFF;
                        dst_ofs += 1;
                    }

                    comp_ofs = 0;
                }
            }

            raster_ofs += 1;
            if raster_ofs == src_bpl + 1 {
                raster_ofs = 0;
            }
        }

        src_ofs += len;

        if is_final_block {
            break;
        }
    }

    safety_check!(comp_ofs == 0);

    // Only the adler32 may follow the last block
    safety_check!(src_ofs + ZLIB_ADLER32_LEN == zlib_len);

    safety_check!(dst_ofs == dst_len);

    Ok(())
}
