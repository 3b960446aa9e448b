use crate::{
    bitstream::{can_ensure, BitStream},
    decode_blocks::{decode_block_header, decode_dynamic_huffman_block, decode_zlib_header},
    decompress_utils::{decode_entry::DecodeEntry, DecodeTable},
    deflate_constants::{
        DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN, DEFLATE_FIRST_LEN_SYM, DEFLATE_LENGTH_BASE,
        DEFLATE_LENGTH_EXTRA_BITS, DEFLATE_MAX_EXTRA_LENGTH_BITS, DEFLATE_MIN_MATCH_LEN,
        DEFLATE_NUM_LEN_SLOTS,
    },
    png_constants::{PNG_FILTER_NONE, PNG_FILTER_UP, ZLIB_ADLER32_LEN},
    safety_check, FpngDecodeError, FpngDecodeTables,
};
use nightly_quirks::branch_pred::unlikely;

/*
 * Each TABLEBITS number below is the number of bits of the stream looked up
 * at once.  fpng limits its literal/length codewords to this length, so the
 * tables never need subtables.
 */
pub const DECODER_TABLEBITS: usize = 12;
pub const DECODER_TABLESIZE: usize = 1 << DECODER_TABLEBITS;

pub type LenType = u8;

/* Bytes per pixel of the output, and of every run the encoder emits */
pub const FPNG_CHANNELS: usize = 3;

/*
 * A lookup is followed by at most one more codeword (the speculative one) and
 * the match extra bits before the next refill.
 */
const_assert!(can_ensure(DECODER_TABLEBITS));
const_assert!(can_ensure(2 * DECODER_TABLEBITS));
const_assert!(can_ensure(DEFLATE_MAX_EXTRA_LENGTH_BITS + 1));

struct ScanlineDecoder<'a> {
    input_bitstream: BitStream<'a>,
    litlen_decode_table: &'a DecodeTable,
}

impl<'a> ScanlineDecoder<'a> {
    /*
     * Look up the next literal/length symbol without consuming it.  Needs
     * DECODER_TABLEBITS buffered bits.
     */
    #[inline(always)]
    fn peek_entry(&self) -> Result<DecodeEntry, FpngDecodeError> {
        let entry =
            self.litlen_decode_table[self.input_bitstream.bits(DECODER_TABLEBITS) as usize];
        safety_check!(entry.is_valid());
        Ok(entry)
    }

    #[inline(always)]
    fn decode_filter_type(&mut self, expected_filter: u16) -> Result<(), FpngDecodeError> {
        // At start of PNG scanline, so read the filter literal
        let entry = self.peek_entry()?;
        self.input_bitstream.remove_bits(entry.len())?;
        safety_check!(entry.symbol() == expected_filter);
        Ok(())
    }

    /*
     * Decode the length of a match whose length symbol has already been
     * consumed, then skip its distance codeword.  The distance is always one
     * pixel back, and fpng's offset code gives it a single bit.
     */
    #[inline(always)]
    fn decode_run_length(&mut self, length_symbol: u16) -> Result<usize, FpngDecodeError> {
        let slot = (length_symbol - DEFLATE_FIRST_LEN_SYM) as usize;
        safety_check!(slot < DEFLATE_NUM_LEN_SLOTS);

        let extra_bits = DEFLATE_LENGTH_EXTRA_BITS[slot] as usize;
        let run_len = DEFLATE_LENGTH_BASE[slot] as usize
            + self.input_bitstream.pop_bits_no_refill(extra_bits) as usize;
        debug_assert!(run_len >= DEFLATE_MIN_MATCH_LEN);

        // Skip match distance - it's always the same (FPNG_CHANNELS)
        self.input_bitstream.remove_bits_no_refill(1);

        // Matches must always be a multiple of the pixel size
        safety_check!(run_len % FPNG_CHANNELS == 0);

        Ok(run_len)
    }

    #[inline(always)]
    fn write_pixel<const FIRST_ROW: bool>(
        prev_row: &[u8],
        cur_row: &mut [u8],
        x: usize,
        delta: [u8; FPNG_CHANNELS],
    ) {
        let pixel = &mut cur_row[x..(x + FPNG_CHANNELS)];
        if FIRST_ROW {
            pixel.copy_from_slice(&delta);
        } else {
            let up = &prev_row[x..(x + FPNG_CHANNELS)];
            for c in 0..FPNG_CHANNELS {
                pixel[c] = up[c].wrapping_add(delta[c]);
            }
        }
    }

    /*
     * Repeat 'delta' over cur_row[x..run_end].  On the first row the deltas
     * are the pixels themselves; later rows add them to the row above.
     */
    #[inline(always)]
    fn write_run<const FIRST_ROW: bool>(
        prev_row: &[u8],
        cur_row: &mut [u8],
        x: usize,
        run_end: usize,
        delta: [u8; FPNG_CHANNELS],
    ) {
        let run = &mut cur_row[x..run_end];
        if FIRST_ROW {
            for pixel in run.chunks_exact_mut(FPNG_CHANNELS) {
                pixel.copy_from_slice(&delta);
            }
        } else if delta == [0; FPNG_CHANNELS] {
            run.copy_from_slice(&prev_row[x..run_end]);
        } else {
            for (pixel, up) in run
                .chunks_exact_mut(FPNG_CHANNELS)
                .zip(prev_row[x..run_end].chunks_exact(FPNG_CHANNELS))
            {
                for c in 0..FPNG_CHANNELS {
                    pixel[c] = up[c].wrapping_add(delta[c]);
                }
            }
        }
    }

    /*
     * Decode the pixels of one scanline, after its filter symbol.  'prev_row'
     * is ignored on the first row.
     *
     * Every pixel is either three literals, the per-channel deltas, or part
     * of a match repeating the deltas of the pixel to its left.
     */
    #[inline(always)]
    fn decode_scanline<const FIRST_ROW: bool>(
        &mut self,
        prev_row: &[u8],
        cur_row: &mut [u8],
    ) -> Result<(), FpngDecodeError> {
        let dst_bpl = cur_row.len();
        let mut delta = [0u8; FPNG_CHANNELS];
        let mut x = 0;

        while x < dst_bpl {
            let lit0 = self.peek_entry()?;
            self.input_bitstream.remove_bits(lit0.len())?;

            if unlikely(!lit0.is_literal()) {
                // Can't be EOB - we still have more pixels to decompress.
                safety_check!(!lit0.is_end_of_block());

                let run_len = self.decode_run_length(lit0.symbol())?;

                // Matches cannot cross scanlines.
                let run_end = x + run_len;
                safety_check!(run_end <= dst_bpl);

                Self::write_run::<FIRST_ROW>(prev_row, cur_row, x, run_end, delta);
                x = run_end;
                continue;
            }

            let (lit1, lit2) = match lit0.next() {
                Some(lit1) => {
                    self.input_bitstream.remove_bits_no_refill(lit1.len());
                    (lit1, self.peek_entry()?)
                }
                None => {
                    let lit1 = self.peek_entry()?;
                    self.input_bitstream.remove_bits_no_refill(lit1.len());
                    let lit2 = match lit1.next() {
                        Some(lit2) => lit2,
                        None => self.peek_entry()?,
                    };
                    (lit1, lit2)
                }
            };

            self.input_bitstream.remove_bits(lit2.len())?;

            // Check for matches
            safety_check!(lit1.is_literal() && lit2.is_literal());

            delta = [lit0.literal(), lit1.literal(), lit2.literal()];
            Self::write_pixel::<FIRST_ROW>(prev_row, cur_row, x, delta);
            x += FPNG_CHANNELS;

            // See if we can decode one more pixel.
            let Some(lit0) = lit2.next() else {
                continue;
            };
            if x >= dst_bpl || !lit0.is_literal() {
                continue;
            }

            self.input_bitstream.remove_bits_no_refill(lit0.len());

            let lit1 = self.peek_entry()?;
            self.input_bitstream.remove_bits(lit1.len())?;

            let lit2 = match lit1.next() {
                Some(lit2) => lit2,
                None => self.peek_entry()?,
            };
            self.input_bitstream.remove_bits_no_refill(lit2.len());

            // Check for matches
            safety_check!(lit1.is_literal() && lit2.is_literal());

            delta = [lit0.literal(), lit1.literal(), lit2.literal()];
            Self::write_pixel::<FIRST_ROW>(prev_row, cur_row, x, delta);
            x += FPNG_CHANNELS;
        }

        Ok(())
    }

    /*
     * Consume the end-of-block symbol that must follow the last pixel and
     * return the offset of the first byte after the DEFLATE stream.
     */
    fn decode_end_of_block(mut self) -> Result<usize, FpngDecodeError> {
        // The last symbol should be EOB
        let entry = self.peek_entry()?;
        safety_check!(entry.is_end_of_block());
        self.input_bitstream.remove_bits_no_refill(entry.len());
        self.input_bitstream.align_input()
    }
}

/*
 * Decompress the zlib stream of an fpng image into 3 byte/pixel scanlines.
 *
 * 'src' holds the zlib stream followed by at least the bytes the bitbuffer
 * reads ahead; 'zlib_len' is the length of the stream alone, its adler32
 * included.  The adler32 itself is not verified.
 *
 * Only the exact shape fpng writes is accepted: a single final dynamic
 * block, filter type 0 on the first row and 2 (Up) on all the others, and
 * pixel-aligned matches one pixel back.  Anything else fails with
 * FpngDecodeError::NotFpng, and the image has to go through a general
 * purpose decoder.
 */
pub fn fpng_pixel_zlib_decompress_3(
    tables: &mut FpngDecodeTables,
    src: &[u8],
    zlib_len: usize,
    dst: &mut [u8],
    width: usize,
    height: usize,
    speculative: bool,
) -> Result<(), FpngDecodeError> {
    let dst_bpl = width
        .checked_mul(FPNG_CHANNELS)
        .ok_or(FpngDecodeError::InvalidArg)?;
    if dst_bpl == 0 || height == 0 || dst_bpl.checked_mul(height) != Some(dst.len()) {
        return Err(FpngDecodeError::InvalidArg);
    }

    let block_start = decode_zlib_header(src, zlib_len)?;
    let mut input_bitstream = BitStream::new(src, block_start)?;

    let header = decode_block_header(&mut input_bitstream)?;
    // Must be the final block or it's not valid, and type=2 (dynamic)
    safety_check!(header.is_final_block);
    safety_check!(header.block_type == DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN);

    decode_dynamic_huffman_block(tables, &mut input_bitstream, FPNG_CHANNELS, speculative)?;

    let mut decoder = ScanlineDecoder {
        input_bitstream,
        litlen_decode_table: &tables.litlen_decode_table,
    };

    let (first_row, later_rows) = dst.split_at_mut(dst_bpl);
    decoder.decode_filter_type(PNG_FILTER_NONE)?;
    decoder.decode_scanline::<true>(&[], first_row)?;

    let mut prev_row: &[u8] = first_row;
    for cur_row in later_rows.chunks_exact_mut(dst_bpl) {
        decoder.decode_filter_type(PNG_FILTER_UP)?;
        decoder.decode_scanline::<false>(prev_row, cur_row)?;
        prev_row = cur_row;
    }

    let deflate_end = decoder.decode_end_of_block()?;

    // The adler32 must directly follow the final block
    safety_check!(deflate_end + ZLIB_ADLER32_LEN == zlib_len);

    Ok(())
}
