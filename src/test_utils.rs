/*
 * A small reference encoder producing streams shaped the way fpng writes
 * them: one final dynamic block of per-row filter symbols, literal pixel
 * deltas and pixel-aligned matches at distance 3, wrapped in zlib and in the
 * fixed PNG chunk layout.  Every knob of the shape can be changed to produce
 * the near misses the decoder has to reject.
 */

use crate::deflate_constants::{
    DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN, DEFLATE_BLOCKTYPE_UNCOMPRESSED, DEFLATE_END_OF_BLOCK,
    DEFLATE_FIRST_LEN_SYM, DEFLATE_LENGTH_BASE, DEFLATE_LENGTH_EXTRA_BITS, DEFLATE_MAX_MATCH_LEN,
    DEFLATE_NUM_LEN_SLOTS, DEFLATE_NUM_PRECODE_SYMS, DEFLATE_PRECODE_LENS_PERMUTATION,
};
use crate::png_constants::{FPNG_FDEC_DATA, PNG_IDAT_TYPE, PNG_SIGNATURE, ZLIB_CMF, ZLIB_FLG};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    Literal(u8),
    /* Match of this many bytes, one pixel back */
    Run(usize),
    EndOfBlock,
}

pub struct EncoderSettings {
    pub litlen_lens: Vec<u8>,
    pub offset_lens: Vec<u8>,
    pub first_filter: u8,
    pub later_filter: u8,
    pub use_runs: bool,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            litlen_lens: default_litlen_lens(),
            offset_lens: vec![0, 0, 1],
            first_filter: 0,
            later_filter: 2,
            use_runs: true,
        }
    }
}

/*
 * A complete code over all 286 literal/length symbols, skewed so that the
 * zero delta gets a short codeword and the speculative entries kick in.
 */
pub fn default_litlen_lens() -> Vec<u8> {
    let mut lens = vec![9u8; 286];
    lens[0] = 2;
    lens[1] = 4;
    lens[255] = 4;
    lens[2..=38].fill(8);
    lens
}

pub struct BitWriter {
    out: Vec<u8>,
    bitbuf: u64,
    bitcount: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            bitbuf: 0,
            bitcount: 0,
        }
    }

    /* Append the low 'n' bits of 'value', low-order bit first */
    pub fn put_bits(&mut self, value: u32, n: u32) {
        assert!(n <= 32);
        self.bitbuf |= (value as u64 & ((1u64 << n) - 1)) << self.bitcount;
        self.bitcount += n;
        while self.bitcount >= 8 {
            self.out.push(self.bitbuf as u8);
            self.bitbuf >>= 8;
            self.bitcount -= 8;
        }
    }

    /* Append a Huffman codeword, given MSB-first as (codeword, len) */
    pub fn put_code(&mut self, (codeword, len): (u32, u8)) {
        assert!(len > 0, "symbol has no codeword");
        self.put_bits(codeword.reverse_bits() >> (32 - len as u32), len as u32);
    }

    pub fn finish(mut self) -> Vec<u8> {
        if self.bitcount > 0 {
            self.out.push(self.bitbuf as u8);
        }
        self.out
    }
}

/* Canonical codewords for the given lengths; unused symbols get (0, 0) */
pub fn canonical_codes(lens: &[u8]) -> Vec<(u32, u8)> {
    let mut len_counts = [0u32; 16];
    for &len in lens.iter().filter(|&&len| len != 0) {
        len_counts[len as usize] += 1;
    }

    let mut next_code = [0u32; 16];
    let mut code = 0;
    for len in 1..16 {
        code = (code + len_counts[len - 1]) << 1;
        next_code[len] = code;
    }

    lens.iter()
        .map(|&len| {
            if len == 0 {
                return (0, 0);
            }
            let codeword = next_code[len as usize];
            next_code[len as usize] += 1;
            (codeword, len)
        })
        .collect()
}

/* Shortest complete code giving every used symbol (nearly) the same length */
fn balanced_lens(used: &[bool]) -> Vec<u8> {
    let used_syms: Vec<usize> = (0..used.len()).filter(|&sym| used[sym]).collect();
    let mut lens = vec![0u8; used.len()];

    if used_syms.len() == 1 {
        lens[used_syms[0]] = 1;
        return lens;
    }

    let num_used = used_syms.len();
    let max_len = usize::BITS - (num_used - 1).leading_zeros();
    let num_short = (1usize << max_len) - num_used;
    for (i, &sym) in used_syms.iter().enumerate() {
        lens[sym] = (if i < num_short { max_len - 1 } else { max_len }) as u8;
    }
    lens
}

/* Code lengths as (precode symbol, extra bits value, extra bits count) */
fn rle_code_lens(lens: &[u8]) -> Vec<(u8, u32, u32)> {
    let mut items = Vec::new();
    let mut i = 0;
    while i < lens.len() {
        let len = lens[i];
        let mut run = 1;
        while i + run < lens.len() && lens[i + run] == len {
            run += 1;
        }

        let mut left = run;
        if len == 0 {
            while left >= 11 {
                let n = left.min(138);
                items.push((18, (n - 11) as u32, 7));
                left -= n;
            }
            if left >= 3 {
                items.push((17, (left - 3) as u32, 3));
                left = 0;
            }
        } else {
            items.push((len, 0, 0));
            left -= 1;
            while left >= 3 {
                let n = left.min(6);
                items.push((16, (n - 3) as u32, 2));
                left -= n;
            }
        }
        for _ in 0..left {
            items.push((len, 0, 0));
        }

        i += run;
    }
    items
}

fn length_slot(run_len: usize) -> usize {
    if run_len == DEFLATE_MAX_MATCH_LEN {
        return DEFLATE_NUM_LEN_SLOTS - 1;
    }
    (0..(DEFLATE_NUM_LEN_SLOTS - 1))
        .rev()
        .find(|&slot| DEFLATE_LENGTH_BASE[slot] as usize <= run_len)
        .unwrap()
}

const MAX_RUN_PIXELS: usize = DEFLATE_MAX_MATCH_LEN / 3;

/*
 * Turn RGB pixels into the symbol sequence fpng emits, plus the filtered
 * scanlines (filter byte included) the adler32 is computed over.
 */
pub fn tokenize(
    pixels: &[u8],
    width: usize,
    height: usize,
    settings: &EncoderSettings,
) -> (Vec<Token>, Vec<u8>) {
    assert_eq!(pixels.len(), width * height * 3);
    let bpl = width * 3;

    let mut tokens = Vec::new();
    let mut filtered = Vec::new();

    for y in 0..height {
        let filter = if y == 0 {
            settings.first_filter
        } else {
            settings.later_filter
        };
        tokens.push(Token::Literal(filter));
        filtered.push(filter);

        let mut prev_delta = None;
        let mut run = 0;
        for x in 0..width {
            let ofs = y * bpl + x * 3;
            let mut delta = [pixels[ofs], pixels[ofs + 1], pixels[ofs + 2]];
            if y > 0 {
                for c in 0..3 {
                    delta[c] = delta[c].wrapping_sub(pixels[ofs - bpl + c]);
                }
            }
            filtered.extend_from_slice(&delta);

            if settings.use_runs && prev_delta == Some(delta) {
                run += 1;
                if run == MAX_RUN_PIXELS {
                    tokens.push(Token::Run(run * 3));
                    run = 0;
                }
                continue;
            }

            if run > 0 {
                tokens.push(Token::Run(run * 3));
                run = 0;
            }
            tokens.extend(delta.iter().map(|&value| Token::Literal(value)));
            prev_delta = Some(delta);
        }

        if run > 0 {
            tokens.push(Token::Run(run * 3));
        }
    }

    tokens.push(Token::EndOfBlock);
    (tokens, filtered)
}

/* A single final dynamic block holding 'tokens' */
pub fn dynamic_block(tokens: &[Token], settings: &EncoderSettings) -> Vec<u8> {
    let litlen_lens = &settings.litlen_lens;
    let offset_lens = &settings.offset_lens;

    let mut writer = BitWriter::new();
    writer.put_bits(1, 1);
    writer.put_bits(DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN, 2);

    let mut all_lens = litlen_lens.clone();
    all_lens.extend_from_slice(offset_lens);
    let rle_items = rle_code_lens(&all_lens);

    let mut used = [false; DEFLATE_NUM_PRECODE_SYMS];
    for &(presym, _, _) in &rle_items {
        used[presym as usize] = true;
    }
    let precode_lens = balanced_lens(&used);
    let precode_codes = canonical_codes(&precode_lens);

    let mut num_explicit_precode_lens = DEFLATE_NUM_PRECODE_SYMS;
    while num_explicit_precode_lens > 4
        && precode_lens[DEFLATE_PRECODE_LENS_PERMUTATION[num_explicit_precode_lens - 1] as usize]
            == 0
    {
        num_explicit_precode_lens -= 1;
    }

    writer.put_bits((litlen_lens.len() - 257) as u32, 5);
    writer.put_bits((offset_lens.len() - 1) as u32, 5);
    writer.put_bits((num_explicit_precode_lens - 4) as u32, 4);
    for &presym in &DEFLATE_PRECODE_LENS_PERMUTATION[..num_explicit_precode_lens] {
        writer.put_bits(precode_lens[presym as usize] as u32, 3);
    }

    for (presym, extra, extra_bits) in rle_items {
        writer.put_code(precode_codes[presym as usize]);
        if extra_bits > 0 {
            writer.put_bits(extra, extra_bits);
        }
    }

    let litlen_codes = canonical_codes(litlen_lens);
    for &token in tokens {
        match token {
            Token::Literal(value) => writer.put_code(litlen_codes[value as usize]),
            Token::EndOfBlock => writer.put_code(litlen_codes[DEFLATE_END_OF_BLOCK as usize]),
            Token::Run(run_len) => {
                let slot = length_slot(run_len);
                writer.put_code(litlen_codes[DEFLATE_FIRST_LEN_SYM as usize + slot]);
                let extra_bits = DEFLATE_LENGTH_EXTRA_BITS[slot] as u32;
                if extra_bits > 0 {
                    writer.put_bits((run_len - DEFLATE_LENGTH_BASE[slot] as usize) as u32, extra_bits);
                }
                // Distance 3 is offset symbol 2, whose 1 bit codeword is 0
                writer.put_bits(0, 1);
            }
        }
    }

    writer.finish()
}

pub fn adler32(data: &[u8]) -> u32 {
    const MOD_ADLER: u32 = 65521;
    let (mut a, mut b) = (1u32, 0u32);
    for &byte in data {
        a = (a + byte as u32) % MOD_ADLER;
        b = (b + a) % MOD_ADLER;
    }
    (b << 16) | a
}

fn zlib_wrap(deflate: &[u8], uncompressed: &[u8]) -> Vec<u8> {
    let mut zlib = vec![ZLIB_CMF, ZLIB_FLG];
    zlib.extend_from_slice(deflate);
    zlib.extend_from_slice(&adler32(uncompressed).to_be_bytes());
    zlib
}

pub fn zlib_from_tokens(tokens: &[Token], filtered: &[u8], settings: &EncoderSettings) -> Vec<u8> {
    zlib_wrap(&dynamic_block(tokens, settings), filtered)
}

pub fn encode_zlib(pixels: &[u8], width: usize, height: usize, settings: &EncoderSettings) -> Vec<u8> {
    let (tokens, filtered) = tokenize(pixels, width, height, settings);
    zlib_from_tokens(&tokens, &filtered, settings)
}

/*
 * Unfiltered scanlines of 'chans' bytes per pixel in stored blocks of at most
 * 'max_block_len' bytes each.
 */
pub fn stored_zlib(
    pixels: &[u8],
    width: usize,
    height: usize,
    chans: usize,
    max_block_len: usize,
) -> Vec<u8> {
    assert_eq!(pixels.len(), width * height * chans);
    assert!(max_block_len > 0 && max_block_len <= u16::MAX as usize);

    let mut filtered = Vec::new();
    for row in pixels.chunks_exact(width * chans) {
        filtered.push(0);
        filtered.extend_from_slice(row);
    }

    let mut deflate = Vec::new();
    let num_blocks = filtered.len().div_ceil(max_block_len);
    for (i, block) in filtered.chunks(max_block_len).enumerate() {
        let is_final_block = (i + 1 == num_blocks) as u8;
        deflate.push(is_final_block | (DEFLATE_BLOCKTYPE_UNCOMPRESSED as u8) << 1);
        let len = block.len() as u16;
        deflate.extend_from_slice(&len.to_le_bytes());
        deflate.extend_from_slice(&(!len).to_le_bytes());
        deflate.extend_from_slice(block);
    }

    zlib_wrap(&deflate, &filtered)
}

fn write_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    let start = out.len();
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(data);
    let crc = crc32fast::hash(&out[start..]);
    out.extend_from_slice(&crc.to_be_bytes());
}

/* The chunk layout fpng writes around a zlib stream of RGB pixels */
pub fn png_from_zlib(zlib: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    // 8 bits per channel, truecolor, deflate, adaptive filtering, no interlace
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

    let mut png = PNG_SIGNATURE.to_vec();
    write_chunk(&mut png, b"IHDR", &ihdr);
    write_chunk(&mut png, b"fdEC", &FPNG_FDEC_DATA);
    write_chunk(&mut png, &PNG_IDAT_TYPE, zlib);
    write_chunk(&mut png, b"IEND", &[]);
    png
}

pub fn encode_png(pixels: &[u8], width: usize, height: usize, settings: &EncoderSettings) -> Vec<u8> {
    png_from_zlib(&encode_zlib(pixels, width, height, settings), width, height)
}

pub fn encode_stored_png(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    png_from_zlib(
        &stored_zlib(pixels, width, height, 3, u16::MAX as usize),
        width,
        height,
    )
}

/*
 * Deterministic RGB test image mixing noise, repeated pixels (runs of equal
 * deltas on the first row), copies of the row above (zero delta runs) and
 * rows shifted by a constant (nonzero delta runs).
 */
pub fn test_pixels(width: usize, height: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let bpl = width * 3;
    let mut pixels = vec![0u8; bpl * height];
    for y in 0..height {
        let shifted_row = y > 0 && next() % 5 == 0;
        for x in 0..width {
            let ofs = y * bpl + x * 3;
            let r = next();

            if shifted_row {
                let shift = [7u8, 250, 3];
                for c in 0..3 {
                    pixels[ofs + c] = pixels[ofs - bpl + c].wrapping_add(shift[c]);
                }
            } else if x > 0 && r % 4 == 0 {
                pixels.copy_within((ofs - 3)..ofs, ofs);
            } else if y > 0 && r % 4 == 1 {
                pixels.copy_within((ofs - bpl)..(ofs - bpl + 3), ofs);
            } else {
                let bytes = (r >> 16).to_le_bytes();
                pixels[ofs..(ofs + 3)].copy_from_slice(&bytes[..3]);
            }
        }
    }
    pixels
}

#[test]
fn test_reference_encoder_shape() {
    let lens = default_litlen_lens();
    let kraft: u32 = lens.iter().map(|&len| 1 << (12 - len)).sum();
    assert_eq!(kraft, 1 << 12);

    for syms in 1..=DEFLATE_NUM_PRECODE_SYMS {
        let mut used = [false; DEFLATE_NUM_PRECODE_SYMS];
        used[..syms].fill(true);
        let lens = balanced_lens(&used);
        let kraft: u32 = lens.iter().filter(|&&len| len != 0).map(|&len| 1 << (7 - len)).sum();
        assert!(lens.iter().all(|&len| len <= 7));
        if syms > 1 {
            assert_eq!(kraft, 1 << 7);
        }
    }

    let rle = rle_code_lens(&[0, 0, 0, 5, 5, 5, 5, 5, 5, 5, 5, 0, 0]);
    assert_eq!(
        rle,
        [
            (17, 0, 3),
            (5, 0, 0),
            (16, 3, 2),
            (5, 0, 0),
            (0, 0, 0),
            (0, 0, 0)
        ]
    );

    assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
}
