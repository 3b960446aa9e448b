use crate::{
    decode_blocks::decode_stored_blocks,
    decompress_pixels::{fpng_pixel_zlib_decompress_3, FPNG_CHANNELS},
    png_constants::{
        FPNG_FILE_OVERHEAD, FPNG_IDAT_CHUNK_OFFSET, FPNG_MIN_ZLIB_LEN, PNG_CHUNK_CRC_LEN,
        PNG_CHUNK_HEADER_LEN, PNG_IDAT_TYPE, ZLIB_HEADER_LEN,
    },
    safety_check, DecodeOptions, FpngDecodeError, FpngDecodeTables,
};
use log::debug;

/*
 * The zlib stream of an fpng file: 'src' runs from the first byte of the IDAT
 * data to the end of the file, so the bitstream can read ahead into the chunk
 * CRC and the IEND chunk; only the first 'zlib_len' bytes belong to the
 * stream.
 */
pub struct FpngPayload<'a> {
    pub src: &'a [u8],
    pub zlib_len: usize,
}

impl FpngPayload<'_> {
    /* BTYPE of the first DEFLATE block, right after the zlib header */
    pub fn first_block_is_stored(&self) -> bool {
        self.src
            .get(ZLIB_HEADER_LEN)
            .map_or(false, |&header| (header >> 1) & 3 == 0)
    }
}

/*
 * fpng writes its IDAT chunk at a fixed offset and nothing but IEND after it,
 * so the payload is found without walking the chunk list.  Any other layout
 * fails the length and type checks.
 */
pub fn locate_fpng_payload(
    image: &[u8],
    verify_chunk_crc: bool,
) -> Result<FpngPayload<'_>, FpngDecodeError> {
    safety_check!(image.len() >= FPNG_FILE_OVERHEAD + FPNG_MIN_ZLIB_LEN);

    let idat_len = image.len() - FPNG_FILE_OVERHEAD;
    let chunk = &image[FPNG_IDAT_CHUNK_OFFSET..];

    let chunk_len = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    safety_check!(chunk_len as usize == idat_len);
    safety_check!(chunk[4..PNG_CHUNK_HEADER_LEN] == PNG_IDAT_TYPE);

    if verify_chunk_crc {
        /* The CRC covers the chunk type and data */
        let crc_offset = PNG_CHUNK_HEADER_LEN + idat_len;
        let crc = &chunk[crc_offset..(crc_offset + PNG_CHUNK_CRC_LEN)];
        let stored_crc = u32::from_be_bytes([crc[0], crc[1], crc[2], crc[3]]);
        safety_check!(crc32fast::hash(&chunk[4..crc_offset]) == stored_crc);
    }

    Ok(FpngPayload {
        src: &chunk[PNG_CHUNK_HEADER_LEN..],
        zlib_len: idat_len,
    })
}

fn decode_payload(
    tables: &mut FpngDecodeTables,
    image: &[u8],
    out: &mut [u8],
    width: usize,
    height: usize,
    options: &DecodeOptions,
) -> Result<(), FpngDecodeError> {
    let payload = locate_fpng_payload(image, options.verify_chunk_crc)?;

    if options.allow_stored_blocks && payload.first_block_is_stored() {
        decode_stored_blocks(
            payload.src,
            payload.zlib_len,
            out,
            width,
            height,
            FPNG_CHANNELS,
            FPNG_CHANNELS,
        )
    } else {
        fpng_pixel_zlib_decompress_3(
            tables,
            payload.src,
            payload.zlib_len,
            out,
            width,
            height,
            options.speculative_decode,
        )
    }
}

/*
 * Decode a whole PNG file written by fpng into 3 byte/pixel RGB scanlines.
 * 'out' must hold exactly width * height * 3 bytes.
 *
 * FpngDecodeError::NotFpng means the file was not written by fpng (or is
 * corrupted), and should be decoded with a general purpose PNG reader; the
 * contents of 'out' are then unspecified.
 */
pub fn fpng_decode_memory(
    tables: &mut FpngDecodeTables,
    image: &[u8],
    out: &mut [u8],
    width: u32,
    height: u32,
    options: &DecodeOptions,
) -> Result<(), FpngDecodeError> {
    let (width, height) = (width as usize, height as usize);
    let out_len = width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(FPNG_CHANNELS));
    if image.is_empty() || width == 0 || height == 0 || out_len != Some(out.len()) {
        return Err(FpngDecodeError::InvalidArg);
    }

    decode_payload(tables, image, out, width, height, options).map_err(|_| {
        debug!(
            "{}x{} image ({} bytes) is not an fpng stream, a general purpose decoder is needed",
            width,
            height,
            image.len()
        );
        FpngDecodeError::NotFpng
    })
}
