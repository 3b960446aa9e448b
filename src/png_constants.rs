/*
 * png_constants.rs - fixed layout of the PNG files written by fpng.
 *
 * fpng always writes: signature, IHDR, its private fdEC marker chunk, a single
 * IDAT chunk holding the whole zlib stream, and IEND.  The pixel payload can
 * therefore be located without walking the chunk list.
 */

pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/* Chunk framing: 4 byte length + 4 byte type before the data, 4 byte CRC after */
pub const PNG_CHUNK_HEADER_LEN: usize = 8;
pub const PNG_CHUNK_CRC_LEN: usize = 4;

pub const PNG_IHDR_DATA_LEN: usize = 13;
pub const PNG_IEND_CHUNK_LEN: usize = PNG_CHUNK_HEADER_LEN + PNG_CHUNK_CRC_LEN;

pub const FPNG_FDEC_DATA: [u8; 5] = [82, 36, 147, 227, 0];

/* Offset of the IDAT chunk (its length field) from the start of the file */
pub const FPNG_IDAT_CHUNK_OFFSET: usize = PNG_SIGNATURE.len()
    + (PNG_CHUNK_HEADER_LEN + PNG_IHDR_DATA_LEN + PNG_CHUNK_CRC_LEN)
    + (PNG_CHUNK_HEADER_LEN + FPNG_FDEC_DATA.len() + PNG_CHUNK_CRC_LEN);

/* Everything in the file that is not IDAT data */
pub const FPNG_FILE_OVERHEAD: usize =
    FPNG_IDAT_CHUNK_OFFSET + PNG_CHUNK_HEADER_LEN + PNG_CHUNK_CRC_LEN + PNG_IEND_CHUNK_LEN;

pub const PNG_IDAT_TYPE: [u8; 4] = *b"IDAT";

/* zlib header: CM = 8 (deflate), CINFO = 7, FLEVEL = 0, no dictionary */
pub const ZLIB_CMF: u8 = 0x78;
pub const ZLIB_FLG: u8 = 0x01;
pub const ZLIB_HEADER_LEN: usize = 2;
pub const ZLIB_ADLER32_LEN: usize = 4;

/* Smallest zlib stream fpng can emit: header, one block, adler32 */
pub const FPNG_MIN_ZLIB_LEN: usize = 7;

/* Scanline filter types */
pub const PNG_FILTER_NONE: u16 = 0;
pub const PNG_FILTER_UP: u16 = 2;

const_assert!(FPNG_IDAT_CHUNK_OFFSET == 50);
const_assert!(FPNG_FILE_OVERHEAD == 50 + 24);
