// #![cfg_attr(debug_assertions, deny(warnings))]
pub mod bitstream;

pub mod decode_blocks;
pub mod decompress_pixels;
pub mod decompress_png;
mod decompress_utils;
mod deflate_constants;
pub mod masked_array;
pub mod pixel_format;
mod png_constants;

#[cfg(test)]
mod test_utils;

#[macro_use]
extern crate static_assertions;

pub use crate::decode_blocks::decode_stored_blocks;
pub use crate::decompress_png::fpng_decode_memory;
pub use crate::pixel_format::rgb888_to_rgb565;

use crate::decompress_pixels::FPNG_CHANNELS;
use crate::decompress_utils::DecodeTable;
use log::warn;
use thiserror::Error;

/*
 * Result of a failed call to fpng_decode_memory() or DecodeContext::decode().
 */
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpngDecodeError {
    /* The file was not written by fpng, or is corrupted: decode it with a
     * general purpose PNG reader instead.  */
    #[error("not an fpng-compatible stream")]
    NotFpng,

    /* Empty input, zero dimensions or a pixel buffer of the wrong size.  */
    #[error("invalid decoding arguments")]
    InvalidArg,

    /* DecodeContext::init() was never called.  */
    #[error("decoding tables were not initialized")]
    Uninitialized,
}

/*
 * Return FpngDecodeError::NotFpng from the enclosing function unless 'cond'
 * holds.  Every structural check of the decoder goes through here.
 */
#[macro_export]
macro_rules! safety_check {
    ($cond:expr) => {
        if !$cond {
            log::trace!("fpng check failed: {}", stringify!($cond));
            return Err($crate::FpngDecodeError::NotFpng);
        }
    };
}

/*
 * The decode tables.  They are rebuilt from the dynamic block header of every
 * image, so they only exist to avoid allocating them per call; they are too
 * large to comfortably live on the stack.
 */
#[derive(Clone, Default)]
pub struct FpngDecodeTables {
    pub(crate) precode_decode_table: DecodeTable,
    pub(crate) litlen_decode_table: DecodeTable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Pack a second literal into decode table entries when its codeword
    /// fits in the same lookup. Output is identical either way.
    pub speculative_decode: bool,
    /// Verify the CRC-32 of the IDAT chunk before decoding.
    pub verify_chunk_crc: bool,
    /// Accept images whose zlib stream is made of stored blocks.
    pub allow_stored_blocks: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            speculative_decode: true,
            verify_chunk_crc: false,
            allow_stored_blocks: true,
        }
    }
}

/// Decoder state: the decode tables plus the options used for every image.
///
/// A context is used by one thread at a time, since decoding rebuilds its
/// tables; run parallel decodes with one context per worker.
pub struct DecodeContext {
    tables: Option<Box<FpngDecodeTables>>,
    options: DecodeOptions,
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeContext {
    /// A context without tables: call [`DecodeContext::init`] before decoding.
    pub fn new() -> Self {
        Self::with_options(DecodeOptions::default())
    }

    pub fn with_options(options: DecodeOptions) -> Self {
        Self {
            tables: None,
            options,
        }
    }

    /// A context ready to decode.
    pub fn initialized() -> Self {
        let mut context = Self::new();
        context.init();
        context
    }

    /// Allocates the decode tables. Calling it again has no effect.
    pub fn init(&mut self) {
        if self.tables.is_some() {
            warn!("fpng decode tables are already initialized");
            return;
        }
        self.tables = Some(Box::default());
    }

    pub fn is_initialized(&self) -> bool {
        self.tables.is_some()
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: DecodeOptions) {
        self.options = options;
    }

    /// Decodes a whole fpng file into `out`, which must hold exactly
    /// `width * height * 3` bytes of RGB pixels.
    pub fn decode(
        &mut self,
        image: &[u8],
        out: &mut [u8],
        width: u32,
        height: u32,
    ) -> Result<(), FpngDecodeError> {
        let tables = self
            .tables
            .as_deref_mut()
            .ok_or(FpngDecodeError::Uninitialized)?;
        fpng_decode_memory(tables, image, out, width, height, &self.options)
    }

    pub fn decode_to_vec(
        &mut self,
        image: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, FpngDecodeError> {
        let out_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(FPNG_CHANNELS))
            .ok_or(FpngDecodeError::InvalidArg)?;
        let mut out = vec![0; out_len];
        self.decode(image, &mut out, width, height)?;
        Ok(out)
    }
}

pub fn fpng_alloc_decode_context() -> DecodeContext {
    DecodeContext::initialized()
}
