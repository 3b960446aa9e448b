use crate::FpngDecodeError;
use nightly_quirks::branch_pred::unlikely;

type BitBufType = u64;

/*
 * Width of a single refill, in bits.  The input is consumed in little-endian
 * 32 bit words, so the bitbuffer must hold up to REFILL_BITS - 1 leftover
 * bits plus a whole word.
 */
const REFILL_BITS: u32 = 32;
const REFILL_BYTES: usize = (REFILL_BITS / 8) as usize;

const_assert!(8 * std::mem::size_of::<BitBufType>() >= 2 * REFILL_BITS as usize - 1);

/*
 * The maximum number of bits that can be consumed after a refilling operation
 * before the next one: every refilling operation leaves at least REFILL_BITS
 * bits in the buffer.
 */
pub const MAX_ENSURE: usize = REFILL_BITS as usize;

/*
 * Evaluates to true if 'n' bits can be consumed with the non-refilling
 * operations right after a refill.
 */
#[inline(always)]
pub const fn can_ensure(n: usize) -> bool {
    n <= MAX_ENSURE
}

#[cold]
#[inline]
fn cold_path() {}

/*
 * The state of the input bitstream consists of:
 *
 *	- data: the whole input buffer
 *
 *	- position: index of the next byte of 'data' not yet loaded
 *
 *	- bitbuf: bits that have been loaded from the input buffer but not
 *		  consumed yet.  The buffered bits are right-aligned (they're
 *		  the low-order bits).
 *
 *	- bitsleft: number of bits in 'bitbuf' that are valid.
 *
 * Refilling past the end of 'data' is an error, never a silent zero-fill: it
 * is how a truncated stream is detected.
 */
pub struct BitStream<'a> {
    data: &'a [u8],
    position: usize,
    bitbuf: BitBufType,
    bitsleft: u32,
}

impl<'a> BitStream<'a> {
    /// Starts reading `data` at byte `position`, loading the first word.
    pub fn new(data: &'a [u8], position: usize) -> Result<Self, FpngDecodeError> {
        let mut stream = Self {
            data,
            position,
            bitbuf: 0,
            bitsleft: 0,
        };
        stream.ensure_bits()?;
        Ok(stream)
    }

    #[inline(always)]
    pub fn bits_left(&self) -> usize {
        self.bitsleft as usize
    }

    #[inline(always)]
    pub fn byte_position(&self) -> usize {
        self.position
    }

    #[inline(always)]
    fn fill_word(&mut self) -> Result<(), FpngDecodeError> {
        let Some(word) = self
            .position
            .checked_add(REFILL_BYTES)
            .and_then(|end| self.data.get(self.position..end))
        else {
            cold_path();
            return Err(FpngDecodeError::NotFpng);
        };

        let word = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        self.bitbuf |= (word as BitBufType) << self.bitsleft;
        self.position += REFILL_BYTES;
        self.bitsleft += REFILL_BITS;
        Ok(())
    }

    /*
     * Make sure at least MAX_ENSURE bits are buffered, loading one more word
     * from the input if needed.
     */
    #[inline(always)]
    pub fn ensure_bits(&mut self) -> Result<(), FpngDecodeError> {
        if self.bitsleft < REFILL_BITS {
            self.fill_word()?;
        }
        Ok(())
    }

    /*
     * Return the next 'n' bits from the bitbuffer variable without removing them.
     */
    #[inline(always)]
    pub fn bits(&self, n: usize) -> u32 {
        debug_assert!(n <= MAX_ENSURE);
        (self.bitbuf & ((1 << n) - 1)) as u32
    }

    /*
     * Remove the next 'n' bits from the bitbuffer variable, without refilling.
     * The caller guarantees they are buffered.
     */
    #[inline(always)]
    pub fn remove_bits_no_refill(&mut self, n: usize) {
        debug_assert!(n as u32 <= self.bitsleft);
        self.bitbuf >>= n;
        self.bitsleft -= n as u32;
    }

    /*
     * Remove and return the next 'n' bits, without refilling.
     */
    #[inline(always)]
    pub fn pop_bits_no_refill(&mut self, n: usize) -> u32 {
        let tmp = self.bits(n);
        self.remove_bits_no_refill(n);
        tmp
    }

    /*
     * Remove the next 'n' bits, then refill.
     */
    #[inline(always)]
    pub fn remove_bits(&mut self, n: usize) -> Result<(), FpngDecodeError> {
        self.remove_bits_no_refill(n);
        self.ensure_bits()
    }

    /*
     * Remove and return the next 'n' bits, then refill.
     */
    #[inline(always)]
    pub fn pop_bits(&mut self, n: usize) -> Result<u32, FpngDecodeError> {
        let tmp = self.pop_bits_no_refill(n);
        self.ensure_bits()?;
        Ok(tmp)
    }

    /*
     * Discard the bits left in the current byte, then give back every whole
     * buffered byte: returns the index of the first input byte not consumed.
     * The bitstream must not be used afterwards.
     */
    #[inline(always)]
    pub fn align_input(&mut self) -> Result<usize, FpngDecodeError> {
        let align_bits = self.bitsleft & 7;
        self.remove_bits_no_refill(align_bits as usize);

        let buffered_bytes = (self.bitsleft / 8) as usize;
        if unlikely(self.position < buffered_bytes) {
            return Err(FpngDecodeError::NotFpng);
        }
        Ok(self.position - buffered_bytes)
    }
}
