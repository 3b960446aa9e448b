use std::ops::{Index, IndexMut};

/// Fixed size lookup array indexed by raw bit patterns.
///
/// `N` must be a power of two: every index is masked with `N - 1`, so a lookup
/// keyed by the low bits of the bit buffer can never go out of bounds and the
/// compiler can drop the bounds check from the hot loop.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MaskedArray<T, const N: usize>(pub [T; N]);

impl<T: Default + Copy, const N: usize> Default for MaskedArray<T, N> {
    fn default() -> Self {
        Self([T::default(); N])
    }
}

impl<T, const N: usize> MaskedArray<T, N> {
    const MASK: usize = {
        assert!(N.is_power_of_two());
        N - 1
    };

    pub fn fill(&mut self, value: T)
    where
        T: Copy,
    {
        self.0.fill(value);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }
}

impl<T, const N: usize> Index<usize> for MaskedArray<T, N> {
    type Output = T;

    #[inline(always)]
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index & Self::MASK]
    }
}

impl<T, const N: usize> IndexMut<usize> for MaskedArray<T, N> {
    #[inline(always)]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index & Self::MASK]
    }
}
