//! Provides `OneLevelPrioBitmapImpl`, a bit array structure supporting
//! constant-time search for the most significant set bit.
use core::fmt;

use super::{clz::leading_zeros, BinInteger, Init};

const USIZE_BITS: u32 = usize::BITS;

/// A priority bitmap that stores up to 8 entries.
pub type PrioBitmap8 = OneLevelPrioBitmapImpl<u8, 8>;
/// A priority bitmap that stores up to 16 entries.
pub type PrioBitmap16 = OneLevelPrioBitmapImpl<u16, 16>;
/// A priority bitmap that stores up to 32 entries.
pub type PrioBitmap32 = OneLevelPrioBitmapImpl<u32, 32>;
/// A priority bitmap that stores up to 64 entries.
pub type PrioBitmap64 = OneLevelPrioBitmapImpl<u64, 64>;
/// A priority bitmap that stores up to 128 entries.
pub type PrioBitmap128 = OneLevelPrioBitmapImpl<u128, 128>;

/// A bit array where each bit represents whether the priority level with
/// the same index has a Ready task.
///
/// All methods panic when the given bit position is out of range.
pub trait PrioBitmap: Init + Send + Sync + Clone + Copy + fmt::Debug + 'static {
    /// The number of entries.
    const LEN: usize;

    /// Get the bit at the specified position.
    fn get(&self, i: usize) -> bool;

    /// Clear the bit at the specified position.
    fn clear(&mut self, i: usize);

    /// Set the bit at the specified position.
    fn set(&mut self, i: usize);

    /// Get the position of the most significant set bit.
    fn find_highest_set(&self) -> Option<usize>;

    /// Return a flag indicating whether no bits are set.
    fn is_empty(&self) -> bool {
        self.find_highest_set().is_none()
    }
}

/// Stores `LEN` (≤ `T::BITS`) entries.
#[derive(Clone, Copy)]
pub struct OneLevelPrioBitmapImpl<T, const LEN: usize> {
    bits: T,
}

impl<T: BinInteger, const LEN: usize> Init for OneLevelPrioBitmapImpl<T, LEN> {
    const INIT: Self = Self { bits: T::INIT };
}

impl<T: BinInteger, const LEN: usize> fmt::Debug for OneLevelPrioBitmapImpl<T, LEN> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.bits.one_digits()).finish()
    }
}

impl<T: BinInteger, const LEN: usize> OneLevelPrioBitmapImpl<T, LEN> {
    #[inline]
    fn check_index(i: usize) {
        assert!(
            i < LEN && i < T::BITS as usize,
            "bit position {i} is out of range"
        );
    }
}

impl<T: BinInteger, const LEN: usize> PrioBitmap for OneLevelPrioBitmapImpl<T, LEN> {
    const LEN: usize = LEN;

    fn get(&self, i: usize) -> bool {
        Self::check_index(i);
        self.bits.get_bit(i as u32)
    }

    fn clear(&mut self, i: usize) {
        Self::check_index(i);
        self.bits.clear_bit(i as u32);
    }

    fn set(&mut self, i: usize) {
        Self::check_index(i);
        self.bits.set_bit(i as u32);
    }

    fn find_highest_set(&self) -> Option<usize> {
        match self.bits.to_usize() {
            Some(bits) if LEN <= USIZE_BITS as usize => {
                // Use an optimized version of `leading_zeros`
                let i = leading_zeros::<LEN>(bits);
                if i == USIZE_BITS {
                    None
                } else {
                    Some((USIZE_BITS - 1 - i) as usize)
                }
            }
            _ => {
                let i = self.bits.leading_zeros();
                if i == T::BITS {
                    None
                } else {
                    Some((T::BITS - 1 - i) as usize)
                }
            }
        }
    }
}
