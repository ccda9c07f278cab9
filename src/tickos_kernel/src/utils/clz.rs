//! Count leading zeros
#![allow(clippy::if_same_then_else)]

const USIZE_BITS: u32 = usize::BITS;

#[allow(clippy::needless_bool)]
const HAS_CLZ: bool = if cfg!(target_arch = "riscv32") || cfg!(target_arch = "riscv64") {
    cfg!(target_feature = "zbb") || cfg!(target_feature = "b")
} else if cfg!(target_arch = "arm") {
    // Thumb-2
    cfg!(target_feature = "v6t2")
        // Armv5T and later, only in Arm mode
        || (cfg!(target_feature = "v5te") && !cfg!(target_feature = "thumb-mode"))
} else if cfg!(target_arch = "msp430") || cfg!(target_arch = "avr") {
    false
} else {
    // AArch64: All
    // x86: 80386 and later (`bsr`)
    true
};

/// Indicates whether the target includes a 32-bit barrel shifter.
#[allow(clippy::needless_bool)]
const HAS_SHIFTER: bool = if cfg!(target_arch = "msp430") {
    false
} else if cfg!(target_arch = "avr") {
    false
} else {
    true
};

/// Indicates whether an array-based look-up table would be faster than other
/// techniques.
///
/// Small microcontrollers usually have a low-latency memory system and a
/// single-issue in-order pipeline, so loading one LUT entry beats a chain of
/// bit manipulation instructions.
#[allow(clippy::needless_bool)]
const HAS_FAST_LOAD: bool =
    if cfg!(target_arch = "arm") || cfg!(target_arch = "msp430") || cfg!(target_arch = "avr") {
        true
    } else {
        false
    };

/// Return the number of leading zeros in `x` (`< 1 << BITS`), counted over
/// the full width of `usize`. Returns `usize::BITS` if `x` is zero.
///
/// The index of the most significant set bit is
/// `usize::BITS - 1 - leading_zeros::<BITS>(x)`.
#[inline]
pub fn leading_zeros<const BITS: usize>(x: usize) -> u32 {
    if BITS == 0 {
        USIZE_BITS
    } else if BITS == 1 {
        if x == 0 {
            USIZE_BITS
        } else {
            USIZE_BITS - 1
        }
    } else if HAS_CLZ {
        x.leading_zeros()
    } else if BITS <= 4 && HAS_FAST_LOAD {
        clz_array_lut::<16>(x)
    } else if BITS <= 8 && HAS_FAST_LOAD {
        clz_array_lut::<256>(x)
    } else if BITS <= 32 && HAS_SHIFTER {
        clz_bsearch32::<BITS>(x)
    } else if BITS > 32 {
        // Use LLVM's emulation code
        x.leading_zeros()
    } else {
        clz_linear::<BITS>(x)
    }
}

/// Implements [`leading_zeros`] using an array-based look-up table.
#[inline]
fn clz_array_lut<const LEN: usize>(x: usize) -> u32 {
    struct Lut<const LEN: usize>;
    trait LutTrait {
        const LUT: &'static [u8];
    }
    impl<const LEN: usize> LutTrait for Lut<LEN> {
        const LUT: &'static [u8] = &{
            let mut array = [0u8; LEN];
            // `for` is unusable in `const fn`
            let mut i = 0;
            while i < array.len() {
                array[i] = i.leading_zeros() as u8;
                i += 1;
            }
            array
        };
    }

    let lut = Lut::<LEN>::LUT;
    lut[x & (lut.len() - 1)] as u32
}

/// Packed 2-bit entries holding the index of the most significant set bit of
/// `1..16`.
const MSB4_LUT: u32 = {
    let mut lut = 0u32;
    let mut i = 1;
    while i < 16 {
        lut |= (31 - (i as u32).leading_zeros()) << (i * 2);
        i += 1;
    }
    lut
};

/// Get the index of the most significant set bit of `x`.
/// `x` must be in range `1..16`.
#[inline]
fn msb4_lut_nonzero(x: u32) -> u32 {
    debug_assert!(x < 16 && x != 0);
    (MSB4_LUT >> (x * 2)) & 0b11
}

/// Implements [`leading_zeros`] using linear search from the most significant
/// position.
#[inline]
fn clz_linear<const BITS: usize>(x: usize) -> u32 {
    for i in (0..BITS as u32).rev() {
        if x & (1 << i) != 0 {
            return USIZE_BITS - 1 - i;
        }
    }
    USIZE_BITS
}

/// Implements [`leading_zeros`] using binary search. The last level
/// is handled by [`msb4_lut_nonzero`].
///
/// `BITS` must be less than or equal to 32.
#[inline]
fn clz_bsearch32<const BITS: usize>(x: usize) -> u32 {
    debug_assert!(BITS <= 32);
    let mut x = x as u32;

    if x == 0 {
        return USIZE_BITS;
    }

    let mut i = 0;

    if BITS > 16 && (x >> 16) != 0 {
        x >>= 16;
        i += 16;
    }

    if BITS > 8 && (x >> 8) != 0 {
        x >>= 8;
        i += 8;
    }

    if BITS > 4 && (x >> 4) != 0 {
        x >>= 4;
        i += 4;
    }

    i += msb4_lut_nonzero(x);

    USIZE_BITS - 1 - i
}
