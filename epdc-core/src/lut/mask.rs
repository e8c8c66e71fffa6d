//! Fixed-width LUT bit-set
//!
//! Controllers expose up to 64 LUTs as a pair of 32-bit status words. All
//! bit arithmetic over those words lives here.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest LUT count any controller revision exposes
pub const MAX_LUTS: usize = 64;

/// LUT index in `[0, MAX_LUTS)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Lut(u8);

impl Lut {
    /// LUT reserved for the initialization full refresh
    pub const INIT: Lut = Lut(0);

    /// Create a LUT index, or `None` if out of range
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < MAX_LUTS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Raw index
    pub const fn index(self) -> u8 {
        self.0
    }

    const fn bit(self) -> u64 {
        1u64 << self.0
    }
}

/// Set of LUTs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LutMask(u64);

impl LutMask {
    /// No LUTs
    pub const EMPTY: LutMask = LutMask(0);

    /// Build from raw bits
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Build from the low and high 32-bit status words
    pub const fn from_words(low: u32, high: u32) -> Self {
        Self((low as u64) | ((high as u64) << 32))
    }

    /// Mask containing LUTs `0..width`
    pub const fn first(width: u8) -> Self {
        if width as usize >= MAX_LUTS {
            Self(u64::MAX)
        } else {
            Self((1u64 << width) - 1)
        }
    }

    /// Mask containing a single LUT
    pub const fn single(lut: Lut) -> Self {
        Self(lut.bit())
    }

    /// Raw bits
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Low status word (LUTs 0-31)
    pub const fn low(self) -> u32 {
        self.0 as u32
    }

    /// High status word (LUTs 32-63)
    pub const fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn set(&mut self, lut: Lut) {
        self.0 |= lut.bit();
    }

    pub fn clear(&mut self, lut: Lut) {
        self.0 &= !lut.bit();
    }

    pub const fn contains(self, lut: Lut) -> bool {
        self.0 & lut.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub const fn union(self, other: LutMask) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: LutMask) -> Self {
        Self(self.0 & other.0)
    }

    /// LUTs in `self` that are not in `other`
    pub const fn without(self, other: LutMask) -> Self {
        Self(self.0 & !other.0)
    }

    /// Whether every LUT in `self` is also in `other`
    pub const fn is_subset_of(self, other: LutMask) -> bool {
        self.0 & !other.0 == 0
    }

    /// Restrict to LUTs `0..width`
    pub const fn truncate(self, width: u8) -> Self {
        Self(self.0 & LutMask::first(width).0)
    }

    /// Lowest LUT not in the set, within `0..width`
    pub fn first_zero(self, width: u8) -> Option<Lut> {
        let free = !self.0 & LutMask::first(width).0;
        if free == 0 {
            None
        } else {
            Lut::new(free.trailing_zeros() as u8)
        }
    }

    /// Highest LUT in the set
    pub fn highest(self) -> Option<Lut> {
        if self.0 == 0 {
            None
        } else {
            Lut::new((63 - self.0.leading_zeros()) as u8)
        }
    }

    /// Iterate LUTs in ascending order
    pub fn iter(self) -> LutIter {
        LutIter(self.0)
    }
}

impl core::ops::BitOr for LutMask {
    type Output = LutMask;

    fn bitor(self, rhs: LutMask) -> LutMask {
        self.union(rhs)
    }
}

impl FromIterator<Lut> for LutMask {
    fn from_iter<I: IntoIterator<Item = Lut>>(iter: I) -> Self {
        let mut mask = LutMask::EMPTY;
        for lut in iter {
            mask.set(lut);
        }
        mask
    }
}

/// Ascending iterator over a [`LutMask`]
#[derive(Debug, Clone)]
pub struct LutIter(u64);

impl Iterator for LutIter {
    type Item = Lut;

    fn next(&mut self) -> Option<Lut> {
        if self.0 == 0 {
            return None;
        }
        let index = self.0.trailing_zeros() as u8;
        self.0 &= self.0 - 1;
        Lut::new(index)
    }
}

/// Submission order recorded per active LUT
///
/// Zero means the LUT carries no update. Used to discard collisions against
/// updates that are newer than the one being resolved.
#[derive(Debug, Clone)]
pub struct LutOrders([u64; MAX_LUTS]);

impl LutOrders {
    pub const fn new() -> Self {
        Self([0; MAX_LUTS])
    }

    /// Record the order of the update submitted on `lut`
    pub fn record(&mut self, lut: Lut, order: u64) {
        if let Some(slot) = self.0.get_mut(lut.index() as usize) {
            *slot = order;
        }
    }

    /// Forget the update on `lut`
    pub fn release(&mut self, lut: Lut) {
        self.record(lut, 0);
    }

    pub fn get(&self, lut: Lut) -> u64 {
        self.0.get(lut.index() as usize).copied().unwrap_or(0)
    }
}

impl Default for LutOrders {
    fn default() -> Self {
        Self::new()
    }
}
