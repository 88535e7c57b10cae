//! Power-of-two bucketed histograms over non-negative integers.
//!
//! This module provides [`LogarithmicHistogram`], an immutable histogram where
//! bin `i` covers the half-open range `[2^i, 2^(i+1))` and bin 0 covers `{0, 1}`.
//! Values beyond the last bin saturate into it.
//!
//! ```text
//!   bin:     0      1      2       3        4         ...   BINS-1
//!   range: [0,1]  [2,3]  [4,7]  [8,15]  [16,31]       ...   [2^(BINS-1), ∞)
//! ```
//!
//! Two widths are in common use:
//!
//! | Alias | Bins | Covers |
//! |-------|------|--------|
//! | [`LogarithmicHistogram32`] | 31 | every non-negative `i32` |
//! | [`LogarithmicHistogram64`] | 63 | every non-negative `i64` |
//!
//! # Examples
//!
//! ```rust
//! use hedron_instrument::histogram::LogarithmicHistogram32;
//!
//! let histogram = LogarithmicHistogram32::new()
//!     .accumulate(0)
//!     .accumulate(5)
//!     .accumulate(7);
//!
//! assert_eq!(histogram.bin(0), 1);
//! assert_eq!(histogram.bin(2), 2);
//! assert_eq!(histogram.to_string(), "0-1:1; 4-7:2");
//! ```

use std::fmt::{self, Debug, Display};

use num_traits::ToPrimitive;

/// Histogram wide enough for every non-negative `i32`.
pub type LogarithmicHistogram32 = LogarithmicHistogram<31>;

/// Histogram wide enough for every non-negative `i64`.
pub type LogarithmicHistogram64 = LogarithmicHistogram<63>;

/// An immutable histogram with `BINS` power-of-two bins.
///
/// Every mutating operation returns a new histogram and leaves `self`
/// untouched, so instances can be shared freely between threads and swapped
/// atomically as part of a larger snapshot.
///
/// `BINS` must be in `1..=64`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LogarithmicHistogram<const BINS: usize> {
    bins: [u64; BINS],
}

impl<const BINS: usize> LogarithmicHistogram<BINS> {
    /// Creates an empty histogram.
    pub const fn new() -> Self {
        Self { bins: [0; BINS] }
    }

    /// Returns the index of the bin that `value` falls into.
    ///
    /// `0` and `1` both map to bin 0; anything at or above `2^(BINS-1)`
    /// saturates into the last bin.
    #[inline]
    pub fn bin_index(value: u64) -> usize {
        if value <= 1 {
            return 0;
        }
        (value.ilog2() as usize).min(BINS - 1)
    }

    /// Returns the inclusive `(low, high)` range covered by bin `index`.
    ///
    /// The last bin reports `2^BINS - 1` as its upper bound even though
    /// larger values saturate into it.
    pub fn bin_range(index: usize) -> (u64, u64) {
        if index == 0 {
            return (0, 1);
        }
        let low = 1u64 << index;
        let high = u32::try_from(index + 1)
            .ok()
            .and_then(|shift| 1u64.checked_shl(shift))
            .map_or(u64::MAX, |next| next - 1);
        (low, high)
    }

    /// Returns a new histogram with one more sample of `value`.
    ///
    /// Negative inputs count as zero; inputs too large for `u64` saturate.
    #[must_use]
    pub fn accumulate(&self, value: impl ToPrimitive) -> Self {
        self.accumulate_n(value, 1)
    }

    /// Returns a new histogram with `count` more samples of `value`.
    ///
    /// Equivalent to calling [`accumulate`](Self::accumulate) `count` times,
    /// without the intermediate copies.
    #[must_use]
    pub fn accumulate_n(&self, value: impl ToPrimitive, count: u64) -> Self {
        let mut next = self.clone();
        if count > 0 {
            let index = Self::bin_index(magnitude(&value));
            next.bins[index] = next.bins[index].saturating_add(count);
        }
        next
    }

    /// Returns a new histogram holding the samples of both `self` and `other`.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut next = self.clone();
        for (bin, extra) in next.bins.iter_mut().zip(other.bins.iter()) {
            *bin = bin.saturating_add(*extra);
        }
        next
    }

    /// Returns the number of samples in bin `index`, or `0` if out of range.
    pub fn bin(&self, index: usize) -> u64 {
        self.bins.get(index).copied().unwrap_or(0)
    }

    /// Returns all bin counts, lowest bin first.
    pub fn bins(&self) -> &[u64; BINS] {
        &self.bins
    }

    /// Returns the total number of samples accumulated into this histogram.
    pub fn total_count(&self) -> u64 {
        self.bins.iter().fold(0u64, |acc, n| acc.saturating_add(*n))
    }

    /// Returns `true` if no sample was ever accumulated.
    pub fn is_unused(&self) -> bool {
        self.bins.iter().all(|n| *n == 0)
    }

    /// Iterates over the non-empty bins as `(low, high, count)`, ascending.
    pub fn ranges(&self) -> impl Iterator<Item = (u64, u64, u64)> + '_ {
        self.bins
            .iter()
            .enumerate()
            .filter(|(_, count)| **count != 0)
            .map(|(index, count)| {
                let (low, high) = Self::bin_range(index);
                (low, high, *count)
            })
    }
}

fn magnitude(value: &impl ToPrimitive) -> u64 {
    match value.to_u64() {
        Some(v) => v,
        None if value.to_i128().is_some_and(|v| v < 0) => 0,
        None => u64::MAX,
    }
}

impl<const BINS: usize> Default for LogarithmicHistogram<BINS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const BINS: usize> Display for LogarithmicHistogram<BINS> {
    /// Formats the non-empty bins as `low-high:count`, joined by `"; "`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (low, high, count)) in self.ranges().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{low}-{high}:{count}")?;
        }
        Ok(())
    }
}

impl<const BINS: usize> Debug for LogarithmicHistogram<BINS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogarithmicHistogram<{BINS}>{{ {self} }}")
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::LogarithmicHistogram;
    use serde::de::{Deserializer, Error};
    use serde::ser::Serializer;
    use serde::{Deserialize, Serialize};

    // Serialized as the plain list of bin counts; serde's array support stops at 32.
    impl<const BINS: usize> Serialize for LogarithmicHistogram<BINS> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            self.bins.as_slice().serialize(serializer)
        }
    }

    impl<'de, const BINS: usize> Deserialize<'de> for LogarithmicHistogram<BINS> {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let counts = Vec::<u64>::deserialize(deserializer)?;
            let bins: [u64; BINS] = counts
                .try_into()
                .map_err(|v: Vec<u64>| D::Error::invalid_length(v.len(), &"one count per bin"))?;
            Ok(Self { bins })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_is_unused() {
        let histogram = LogarithmicHistogram32::new();
        assert!(histogram.is_unused());
        assert_eq!(histogram.total_count(), 0);
        assert_eq!(histogram.to_string(), "");
    }

    #[test]
    fn test_zero_and_one_share_bin_zero() {
        let histogram = LogarithmicHistogram32::new().accumulate(0).accumulate(1);
        assert_eq!(histogram.bin(0), 2);
        assert_eq!(histogram.total_count(), 2);
    }

    #[test]
    fn test_power_of_two_boundaries() {
        let histogram = LogarithmicHistogram32::new()
            .accumulate(2)
            .accumulate(3)
            .accumulate(4)
            .accumulate(1023)
            .accumulate(1024);
        assert_eq!(histogram.bin(1), 2);
        assert_eq!(histogram.bin(2), 1);
        assert_eq!(histogram.bin(9), 1);
        assert_eq!(histogram.bin(10), 1);
    }

    #[test]
    fn test_accumulate_leaves_original_untouched() {
        let empty = LogarithmicHistogram32::new();
        let one = empty.accumulate(42);
        assert!(empty.is_unused());
        assert!(!one.is_unused());
    }

    #[test]
    fn test_saturation_into_last_bin() {
        let histogram = LogarithmicHistogram32::new()
            .accumulate(i32::MAX)
            .accumulate(i64::MAX)
            .accumulate(u64::MAX)
            .accumulate(u128::MAX);
        assert_eq!(histogram.bin(30), 4);
        assert_eq!(histogram.total_count(), 4);
    }

    #[test]
    fn test_saturation_64() {
        let histogram = LogarithmicHistogram64::new()
            .accumulate(i64::MAX)
            .accumulate(u64::MAX);
        assert_eq!(histogram.bin(62), 2);
    }

    #[test]
    fn test_negative_counts_as_zero() {
        let histogram = LogarithmicHistogram32::new().accumulate(-17i64);
        assert_eq!(histogram.bin(0), 1);
    }

    #[test]
    fn test_accumulate_n() {
        let histogram = LogarithmicHistogram32::new()
            .accumulate_n(0, 4)
            .accumulate_n(100, 0);
        assert_eq!(histogram.bin(0), 4);
        assert_eq!(histogram.total_count(), 4);
    }

    #[test]
    fn test_merge() {
        let a = LogarithmicHistogram32::new().accumulate(1).accumulate(8);
        let b = LogarithmicHistogram32::new().accumulate(9);
        let merged = a.merge(&b);
        assert_eq!(merged.bin(0), 1);
        assert_eq!(merged.bin(3), 2);
        assert_eq!(merged.total_count(), 3);
    }

    #[test]
    fn test_bin_range() {
        assert_eq!(LogarithmicHistogram32::bin_range(0), (0, 1));
        assert_eq!(LogarithmicHistogram32::bin_range(1), (2, 3));
        assert_eq!(LogarithmicHistogram32::bin_range(3), (8, 15));
        assert_eq!(
            LogarithmicHistogram32::bin_range(30),
            (1 << 30, i32::MAX as u64)
        );
        assert_eq!(
            LogarithmicHistogram64::bin_range(62),
            (1 << 62, i64::MAX as u64)
        );
    }

    #[test]
    fn test_display() {
        let histogram = LogarithmicHistogram32::new()
            .accumulate(1)
            .accumulate(12)
            .accumulate(13)
            .accumulate(300);
        assert_eq!(histogram.to_string(), "0-1:1; 8-15:2; 256-511:1");
    }

    #[test]
    fn test_debug() {
        let histogram = LogarithmicHistogram32::new().accumulate(3);
        let debug_str = format!("{:?}", histogram);
        assert!(debug_str.starts_with("LogarithmicHistogram<31>"));
        assert!(debug_str.contains("2-3:1"));
    }

    proptest! {
        #[test]
        fn test_value_lands_in_its_power_of_two_bin(index in 1usize..31, offset in any::<u64>()) {
            let low = 1u64 << index;
            let value = low + offset % low;
            let histogram = LogarithmicHistogram32::new().accumulate(value);
            prop_assert_eq!(histogram.bin(index), 1);
            prop_assert_eq!(histogram.total_count(), 1);
        }

        #[test]
        fn test_total_matches_accumulate_calls(values in proptest::collection::vec(any::<u32>(), 0..200)) {
            let histogram = values
                .iter()
                .fold(LogarithmicHistogram32::new(), |h, v| h.accumulate(*v));
            prop_assert_eq!(histogram.total_count(), values.len() as u64);
        }
    }
}
