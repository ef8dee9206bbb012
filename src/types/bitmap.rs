/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Compact, bit-indexed sets of positions in an ordered [`ValidatorSet`](super::validator_set::ValidatorSet).
//!
//! Bit `i` lives in byte `i / 8`, at bit offset `i % 8` (least significant bit first). The bitmap only
//! grows as far as its highest set bit, so an empty bitmap serializes to an empty byte vector.

use borsh::{BorshDeserialize, BorshSerialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct Bitmap(Vec<u8>);

impl Bitmap {
    /// Create an empty `Bitmap`.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create a `Bitmap` from its raw byte representation.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the raw byte representation of this `Bitmap`.
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// Set bit `index`, growing the bitmap if necessary.
    pub fn set(&mut self, index: usize) {
        let byte = index / 8;
        if byte >= self.0.len() {
            self.0.resize(byte + 1, 0);
        }
        self.0[byte] |= 1 << (index % 8);
    }

    /// Check whether bit `index` is set. Bits beyond the end of the bitmap are unset.
    pub fn is_set(&self, index: usize) -> bool {
        match self.0.get(index / 8) {
            Some(byte) => byte & (1 << (index % 8)) != 0,
            None => false,
        }
    }

    /// Number of bits this bitmap can address without growing.
    pub fn capacity(&self) -> usize {
        self.0.len() * 8
    }

    /// Count the set bits.
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|byte| byte.count_ones() as usize).sum()
    }

    /// Check whether no bits are set.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }

    /// Iterate through the indices of the set bits, in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.capacity()).filter(move |index| self.is_set(*index))
    }
}

impl FromIterator<usize> for Bitmap {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut bitmap = Bitmap::new();
        for index in iter {
            bitmap.set(index);
        }
        bitmap
    }
}
