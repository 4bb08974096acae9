//! Content-addressed genome ids.
//!
//! Genomes are identified by the content of their bin array. The registry
//! keeps a 128 bit digest per distinct genome and hands out dense ids in order
//! of first appearance.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::{DefaultHasher, Hash, Hasher};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ContentHash(u128);

impl ContentHash {
    fn of(bins: &[u8]) -> Self {
        let mut lower = DefaultHasher::new();
        bins.hash(&mut lower);
        let mut upper = DefaultHasher::new();
        0x9e37_79b9_7f4a_7c15u64.hash(&mut upper);
        bins.hash(&mut upper);
        Self(((upper.finish() as u128) << 64) | lower.finish() as u128)
    }
}

#[derive(Debug, Default)]
pub struct GenomeRegistry {
    ids: HashMap<ContentHash, usize>,
}

impl GenomeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id of a genome and whether it was seen for the first time.
    pub fn resolve(&mut self, bins: &[u8]) -> (usize, bool) {
        let next_id = self.ids.len();
        match self.ids.entry(ContentHash::of(bins)) {
            Entry::Occupied(entry) => (*entry.get(), false),
            Entry::Vacant(entry) => {
                entry.insert(next_id);
                (next_id, true)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_shares_id() {
        let mut registry = GenomeRegistry::new();
        assert_eq!(registry.resolve(&[0, 0, 1]), (0, true));
        assert_eq!(registry.resolve(&[0, 1, 1]), (1, true));
        assert_eq!(registry.resolve(&[0, 0, 1]), (0, false));
        assert_eq!(registry.len(), 2);
    }
}
