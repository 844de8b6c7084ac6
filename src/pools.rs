//! Per-category queues of unassigned records.
//!
//! A pool holds row indices into one modality table, grouped by the record's
//! category label. Assignment pops from the front of a queue, so a record can
//! be handed out at most once.

use indexmap::IndexMap;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct CategoryPools {
    pools: IndexMap<String, VecDeque<usize>>,
}

impl CategoryPools {
    /// Groups row positions by label. Categories keep first-appearance order
    /// and rows keep table order inside a category.
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut pools: IndexMap<String, VecDeque<usize>> = IndexMap::new();
        for (index, label) in labels.into_iter().enumerate() {
            match pools.get_mut(label) {
                Some(queue) => queue.push_back(index),
                None => {
                    pools.insert(label.to_string(), VecDeque::from([index]));
                }
            }
        }
        Self { pools }
    }

    /// Takes the next record of a category, if the category exists and has
    /// records left.
    pub fn pop(&mut self, category: &str) -> Option<usize> {
        self.pools.get_mut(category).and_then(|q| q.pop_front())
    }

    /// Picks a non-empty category uniformly at random and takes its next record.
    pub fn pop_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<usize> {
        let available: Vec<usize> = self
            .pools
            .values()
            .enumerate()
            .filter(|(_, q)| !q.is_empty())
            .map(|(i, _)| i)
            .collect();
        let chosen = *available.choose(rng)?;
        self.pools
            .get_index_mut(chosen)
            .and_then(|(_, q)| q.pop_front())
    }

    pub fn has_remaining(&self) -> bool {
        self.pools.values().any(|q| !q.is_empty())
    }

    pub fn remaining(&self) -> usize {
        self.pools.values().map(VecDeque::len).sum()
    }
}

/// Groups row positions by an ordered key and flattens them back in key
/// order, rows in table order within a key.
pub fn flatten_sorted_groups<K: Ord>(keys: impl IntoIterator<Item = K>) -> Vec<usize> {
    let mut groups: BTreeMap<K, Vec<usize>> = BTreeMap::new();
    for (index, key) in keys.into_iter().enumerate() {
        groups.entry(key).or_default().push(index);
    }
    groups.into_values().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn pops_in_table_order_within_category() {
        let mut pools = CategoryPools::from_labels(["a", "b", "a", "a"]);
        assert_eq!(pools.pop("a"), Some(0));
        assert_eq!(pools.pop("a"), Some(2));
        assert_eq!(pools.pop("a"), Some(3));
        assert_eq!(pools.pop("a"), None);
        assert_eq!(pools.pop("missing"), None);
        assert_eq!(pools.remaining(), 1);
    }

    #[test]
    fn remaining_counts_every_category() {
        let mut pools = CategoryPools::from_labels(["torn", "no_damage", "torn", "dented"]);
        assert_eq!(pools.remaining(), 4);
        assert_eq!(pools.pop("torn"), Some(0));
        assert_eq!(pools.pop("dented"), Some(3));
        assert_eq!(pools.remaining(), 2);
    }

    #[test]
    fn pop_random_drains_every_record_once() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut pools = CategoryPools::from_labels(["x", "y", "y", "z", "x"]);
        let mut seen = Vec::new();
        while let Some(index) = pools.pop_random(&mut rng) {
            seen.push(index);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(!pools.has_remaining());
    }

    #[test]
    fn flatten_sorted_groups_orders_by_key() {
        let flattened = flatten_sorted_groups(["b", "a", "b", "a", "c"]);
        assert_eq!(flattened, vec![1, 3, 0, 2, 4]);
    }
}
