//! The per-site multiset of pending molecule values.

use crate::molecule::Instance;

/// One value held in the bag, tagged with a site-unique sequence id so that
/// removal targets an exact occurrence.
pub(crate) struct Stored {
    pub(crate) seq: u64,
    pub(crate) value: Instance,
}

/// A multiset of molecule values, keyed by site-local molecule index.
///
/// The bag is owned by its site and mutated only under the site's scheduling
/// lock. It is not a queue: no ordering is guaranteed among the values of one
/// molecule.
pub(crate) struct Bag {
    entries: Vec<Vec<Stored>>,
    next_seq: u64,
}

impl Bag {
    pub(crate) fn new(molecule_count: usize) -> Self {
        Self {
            entries: (0..molecule_count).map(|_| Vec::new()).collect(),
            next_seq: 0,
        }
    }

    /// Adds one value and returns its sequence id.
    pub(crate) fn add(&mut self, molecule: usize, value: Instance) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries[molecule].push(Stored { seq, value });
        seq
    }

    /// Removes one exact occurrence, if still present.
    pub(crate) fn remove(&mut self, molecule: usize, seq: u64) -> Option<Instance> {
        let entries = &mut self.entries[molecule];
        let position = entries.iter().position(|stored| stored.seq == seq)?;
        Some(entries.swap_remove(position).value)
    }

    /// The values currently held for one molecule.
    pub(crate) fn values(&self, molecule: usize) -> &[Stored] {
        &self.entries[molecule]
    }

    pub(crate) fn count(&self, molecule: usize) -> usize {
        self.entries[molecule].len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.iter().all(Vec::is_empty)
    }

    /// Iterates over all values, molecule by molecule.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &Stored)> {
        self.entries
            .iter()
            .enumerate()
            .flat_map(|(molecule, entries)| entries.iter().map(move |stored| (molecule, stored)))
    }
}
