//! Insertion-ordered helper sets.

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

use crate::HelperId;

/// An ordered set of helper identifiers.
///
/// Iteration order is insertion order, which is the order helper bodies
/// and their forward declarations are emitted in. Re-inserting an
/// existing identifier keeps its first position.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HelperSet {
    ids: IndexSet<HelperId, FxBuildHasher>,
}

impl HelperSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an identifier; returns `false` if it was already present.
    pub fn insert(&mut self, id: HelperId) -> bool {
        self.ids.insert(id)
    }

    pub fn extend(&mut self, ids: impl IntoIterator<Item = HelperId>) {
        for id in ids {
            self.insert(id);
        }
    }

    /// Remove an identifier, keeping the order of the others.
    pub fn remove(&mut self, id: &HelperId) -> bool {
        self.ids.shift_remove(id)
    }

    #[inline]
    pub fn contains(&self, id: &HelperId) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HelperId> + '_ {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Textual helper names in set order.
    pub fn names(&self) -> Vec<String> {
        self.ids.iter().map(ToString::to_string).collect()
    }
}

impl std::fmt::Debug for HelperSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ids.iter()).finish()
    }
}

impl FromIterator<HelperId> for HelperSet {
    fn from_iter<I: IntoIterator<Item = HelperId>>(iter: I) -> Self {
        let mut set = HelperSet::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a HelperSet {
    type Item = &'a HelperId;
    type IntoIter = indexmap::set::Iter<'a, HelperId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}
