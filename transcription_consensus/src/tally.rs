use log::debug;

use crate::config::Threshold;

/// Votes for a set of categories, in the order in which the categories were
/// first seen.
///
/// The order is part of the contract: when several categories reach the
/// threshold, the first one wins.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteTally<L> {
    entries: Vec<(L, u64)>,
}

impl<L: PartialEq> VoteTally<L> {
    pub fn new() -> VoteTally<L> {
        VoteTally {
            entries: Vec::new(),
        }
    }

    /// Builds a tally from a mapping, keeping its order. Duplicate labels are merged
    /// into the first occurrence.
    pub fn from_entries(entries: Vec<(L, u64)>) -> VoteTally<L> {
        let mut tally = VoteTally::new();
        for (label, count) in entries {
            tally.add(label, count);
        }
        tally
    }

    /// Counts the occurrences of each label.
    pub fn count<I: IntoIterator<Item = L>>(labels: I) -> VoteTally<L> {
        let mut tally = VoteTally::new();
        for label in labels {
            tally.add(label, 1);
        }
        tally
    }

    pub fn add(&mut self, label: L, count: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|(l, _)| *l == label) {
            entry.1 += count;
        } else {
            self.entries.push((label, count));
        }
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| *c).sum()
    }

    pub fn entries(&self) -> &[(L, u64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: PartialEq> Default for VoteTally<L> {
    fn default() -> Self {
        VoteTally::new()
    }
}

/// The category that won a vote.
#[derive(Eq, PartialEq, Debug)]
pub struct Winner<'a, L> {
    pub label: &'a L,
    pub votes: u64,
    pub total: u64,
    /// All the votes went to this category.
    pub unanimous: bool,
}

#[derive(Eq, PartialEq, Debug)]
pub enum CategoryOutcome<'a, L> {
    Winner(Winner<'a, L>),
    /// No category reached the threshold. Carries the tally that was passed in.
    NoConsensus(&'a VoteTally<L>),
}

// Only references are held: copying does not require the labels to be copied.
impl<'a, L> Clone for Winner<'a, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, L> Copy for Winner<'a, L> {}

impl<'a, L> Clone for CategoryOutcome<'a, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, L> Copy for CategoryOutcome<'a, L> {}

impl<'a, L> CategoryOutcome<'a, L> {
    pub fn winner(&self) -> Option<&Winner<'a, L>> {
        match self {
            CategoryOutcome::Winner(w) => Some(w),
            CategoryOutcome::NoConsensus(_) => None,
        }
    }
}

/// Selects the winning category of a tally.
///
/// Categories are visited in tally order. The first category holding all the
/// votes wins unanimously; otherwise the first category whose share of the votes
/// is at least `threshold` wins. If there is none, the tally itself is returned.
pub fn resolve_category<L: PartialEq>(
    tally: &VoteTally<L>,
    threshold: Threshold,
) -> CategoryOutcome<'_, L> {
    let total = tally.total();
    if total == 0 {
        return CategoryOutcome::NoConsensus(tally);
    }
    for (label, votes) in tally.entries() {
        if *votes == total {
            return CategoryOutcome::Winner(Winner {
                label,
                votes: *votes,
                total,
                unanimous: true,
            });
        }
        if threshold.is_reached(*votes as f64, total as f64) {
            debug!(
                "resolve_category: {} of {} votes reach threshold {}",
                votes,
                total,
                threshold.value()
            );
            return CategoryOutcome::Winner(Winner {
                label,
                votes: *votes,
                total,
                unanimous: false,
            });
        }
    }
    CategoryOutcome::NoConsensus(tally)
}
