use serde::{Deserialize, Serialize};

/// Per-group entry of a [`Change`].
///
/// Atom indices are relative to the group window and kept sorted ascending;
/// energy terms intersect and de-duplicate against this ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupChange {
    /// Index of the group in the space's group vector.
    pub group_index: usize,
    /// Every particle of the group is affected.
    pub all: bool,
    /// Internal energy terms (bonds) of the group are affected.
    pub internal: bool,
    /// The group's active atom count changed (atomic reservoir).
    pub dn_atomic: bool,
    /// An atom changed identity in place.
    pub dn_swap: bool,
    /// Sorted relative indices of the touched atoms.
    pub atoms: Vec<usize>,
}

impl GroupChange {
    pub fn new(group_index: usize) -> Self {
        Self {
            group_index,
            ..Default::default()
        }
    }
}

/// Structured summary of what the latest trial move altered, relative to the
/// last accepted state.
///
/// Consumed by energy terms to restrict pair sums, and by the driver for
/// accept/reject synchronization of the two spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Cell volume changed.
    pub volume_changed: bool,
    /// Every particle may have moved; energy terms re-evaluate globally.
    pub everything: bool,
    /// The number of active particles changed (dN).
    pub matter_changed: bool,
    /// Sorted by group index.
    pub groups: Vec<GroupChange>,
}

impl Change {
    /// Reset to "no change".
    pub fn clear(&mut self) {
        self.volume_changed = false;
        self.everything = false;
        self.matter_changed = false;
        self.groups.clear();
    }

    /// True if nothing changed; a move emitting this counts as a rejection
    /// without energy evaluation.
    pub fn is_empty(&self) -> bool {
        !self.volume_changed && !self.everything && !self.matter_changed && self.groups.is_empty()
    }

    /// Convenience constructor for a move touching a single group.
    pub fn single_group(entry: GroupChange) -> Self {
        Self {
            groups: vec![entry],
            ..Default::default()
        }
    }

    /// Restore the ordering invariants after multi-group moves.
    pub fn sort(&mut self) {
        for entry in &mut self.groups {
            entry.atoms.sort_unstable();
        }
        self.groups.sort_by_key(|entry| entry.group_index);
    }

    /// Ordering sanity; asserted by the driver in debug builds.
    pub fn is_sorted(&self) -> bool {
        self.groups
            .windows(2)
            .all(|w| w[0].group_index <= w[1].group_index)
            && self
                .groups
                .iter()
                .all(|entry| entry.atoms.windows(2).all(|w| w[0] <= w[1]))
    }
}
