use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use crate::entry::Entry;
use crate::uid::{next_uid, EntryUid};

/// Where "add" places a new entry.
/// 新增條目時的放置位置。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Above(EntryUid),
    Below(EntryUid),
    Bottom,
}

/// Ordered, uid-unique collection of entries. Sequence order is the only
/// source of truth for position; every structural mutation refreshes each
/// entry's display index before returning.
/// 依序保存條目的集合；順序即為唯一的位置依據。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryRegistry {
    entries: Vec<Entry>,
}

impl EntryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from decoded entries. The first entry declaring a
    /// uid keeps it; later duplicates are re-assigned only after every
    /// declared uid has been claimed, so no entry loses its own uid to a
    /// freshly allocated one.
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut claimed = BTreeSet::new();
        let duplicates: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !claimed.insert(entry.uid()))
            .map(|(index, _)| index)
            .collect();
        let mut registry = Self { entries };
        for index in duplicates {
            let fresh = next_uid(&claimed);
            claimed.insert(fresh);
            let entry = &mut registry.entries[index];
            debug!(declared = %entry.uid(), %fresh, "re-assigned duplicate uid");
            entry.set_uid(fresh);
        }
        registry.refresh_display_indices();
        registry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in current visual order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entries.iter()
    }

    pub fn get(&self, uid: EntryUid) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.uid() == uid)
    }

    pub fn contains(&self, uid: EntryUid) -> bool {
        self.position(uid).is_some()
    }

    pub fn position(&self, uid: EntryUid) -> Option<usize> {
        self.entries.iter().position(|entry| entry.uid() == uid)
    }

    /// Live uid set; recomputed on every call.
    pub fn uids(&self) -> BTreeSet<EntryUid> {
        self.entries.iter().map(Entry::uid).collect()
    }

    /// Next free uid for the collection as it is right now.
    pub fn next_uid(&self) -> EntryUid {
        next_uid(&self.uids())
    }

    /// Inserts at `position` (`0` = front, `len()` = end).
    pub fn insert(&mut self, entry: Entry, position: usize) -> Result<(), RegistryError> {
        if self.contains(entry.uid()) {
            return Err(RegistryError::DuplicateUid(entry.uid()));
        }
        if position > self.entries.len() {
            return Err(RegistryError::PositionOutOfRange {
                position,
                len: self.entries.len(),
            });
        }
        debug!(uid = %entry.uid(), position, "insert entry");
        self.entries.insert(position, entry);
        self.refresh_display_indices();
        Ok(())
    }

    /// Creates a default entry with a fresh uid. A reference entry that no
    /// longer exists falls back to the bottom.
    pub fn add(&mut self, placement: Placement, template: impl FnOnce(&mut Entry)) -> EntryUid {
        let uid = self.next_uid();
        let mut entry = Entry::new(uid);
        template(&mut entry);
        entry.set_uid(uid);
        let position = self.resolve_placement(placement);
        debug!(%uid, position, "add entry");
        self.entries.insert(position, entry);
        self.refresh_display_indices();
        uid
    }

    fn resolve_placement(&self, placement: Placement) -> usize {
        match placement {
            Placement::Above(reference) => self.position(reference),
            Placement::Below(reference) => self.position(reference).map(|index| index + 1),
            Placement::Bottom => None,
        }
        .unwrap_or(self.entries.len())
    }

    /// Removes the entry; unknown uids are ignored.
    pub fn remove(&mut self, uid: EntryUid) -> Option<Entry> {
        let index = self.position(uid)?;
        debug!(%uid, index, "remove entry");
        let removed = self.entries.remove(index);
        self.refresh_display_indices();
        Some(removed)
    }

    /// Swaps with the predecessor. Returns `false` at the top or for an
    /// unknown uid.
    pub fn move_up(&mut self, uid: EntryUid) -> bool {
        match self.position(uid) {
            Some(index) if index > 0 => {
                self.entries.swap(index - 1, index);
                debug!(%uid, to = index - 1, "move entry up");
                self.refresh_display_indices();
                true
            }
            _ => false,
        }
    }

    /// Swaps with the successor. Returns `false` at the bottom or for an
    /// unknown uid.
    pub fn move_down(&mut self, uid: EntryUid) -> bool {
        match self.position(uid) {
            Some(index) if index + 1 < self.entries.len() => {
                self.entries.swap(index, index + 1);
                debug!(%uid, to = index + 1, "move entry down");
                self.refresh_display_indices();
                true
            }
            _ => false,
        }
    }

    /// Relocates the entry so that it ends up at `target_index`; indices past
    /// the end clamp to the last slot. Returns whether the order changed.
    pub fn move_to(&mut self, uid: EntryUid, target_index: usize) -> bool {
        let Some(from) = self.position(uid) else {
            return false;
        };
        let target = target_index.min(self.entries.len() - 1);
        if from == target {
            return false;
        }
        let entry = self.entries.remove(from);
        self.entries.insert(target, entry);
        debug!(%uid, from, to = target, "move entry");
        self.refresh_display_indices();
        true
    }

    /// Copies the live values of `uid` into a new entry right after it.
    /// Only uid and display index differ from the source.
    pub fn duplicate(&mut self, uid: EntryUid) -> Option<EntryUid> {
        let index = self.position(uid)?;
        let fresh = self.next_uid();
        let mut copy = self.entries[index].clone();
        copy.set_uid(fresh);
        debug!(source = %uid, copy = %fresh, "duplicate entry");
        self.entries.insert(index + 1, copy);
        self.refresh_display_indices();
        Some(fresh)
    }

    /// Applies a field edit in place. The closure cannot change the uid or
    /// display index; returns `false` for an unknown uid.
    pub fn update(&mut self, uid: EntryUid, edit: impl FnOnce(&mut Entry)) -> bool {
        let Some(index) = self.position(uid) else {
            return false;
        };
        let entry = &mut self.entries[index];
        edit(entry);
        entry.set_uid(uid);
        entry.set_display_index(index);
        true
    }

    /// Rewrites every display index from the current order. Idempotent.
    pub fn refresh_display_indices(&mut self) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            entry.set_display_index(index);
        }
    }

    pub fn can_move_up(&self, uid: EntryUid) -> bool {
        matches!(self.position(uid), Some(index) if index > 0)
    }

    pub fn can_move_down(&self, uid: EntryUid) -> bool {
        matches!(self.position(uid), Some(index) if index + 1 < self.entries.len())
    }
}

/// Misuse of [`EntryRegistry::insert`].
/// [`EntryRegistry::insert`] 的誤用錯誤。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("entry uid {0} is already present")]
    DuplicateUid(EntryUid),
    #[error("position {position} is past the end of {len} entries")]
    PositionOutOfRange { position: usize, len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_of(comments: &[&str]) -> EntryRegistry {
        let entries = comments
            .iter()
            .enumerate()
            .map(|(index, comment)| {
                let mut entry = Entry::new(EntryUid::new(index as u64));
                entry.comment = comment.to_string();
                entry
            })
            .collect();
        EntryRegistry::from_entries(entries)
    }

    fn comments(registry: &EntryRegistry) -> Vec<&str> {
        registry.iter().map(|entry| entry.comment.as_str()).collect()
    }

    fn assert_indices_fresh(registry: &EntryRegistry) {
        for (index, entry) in registry.iter().enumerate() {
            assert_eq!(entry.display_index(), index);
        }
    }

    #[test]
    fn insert_shifts_following_entries() {
        let mut registry = registry_of(&["A", "B"]);
        let mut entry = Entry::new(EntryUid::new(9));
        entry.comment = "X".into();
        registry.insert(entry, 1).unwrap();
        assert_eq!(comments(&registry), ["A", "X", "B"]);
        assert_indices_fresh(&registry);
    }

    #[test]
    fn insert_rejects_duplicate_uid_and_bad_position() {
        let mut registry = registry_of(&["A"]);
        assert_eq!(
            registry.insert(Entry::new(EntryUid::new(0)), 0),
            Err(RegistryError::DuplicateUid(EntryUid::new(0)))
        );
        assert_eq!(
            registry.insert(Entry::new(EntryUid::new(5)), 3),
            Err(RegistryError::PositionOutOfRange { position: 3, len: 1 })
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn add_resolves_placement_relative_to_reference() {
        let mut registry = registry_of(&["A", "B"]);
        let above = registry.add(Placement::Above(EntryUid::new(1)), |e| e.comment = "above".into());
        let below = registry.add(Placement::Below(EntryUid::new(0)), |e| e.comment = "below".into());
        let bottom = registry.add(Placement::Bottom, |e| e.comment = "bottom".into());
        assert_eq!(comments(&registry), ["A", "below", "above", "B", "bottom"]);
        assert_eq!(above, EntryUid::new(2));
        assert_eq!(below, EntryUid::new(3));
        assert_eq!(bottom, EntryUid::new(4));
        assert_indices_fresh(&registry);
    }

    #[test]
    fn add_with_missing_reference_appends() {
        let mut registry = registry_of(&["A"]);
        registry.add(Placement::Above(EntryUid::new(42)), |e| e.comment = "new".into());
        assert_eq!(comments(&registry), ["A", "new"]);
    }

    #[test]
    fn remove_unknown_uid_is_noop() {
        let mut registry = registry_of(&["A", "B"]);
        let before = registry.clone();
        assert!(registry.remove(EntryUid::new(7)).is_none());
        assert_eq!(registry, before);

        let removed = registry.remove(EntryUid::new(0)).unwrap();
        assert_eq!(removed.comment, "A");
        assert_eq!(comments(&registry), ["B"]);
        assert_indices_fresh(&registry);
    }

    #[test]
    fn move_boundaries_leave_order_untouched() {
        let mut registry = registry_of(&["A", "B", "C"]);
        assert!(!registry.move_up(EntryUid::new(0)));
        assert!(!registry.move_down(EntryUid::new(2)));
        assert_eq!(comments(&registry), ["A", "B", "C"]);

        assert!(registry.move_down(EntryUid::new(0)));
        assert_eq!(comments(&registry), ["B", "A", "C"]);
        assert!(registry.move_up(EntryUid::new(2)));
        assert_eq!(comments(&registry), ["B", "C", "A"]);
        assert_indices_fresh(&registry);
    }

    #[test]
    fn move_affordances_follow_position() {
        let mut registry = registry_of(&["A", "B", "C"]);
        assert!(!registry.can_move_up(EntryUid::new(0)));
        assert!(registry.can_move_down(EntryUid::new(0)));
        assert!(!registry.can_move_down(EntryUid::new(2)));
        registry.move_to(EntryUid::new(2), 0);
        assert!(!registry.can_move_up(EntryUid::new(2)));
        assert!(registry.can_move_up(EntryUid::new(0)));
        assert!(!registry.can_move_up(EntryUid::new(99)));
    }

    #[test]
    fn move_to_preserves_relative_order_of_others() {
        let mut registry = registry_of(&["A", "B", "C", "D"]);
        assert!(registry.move_to(EntryUid::new(0), 2));
        assert_eq!(comments(&registry), ["B", "C", "A", "D"]);
        assert!(registry.move_to(EntryUid::new(3), 0));
        assert_eq!(comments(&registry), ["D", "B", "C", "A"]);
        assert!(registry.move_to(EntryUid::new(3), 100));
        assert_eq!(comments(&registry), ["B", "C", "A", "D"]);
        assert!(!registry.move_to(EntryUid::new(3), 3));
        assert_indices_fresh(&registry);
    }

    #[test]
    fn duplicate_copies_live_values_after_source() {
        let mut registry = registry_of(&["A", "B"]);
        registry.update(EntryUid::new(0), |entry| {
            entry.content = "edited".into();
            entry.set_keys_from_text("one, two");
            entry.set_attribute("order", serde_json::json!(7));
        });
        let copy = registry.duplicate(EntryUid::new(0)).unwrap();
        assert_eq!(copy, EntryUid::new(2));
        assert_eq!(comments(&registry), ["A", "A", "B"]);

        let source = registry.get(EntryUid::new(0)).unwrap();
        let duplicate = registry.get(copy).unwrap();
        assert_eq!(duplicate.content, "edited");
        assert_eq!(duplicate.keys(), source.keys());
        assert_eq!(duplicate.attributes(), source.attributes());
        assert_eq!(duplicate.display_index(), 1);
        assert!(registry.duplicate(EntryUid::new(50)).is_none());
    }

    #[test]
    fn uids_stay_unique_across_mixed_operations() {
        let mut registry = registry_of(&["A", "B", "C"]);
        registry.remove(EntryUid::new(1));
        let first = registry.add(Placement::Bottom, |_| {});
        let second = registry.duplicate(first).unwrap();
        registry.remove(EntryUid::new(0));
        let third = registry.add(Placement::Above(second), |_| {});
        let _ = registry.duplicate(third);

        let uids: Vec<_> = registry.iter().map(Entry::uid).collect();
        assert_eq!(uids.len(), registry.uids().len());
        assert_eq!(first, EntryUid::new(1));
        assert_eq!(second, EntryUid::new(3));
        assert_eq!(third, EntryUid::new(0));
    }

    #[test]
    fn update_cannot_change_identity() {
        let mut registry = registry_of(&["A", "B"]);
        assert!(registry.update(EntryUid::new(1), |entry| {
            entry.set_uid(EntryUid::new(0));
            entry.set_display_index(9);
            entry.comment = "renamed".into();
        }));
        let entry = registry.get(EntryUid::new(1)).unwrap();
        assert_eq!(entry.comment, "renamed");
        assert_eq!(entry.display_index(), 1);
        assert!(!registry.update(EntryUid::new(5), |_| {}));
    }

    #[test]
    fn from_entries_reassigns_duplicate_uids() {
        let build = |declared: &[u64]| -> Vec<u64> {
            let entries = declared
                .iter()
                .map(|&value| Entry::new(EntryUid::new(value)))
                .collect();
            EntryRegistry::from_entries(entries)
                .iter()
                .map(|entry| entry.uid().as_u64())
                .collect()
        };
        assert_eq!(build(&[0, 0]), vec![0, 1]);
        // Uid 1 is declared later and stays with its own entry.
        assert_eq!(build(&[0, 0, 1]), vec![0, 2, 1]);
        assert_eq!(build(&[3, 3, 3, 0]), vec![3, 1, 2, 0]);
    }
}
