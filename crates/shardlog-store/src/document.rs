//! Document-level mutations shared by every backend.
//!
//! Each function takes the whole shard by `&mut`, so a backend that holds the
//! document exclusively for the duration of the call gets per-document
//! atomicity for free.

use shardlog_types::{ListField, Shard, Slot, SlotIndex, SlotUpdate, TombstoneFilter, ViewerId};

use crate::traits::UpdateOutcome;

pub(crate) fn push(shard: &mut Shard, slots: &[Slot]) -> usize {
    shard.msgs.extend_from_slice(slots);
    shard.msgs.len()
}

pub(crate) fn update(shard: &mut Shard, index: SlotIndex, update: &SlotUpdate) -> UpdateOutcome {
    match shard.msgs.get_mut(index) {
        Some(slot) => UpdateOutcome {
            matched: 1,
            modified: u64::from(update.apply(slot)),
        },
        None => UpdateOutcome::none(),
    }
}

pub(crate) fn add_to_list(
    shard: &mut Shard,
    index: SlotIndex,
    field: ListField,
    values: &[ViewerId],
) -> UpdateOutcome {
    let Some(slot) = shard.msgs.get_mut(index) else {
        return UpdateOutcome::none();
    };
    let added = match field {
        ListField::HideList => slot.hide_from(values),
    };
    UpdateOutcome {
        matched: 1,
        modified: u64::from(added > 0),
    }
}

pub(crate) fn tombstone(shard: &mut Shard, indexes: &[SlotIndex]) -> UpdateOutcome {
    let mut outcome = UpdateOutcome::none();
    for &index in indexes {
        if let Some(slot) = shard.msgs.get_mut(index) {
            outcome.matched += 1;
            if slot.tombstone() {
                outcome.modified += 1;
            }
        }
    }
    outcome
}

pub(crate) fn project(
    shard: &Shard,
    indexes: &[SlotIndex],
    filter: &TombstoneFilter,
) -> Vec<Option<Slot>> {
    indexes
        .iter()
        .map(|&index| shard.slot(index).and_then(|slot| filter.project(slot)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard(n: usize) -> Shard {
        let msgs = (0..n).map(|i| Slot::new(vec![i as u8])).collect();
        Shard::with_slots("c1:0".parse().unwrap(), msgs)
    }

    #[test]
    fn update_out_of_range_matches_nothing() {
        let mut s = shard(2);
        let before = s.clone();
        assert_eq!(update(&mut s, 2, &SlotUpdate::SetStatus(1)), UpdateOutcome::none());
        assert_eq!(s, before);
    }

    #[test]
    fn tombstone_counts_matched_and_modified() {
        let mut s = shard(3);
        let first = tombstone(&mut s, &[0, 2, 9]);
        assert_eq!(first, UpdateOutcome { matched: 2, modified: 2 });
        let second = tombstone(&mut s, &[0, 2, 9]);
        assert_eq!(second, UpdateOutcome { matched: 2, modified: 0 });
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn add_to_list_is_idempotent() {
        let mut s = shard(1);
        let v = [ViewerId::from("v")];
        assert_eq!(add_to_list(&mut s, 0, ListField::HideList, &v).modified, 1);
        assert_eq!(add_to_list(&mut s, 0, ListField::HideList, &v).modified, 0);
        assert_eq!(add_to_list(&mut s, 5, ListField::HideList, &v).matched, 0);
        assert_eq!(s.msgs[0].hide_list, v);
    }

    #[test]
    fn project_is_positionally_aligned() {
        let mut s = shard(3);
        tombstone(&mut s, &[1]);
        let out = project(&s, &[2, 1, 0, 7], &TombstoneFilter::any_viewer());
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].as_ref().unwrap().payload.as_bytes(), Some(&[2u8][..]));
        assert!(out[1].is_none());
        assert!(out[2].is_some());
        assert!(out[3].is_none());
    }
}
