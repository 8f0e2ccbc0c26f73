use serde::{Deserialize, Serialize};

use crate::address::Capacity;
use crate::direction::ScanDirection;
use crate::ids::SlotIndex;
use crate::key::ShardKey;
use crate::slot::Slot;

/// A bounded document holding a contiguous range of one conversation's
/// messages.
///
/// `msgs[i]` holds the sequence mapped to slot `i`. The array only grows;
/// slots are never removed or reordered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    pub shard_key: ShardKey,
    #[serde(default)]
    pub msgs: Vec<Slot>,
}

impl Shard {
    /// An empty shard.
    pub fn new(shard_key: ShardKey) -> Self {
        Self {
            shard_key,
            msgs: Vec::new(),
        }
    }

    pub fn with_slots(shard_key: ShardKey, msgs: Vec<Slot>) -> Self {
        Self { shard_key, msgs }
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.msgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.msgs.is_empty()
    }

    pub fn is_full(&self, capacity: Capacity) -> bool {
        self.msgs.len() as u64 >= capacity.get()
    }

    pub fn slot(&self, index: SlotIndex) -> Option<&Slot> {
        self.msgs.get(index)
    }

    pub fn live_count(&self) -> usize {
        self.msgs.iter().filter(|s| s.is_live()).count()
    }

    /// First live slot met when walking the array in `direction`:
    /// forward for ascending, backward from the last populated index for
    /// descending.
    pub fn first_live(&self, direction: ScanDirection) -> Option<(SlotIndex, &Slot)> {
        self.first_live_within(direction, usize::MAX)
    }

    /// [`first_live`](Self::first_live) over the first `limit` slots only.
    pub fn first_live_within(
        &self,
        direction: ScanDirection,
        limit: usize,
    ) -> Option<(SlotIndex, &Slot)> {
        let slots = &self.msgs[..self.msgs.len().min(limit)];
        let live = |(_, slot): &(SlotIndex, &Slot)| slot.is_live();
        match direction {
            ScanDirection::Ascending => slots.iter().enumerate().find(live),
            ScanDirection::Descending => slots.iter().enumerate().rev().find(live),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard(payloads: &[Option<&[u8]>]) -> Shard {
        let msgs = payloads
            .iter()
            .map(|p| {
                let mut slot = Slot::new(p.unwrap_or_default().to_vec());
                if p.is_none() {
                    slot.tombstone();
                }
                slot
            })
            .collect();
        Shard::with_slots("c1:0".parse().unwrap(), msgs)
    }

    #[test]
    fn first_live_skips_tombstones_in_both_directions() {
        let s = shard(&[None, Some(b"a"), Some(b"b"), None]);
        let (i, slot) = s.first_live(ScanDirection::Ascending).unwrap();
        assert_eq!((i, slot.payload.as_bytes()), (1, Some(&b"a"[..])));
        let (i, slot) = s.first_live(ScanDirection::Descending).unwrap();
        assert_eq!((i, slot.payload.as_bytes()), (2, Some(&b"b"[..])));
        assert_eq!(s.live_count(), 2);
    }

    #[test]
    fn fully_tombstoned_shard_has_no_live_slot() {
        let s = shard(&[None, None]);
        assert!(s.first_live(ScanDirection::Ascending).is_none());
        assert!(s.first_live(ScanDirection::Descending).is_none());
        assert!(Shard::new("c1:0".parse().unwrap()).first_live(ScanDirection::Ascending).is_none());
    }

    #[test]
    fn fullness_tracks_capacity() {
        let s = shard(&[Some(b"a"), Some(b"b"), Some(b"c")]);
        assert!(s.is_full(Capacity::new(3).unwrap()));
        assert!(!s.is_full(Capacity::new(4).unwrap()));
    }

    #[test]
    fn json_schema_uses_shard_key_and_msgs() {
        let s = shard(&[Some(b"a")]);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["shard_key"], "c1:0");
        assert_eq!(json["msgs"].as_array().unwrap().len(), 1);
        let back: Shard = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn first_live_within_ignores_slots_past_limit() {
        let s = shard(&[Some(b"a"), None, Some(b"c"), Some(b"d")]);
        assert_eq!(s.first_live_within(ScanDirection::Descending, 3).map(|(i, _)| i), Some(2));
        assert_eq!(s.first_live_within(ScanDirection::Descending, 2).map(|(i, _)| i), Some(0));
        assert_eq!(s.first_live_within(ScanDirection::Ascending, 0), None);
        assert_eq!(s.first_live(ScanDirection::Descending).map(|(i, _)| i), Some(3));
    }
}
