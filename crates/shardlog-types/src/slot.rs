use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{Sequence, ViewerId};

/// Content of a slot: either a serialized message or the tombstone marker.
///
/// A tombstoned slot keeps its position in the shard; only the bytes are
/// gone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Present(Vec<u8>),
    Tombstoned,
}

impl Payload {
    pub fn is_tombstoned(&self) -> bool {
        matches!(self, Payload::Tombstoned)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Present(bytes) => Some(bytes),
            Payload::Tombstoned => None,
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Present(bytes)
    }
}

/// One addressable position in a shard, holding exactly one sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub payload: Payload,
    /// Delivery/status value owned by the service layer.
    #[serde(default)]
    pub status: i32,
    /// Viewers for whom this slot is hidden.
    #[serde(default)]
    pub hide_list: Vec<ViewerId>,
}

impl Slot {
    /// A live slot with default status and an empty hide-list.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: Payload::Present(payload.into()),
            status: 0,
            hide_list: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    pub fn is_live(&self) -> bool {
        !self.payload.is_tombstoned()
    }

    pub fn is_hidden_from(&self, viewer: &ViewerId) -> bool {
        self.hide_list.contains(viewer)
    }

    /// Clear the payload, keeping status and hide-list. Returns `true` if the
    /// slot was live before.
    pub fn tombstone(&mut self) -> bool {
        let was_live = self.is_live();
        self.payload = Payload::Tombstoned;
        was_live
    }

    /// Set-union `values` into the hide-list. Returns how many were new.
    pub fn hide_from<'a>(&mut self, values: impl IntoIterator<Item = &'a ViewerId>) -> usize {
        let mut added = 0;
        for viewer in values {
            if !self.hide_list.contains(viewer) {
                self.hide_list.push(viewer.clone());
                added += 1;
            }
        }
        added
    }
}

/// Named field of a slot, for targeted updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotField {
    Payload,
    Status,
    HideList,
}

impl SlotField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotField::Payload => "payload",
            SlotField::Status => "status",
            SlotField::HideList => "hide_list",
        }
    }
}

impl fmt::Display for SlotField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// List-valued slot fields that accept set-union appends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListField {
    HideList,
}

impl From<ListField> for SlotField {
    fn from(field: ListField) -> Self {
        match field {
            ListField::HideList => SlotField::HideList,
        }
    }
}

/// Absolute-value write to one slot. Replaying the same update is a no-op.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotUpdate {
    /// Overwrite the whole slot.
    Replace(Slot),
    SetPayload(Payload),
    SetStatus(i32),
    SetHideList(Vec<ViewerId>),
}

impl SlotUpdate {
    /// The targeted field, or `None` when the whole slot is replaced.
    pub fn field(&self) -> Option<SlotField> {
        match self {
            SlotUpdate::Replace(_) => None,
            SlotUpdate::SetPayload(_) => Some(SlotField::Payload),
            SlotUpdate::SetStatus(_) => Some(SlotField::Status),
            SlotUpdate::SetHideList(_) => Some(SlotField::HideList),
        }
    }

    /// Apply to `slot`. Returns `true` if the slot changed.
    pub fn apply(&self, slot: &mut Slot) -> bool {
        let before = slot.clone();
        match self {
            SlotUpdate::Replace(new) => *slot = new.clone(),
            SlotUpdate::SetPayload(payload) => slot.payload = payload.clone(),
            SlotUpdate::SetStatus(status) => slot.status = *status,
            SlotUpdate::SetHideList(list) => slot.hide_list = list.clone(),
        }
        *slot != before
    }
}

/// A live message read back from the log, with its sequence restored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sequence: Sequence,
    pub payload: Vec<u8>,
    pub status: i32,
}

/// One position of a batch read: the message, or an explicit absence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchEntry {
    Visible(MessageRecord),
    Absent,
}

impl BatchEntry {
    pub fn is_absent(&self) -> bool {
        matches!(self, BatchEntry::Absent)
    }

    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            BatchEntry::Visible(record) => Some(&record.payload),
            BatchEntry::Absent => None,
        }
    }
}
