use crate::ids::ViewerId;
use crate::slot::Slot;

/// Read-side visibility rule.
///
/// A slot is visible to viewer `V` iff its payload is not tombstoned and `V`
/// is not in its hide-list. Without a viewer only the tombstone check
/// applies. Hide-lists stay inline on the slot; nothing here consults a
/// separate per-viewer index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TombstoneFilter {
    viewer: Option<ViewerId>,
}

impl TombstoneFilter {
    pub fn for_viewer(viewer: ViewerId) -> Self {
        Self {
            viewer: Some(viewer),
        }
    }

    /// Admits every live slot regardless of hide-lists.
    pub fn any_viewer() -> Self {
        Self { viewer: None }
    }

    pub fn viewer(&self) -> Option<&ViewerId> {
        self.viewer.as_ref()
    }

    pub fn admits(&self, slot: &Slot) -> bool {
        if !slot.is_live() {
            return false;
        }
        match &self.viewer {
            Some(viewer) => !slot.is_hidden_from(viewer),
            None => true,
        }
    }

    /// The projection returned to readers: admitted slots with the hide-list
    /// stripped, so other viewers' ids never leave the store.
    pub fn project(&self, slot: &Slot) -> Option<Slot> {
        self.admits(slot).then(|| Slot {
            payload: slot.payload.clone(),
            status: slot.status,
            hide_list: Vec::new(),
        })
    }
}
