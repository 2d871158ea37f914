//! Pointer-drag repositioning of entries.
//! 以指標拖曳重新排列條目。

use tracing::{debug, warn};

use crate::registry::EntryRegistry;
use crate::uid::EntryUid;

/// Vertical extent of a rendered entry that can receive a drop.
/// 可接受放置之條目的垂直範圍。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DropCandidate {
    pub uid: EntryUid,
    pub top: f64,
    pub height: f64,
}

impl DropCandidate {
    pub fn new(uid: EntryUid, top: f64, height: f64) -> Self {
        Self { uid, top, height }
    }

    pub fn midpoint(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// Slot the dragged entry would land in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropTarget {
    /// Insert directly before this entry.
    Before(EntryUid),
    /// Pointer is below every candidate.
    End,
}

/// Picks the candidate whose midpoint lies below `pointer_y` and is closest
/// to it; `End` when no midpoint lies below the pointer. Ties keep the
/// earlier candidate. A non-finite pointer resolves to `End`.
pub fn resolve_drop_target(pointer_y: f64, candidates: &[DropCandidate]) -> DropTarget {
    if !pointer_y.is_finite() {
        return DropTarget::End;
    }
    let mut closest: Option<(f64, EntryUid)> = None;
    for candidate in candidates {
        let offset = pointer_y - candidate.midpoint();
        if offset.is_nan() || offset >= 0.0 {
            continue;
        }
        match closest {
            Some((best, _)) if offset <= best => {}
            _ => closest = Some((offset, candidate.uid)),
        }
    }
    closest.map_or(DropTarget::End, |(_, uid)| DropTarget::Before(uid))
}

/// Final index of `dragged` once placed at `target`, or `None` when either
/// entry is unknown.
pub fn target_index(
    registry: &EntryRegistry,
    dragged: EntryUid,
    target: DropTarget,
) -> Option<usize> {
    let from = registry.position(dragged)?;
    match target {
        DropTarget::End => Some(registry.len() - 1),
        DropTarget::Before(uid) => {
            let to = registry.position(uid)?;
            Some(if from < to { to - 1 } else { to })
        }
    }
}

/// State of one drag gesture, from pick-up to drop or cancel. Dropping or
/// cancelling consumes the session.
/// 單次拖曳手勢的狀態；放置或取消後即失效。
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    dragged: EntryUid,
    placeholder: Option<DropTarget>,
}

impl DragSession {
    /// Starts dragging `uid`; `None` if the registry does not hold it.
    pub fn begin(registry: &EntryRegistry, uid: EntryUid) -> Option<Self> {
        if !registry.contains(uid) {
            return None;
        }
        debug!(%uid, "drag start");
        Some(Self {
            dragged: uid,
            placeholder: None,
        })
    }

    pub fn dragged(&self) -> EntryUid {
        self.dragged
    }

    /// Where the drop indicator currently sits, if the pointer is over the
    /// drop surface.
    pub fn placeholder(&self) -> Option<DropTarget> {
        self.placeholder
    }

    /// Tracks the pointer while it moves over the drop surface.
    pub fn hover(&mut self, pointer_y: f64, candidates: &[DropCandidate]) -> DropTarget {
        let target = self.resolve(pointer_y, candidates);
        self.placeholder = Some(target);
        target
    }

    /// The pointer left the drop surface; the indicator is withdrawn.
    pub fn leave(&mut self) {
        self.placeholder = None;
    }

    /// Completes the gesture by moving the dragged entry. Only a gesture
    /// currently hovering the drop surface can drop; after `leave` without
    /// a new `hover` nothing moves. Returns the final index, or `None` when
    /// nothing was moved.
    pub fn drop_at(
        self,
        registry: &mut EntryRegistry,
        pointer_y: f64,
        candidates: &[DropCandidate],
    ) -> Option<usize> {
        if self.placeholder.is_none() {
            debug!(uid = %self.dragged, "drop outside the drop surface ignored");
            return None;
        }
        let target = self.resolve(pointer_y, candidates);
        let Some(index) = target_index(registry, self.dragged, target) else {
            warn!(uid = %self.dragged, ?target, "drop target no longer present");
            return None;
        };
        registry.move_to(self.dragged, index);
        registry.refresh_display_indices();
        debug!(uid = %self.dragged, index, "drag drop");
        Some(index)
    }

    /// Aborts the gesture without touching the registry.
    pub fn cancel(self) {
        debug!(uid = %self.dragged, "drag cancelled");
    }

    fn resolve(&self, pointer_y: f64, candidates: &[DropCandidate]) -> DropTarget {
        let others: Vec<DropCandidate> = candidates
            .iter()
            .copied()
            .filter(|candidate| candidate.uid != self.dragged)
            .collect();
        resolve_drop_target(pointer_y, &others)
    }
}
