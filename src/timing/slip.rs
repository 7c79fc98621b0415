//! Slip-synchronization negotiation state.
//!
//! A slip root's effective begin time anchors to the actual begin of one
//! designated slip-capable descendant instead of a fixed offset. While the
//! designee's readiness has not been signaled, the root's begin slides
//! forward tick by tick, holding the subtree at the designee's begin point;
//! once the designee's elapsed time reaches its own active span the
//! relationship tears down and the slipped begin freezes.

/// Negotiation state stored on a slip root group.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SlipState {
    /// Arena index of the designated slip-capable descendant.
    pub(crate) designee: usize,
    /// Whether the sync relationship is still live.
    pub(crate) in_sync: bool,
}

impl SlipState {
    pub(crate) fn new(designee: usize) -> Self {
        Self {
            designee,
            in_sync: true,
        }
    }

    /// Re-arm the negotiation after an interactive begin/stop of the root.
    pub(crate) fn reset(&mut self) {
        self.in_sync = true;
    }
}
