//! mailbox.rs
//! Single-slot hand-off from the transport callback to the control cycle.
//!
//! The transport runs in its own execution context and may deliver several commands between
//! two cycles. Only the latest one matters, so the slot is a one-element lock-free queue
//! written with `force_push`: a newer event displaces an unread older one. The cycle drains
//! the slot exactly once per iteration.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_queue::ArrayQueue;
use log::debug;

/// Remote command waiting for the next arbitration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEvent {
    /// Requested actuator target, not yet clamped.
    Override(u16),
    /// Request to return to autonomous control.
    Resume,
}

/// Decodes an override payload.
///
/// One byte carries the target directly; two bytes carry a little-endian value for actuators
/// whose range exceeds a byte. Empty and longer payloads are not commands.
pub fn parse_override(payload: &[u8]) -> Option<u16> {
    match payload {
        [value] => Some(*value as u16),
        [lo, hi] => Some(u16::from_le_bytes([*lo, *hi])),
        _ => None,
    }
}

pub struct OverrideMailbox {
    slot: ArrayQueue<RemoteEvent>,
    posted: AtomicU64,
    superseded: AtomicU64,
    ignored: AtomicU64,
}

impl Default for OverrideMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl OverrideMailbox {
    pub fn new() -> Self {
        Self {
            slot: ArrayQueue::new(1),
            posted: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        }
    }

    /// Stores an event, replacing any event the cycle has not picked up yet.
    pub fn post(&self, event: RemoteEvent) {
        if let Some(old) = self.slot.force_push(event) {
            self.superseded.fetch_add(1, Ordering::Relaxed);
            debug!("[Mailbox] {:?} superseded by {:?}", old, event);
        }
        self.posted.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes the pending event, if any. Called once per cycle.
    pub fn take(&self) -> Option<RemoteEvent> {
        self.slot.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_empty()
    }

    /// Counts a payload the transport delivered but that carried no command.
    pub fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn posted(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }

    pub fn superseded(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }

    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }
}
