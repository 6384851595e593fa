//! receiver.rs
//! Transport-facing interfaces of the controller.
//! - `OverrideHandler`: what a transport binding calls when a command arrives
//! - `RemoteChannel`: where the controller pushes telemetry frames
//! - a crossbeam loopback binding used by the threaded simulation

use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, warn};

use crate::link::mailbox::{OverrideMailbox, RemoteEvent, parse_override};
use crate::sensing::transmitter::TelemetryFrame;

/// Callbacks invoked from the transport's own execution context.
pub trait OverrideHandler: Send + Sync {
    /// Raw payload written by the remote controller.
    fn on_override(&self, payload: &[u8]);
    /// Remote controller asks to hand control back to the sensors.
    fn on_resume(&self);
}

/// Telemetry sink. `notify` is a push, never a request/response, and must not block.
pub trait RemoteChannel {
    /// Returns `false` when the frame could not be queued.
    fn notify(&mut self, frame: &TelemetryFrame) -> bool;
}

/// Handler that turns transport callbacks into mailbox events.
#[derive(Clone)]
pub struct MailboxHandler {
    mailbox: Arc<OverrideMailbox>,
}

impl MailboxHandler {
    pub fn new(mailbox: Arc<OverrideMailbox>) -> Self {
        Self { mailbox }
    }
}

impl OverrideHandler for MailboxHandler {
    fn on_override(&self, payload: &[u8]) {
        match parse_override(payload) {
            Some(value) => self.mailbox.post(RemoteEvent::Override(value)),
            None => {
                self.mailbox.record_ignored();
                warn!("[Receiver] ignoring override payload of {} bytes", payload.len());
            }
        }
    }

    fn on_resume(&self) {
        self.mailbox.post(RemoteEvent::Resume);
    }
}

/// Telemetry link backed by a bounded crossbeam channel; the peer holds the receiver.
#[derive(Clone)]
pub struct LoopbackLink {
    tx: Sender<TelemetryFrame>,
}

/// Creates a loopback link and the receiving end for the peer.
pub fn loopback(capacity: usize) -> (LoopbackLink, Receiver<TelemetryFrame>) {
    let (tx, rx) = bounded(capacity);
    (LoopbackLink { tx }, rx)
}

impl RemoteChannel for LoopbackLink {
    fn notify(&mut self, frame: &TelemetryFrame) -> bool {
        match self.tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                debug!("[Receiver] peer gone, frame discarded");
                false
            }
        }
    }
}

/// Link with nobody listening; accepts and discards every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLink;

impl RemoteChannel for NullLink {
    fn notify(&mut self, _frame: &TelemetryFrame) -> bool {
        true
    }
}
