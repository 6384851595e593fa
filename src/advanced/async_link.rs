//! async_link.rs
//! Tokio binding of the telemetry/override link.
//!
//! The control cycle stays a blocking loop; only the transport side is async. Frames are
//! handed over with a non-blocking `try_send`, and the pilot task answers through the same
//! `OverrideHandler` callbacks a radio stack would use.

use log::{debug, info};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};

use crate::link::{
    feedback::{PeerStats, RemotePilot, deliver},
    receiver::{OverrideHandler, RemoteChannel},
};
use crate::sensing::transmitter::TelemetryFrame;

/// Telemetry link backed by a bounded tokio channel.
#[derive(Clone)]
pub struct TokioLink {
    tx: Sender<TelemetryFrame>,
}

pub fn tokio_link(capacity: usize) -> (TokioLink, Receiver<TelemetryFrame>) {
    let (tx, rx) = mpsc::channel(capacity);
    (TokioLink { tx }, rx)
}

impl RemoteChannel for TokioLink {
    fn notify(&mut self, frame: &TelemetryFrame) -> bool {
        match self.tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Closed(_)) => {
                debug!("[AsyncLink] pilot task gone, frame discarded");
                false
            }
        }
    }
}

/// Pilot task: consumes frames until every `TokioLink` is dropped.
pub async fn run_remote_pilot<H>(
    mut rx: Receiver<TelemetryFrame>,
    mut pilot: RemotePilot,
    handler: H,
) -> PeerStats
where
    H: OverrideHandler,
{
    let mut stats = PeerStats::default();
    while let Some(frame) = rx.recv().await {
        stats.frames += 1;
        if let Some(action) = pilot.on_frame(frame.as_bytes()) {
            debug!("[AsyncPilot] lux={:.1} -> {:?}", pilot.last_lux().unwrap_or(0.0), action);
            deliver(&handler, action, &mut stats);
        }
    }
    info!(
        "[AsyncPilot] link closed: frames={} overrides={} resumes={}",
        stats.frames, stats.overrides, stats.resumes
    );
    stats
}
