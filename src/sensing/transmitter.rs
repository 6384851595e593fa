//! transmitter.rs
//! Telemetry framing and hand-off to the remote link.
//! - frame layout: one 2-byte little-endian field per channel, declaration order
//! - frame width is fixed by the channel count, whatever the reading holds
//! - hand-off is non-blocking; a frame the link cannot take is dropped and counted

use log::debug;

use crate::link::receiver::RemoteChannel;
use crate::sensing::sensor::SensorReading;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryFrame(Vec<u8>);

impl TelemetryFrame {
    /// Wraps bytes received from a link as-is; width is checked on decode.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryEncoder {
    channels: usize,
}

impl TelemetryEncoder {
    pub const BYTES_PER_CHANNEL: usize = 2;

    pub fn new(channels: usize) -> Self {
        Self { channels }
    }

    pub fn frame_len(&self) -> usize {
        self.channels * Self::BYTES_PER_CHANNEL
    }

    /// Packs the raw channels. Missing channels are sent as 0, extra ones are left out.
    pub fn encode(&self, reading: &SensorReading) -> TelemetryFrame {
        let mut bytes = Vec::with_capacity(self.frame_len());
        for ch in 0..self.channels {
            bytes.extend_from_slice(&reading.channel(ch).to_le_bytes());
        }
        TelemetryFrame(bytes)
    }

    /// Unpacks a frame received from the link. Frames of any other width are rejected.
    pub fn decode(&self, bytes: &[u8]) -> Option<Vec<u16>> {
        if bytes.len() != self.frame_len() {
            return None;
        }
        Some(
            bytes
                .chunks_exact(Self::BYTES_PER_CHANNEL)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        )
    }
}

/// Pushes telemetry frames to the remote link, one per cycle.
pub struct Transmitter<R: RemoteChannel> {
    link: R,
    sent: u64,
    dropped: u64,
}

impl<R: RemoteChannel> Transmitter<R> {
    pub fn new(link: R) -> Self {
        Self {
            link,
            sent: 0,
            dropped: 0,
        }
    }

    /// Returns `false` when the link refused the frame.
    pub fn transmit(&mut self, frame: &TelemetryFrame) -> bool {
        if self.link.notify(frame) {
            self.sent += 1;
            true
        } else {
            self.dropped += 1;
            debug!("[Transmitter] link refused frame ({} dropped so far)", self.dropped);
            false
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn link(&self) -> &R {
        &self.link
    }
}
