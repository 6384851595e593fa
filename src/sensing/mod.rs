//! Sensing side: light sampling, signal conditioning and telemetry framing.

pub mod sensor;
pub mod processor;
pub mod transmitter;
