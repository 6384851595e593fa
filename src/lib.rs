//! Light-following actuator controller with a remote override link.
//!
//! - `sensing`: ADC sampling, smoothing, lux conversion and telemetry framing
//! - `actuation`: arbitration between autonomous control and remote overrides, actuator drivers
//! - `link`: override mailbox, transport interfaces and the remote pilot peer
//! - `cycle`: the fixed-period control loop tying them together
//! - `advanced`: tokio binding of the link
//! - `utils`: configuration, errors, metrics and CSV export

pub mod actuation;
pub mod advanced;
pub mod cycle;
pub mod link;
pub mod sensing;
pub mod utils;
