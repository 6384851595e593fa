//! Errors raised at the edges of the controller (configuration, export, thread setup).
//!
//! The control cycle itself never fails: sampling, arbitration and telemetry encoding are
//! total functions. Only the surrounding plumbing returns `ControlError`.

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// A configuration value is inconsistent with another one.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// File creation or thread spawn failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialisation of cycle records failed.
    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),
}
