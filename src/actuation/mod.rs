//! Actuation side: arbitration between autonomous control and remote overrides, and the
//! drivers that carry out the resulting commands.

pub mod controller;
pub mod actuator;
pub mod multi_actuator;
