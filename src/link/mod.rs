//! Remote link: override hand-off, transport interfaces and the remote pilot.
//!
//! The wireless stack itself is out of scope; a binding only has to call an
//! `OverrideHandler` and implement `RemoteChannel`.

pub mod mailbox;
pub mod receiver;
pub mod feedback;
