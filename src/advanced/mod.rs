//! Async bindings of the remote link.

pub mod async_link;
