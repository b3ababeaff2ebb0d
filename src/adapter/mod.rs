//! Implementations of the ports: in-memory chain registry and built-in receivers

pub mod receivers;
pub mod registry;
