//! Traits at the seams of the runtime

pub mod receiver;
pub mod registry;
