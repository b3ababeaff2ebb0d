//! Domain types: chains, faults, records and the processing sequence

pub mod chain;
pub mod constant;
pub mod definition;
pub mod error;
pub mod fault;
pub mod record;
pub mod sequence;
