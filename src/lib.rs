//! # Chain Runtime
//!
//! Messages flow through named chains of receivers. A chain step may call
//! another chain, jump, end processing or pause until resumed, and faults
//! raised anywhere in a nested call are routed to the nearest enclosing
//! chain that declares a fallback for them.
//!
//! - [`domain::sequence::MessageProcessingSequence`] is the per-message
//!   stack machine that tracks the position in the nested chain graph
//! - [`adapter::registry::InMemoryChainRegistry`] builds immutable chains
//!   from YAML definitions
//! - [`actor::MessageBus`] runs messages on a pool of worker actors

pub mod actor;
pub mod adapter;
pub mod cli;
pub mod config;
pub mod domain;
pub mod port;

#[cfg(test)]
mod testing;

pub use actor::{MessageBus, ProcessingOutcome, ProcessingReport};
pub use config::{AppConfig, RuntimeSettings};
pub use domain::{
    chain::{AfterAction, Chain},
    error::RuntimeError,
    fault::{Fault, FaultMatcher},
    record::{Message, MessageContext},
    sequence::MessageProcessingSequence
};
pub use port::{
    receiver::{Receiver, ReceiverEnv, ReceiverOutcome, ResumeHandle},
    registry::ChainRegistry
};
