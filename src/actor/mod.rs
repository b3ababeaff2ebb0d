//! Actor-based message processing
//!
//! A `Dispatcher` owns the task queue and a pool of `ProcessorWorker`
//! actors; `MessageBus` is the handle applications hold. In-flight messages
//! move between them by value, so exactly one actor owns a message at any
//! time.

pub mod bus;
pub mod dispatcher;
pub mod message;
pub mod processor;

pub use bus::*;
pub use dispatcher::*;
pub use message::*;
pub use processor::*;
