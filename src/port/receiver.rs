//! Receiver trait that every chain step implements
//!
//! A receiver is invoked with its bound arguments and the in-flight message.
//! Through the environment it can also steer the sequence that drives it:
//! call a nested chain, jump, end processing, or pause until resumed.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::{
        error::RuntimeError,
        fault::Fault,
        record::{Message, MessageContext},
        sequence::MessageProcessingSequence
    },
    port::registry::ChainRegistry
};

/// What the processor should do after a receiver returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverOutcome {
    /// Advance to the next step immediately
    Proceed,
    /// Park the message until its [`ResumeHandle`] is used
    Pause
}

/// Base trait that all receivers must implement
#[async_trait]
pub trait Receiver: Send + Sync + 'static {
    /// Handle the current message.
    ///
    /// Returning `Err` raises a fault which is routed to the nearest
    /// enclosing chain that declares a fallback for it.
    async fn receive(&self, env: &mut ReceiverEnv<'_>) -> Result<ReceiverOutcome, Fault>;

    /// Get a human-readable name for this receiver (for logging/debugging)
    fn name(&self) -> &str;
}

/// Target of a resume request for a paused message.
///
/// `pause` identifies the step invocation that handed out the handle; a
/// resume only releases the pause it was issued for.
pub trait Continuation: Send + Sync {
    fn resume(&self, message_id: Uuid, pause: u64, fault: Option<Fault>) -> Result<(), RuntimeError>;
}

/// Handle a pausing receiver keeps to continue its message later
#[derive(Clone)]
pub struct ResumeHandle {
    message_id: Uuid,
    pause:      u64,
    target:     Arc<dyn Continuation>
}

impl ResumeHandle {
    pub fn new(message_id: Uuid, pause: u64, target: Arc<dyn Continuation>) -> Self {
        Self { message_id, pause, target }
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    /// Token of the step invocation this handle belongs to
    pub fn pause(&self) -> u64 {
        self.pause
    }

    /// Continue with the step after the pausing one
    pub fn resume(&self) -> Result<(), RuntimeError> {
        self.target.resume(self.message_id, self.pause, None)
    }

    /// Continue by raising `fault` at the pausing step
    pub fn resume_with_fault(&self, fault: Fault) -> Result<(), RuntimeError> {
        self.target.resume(self.message_id, self.pause, Some(fault))
    }
}

impl Debug for ResumeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeHandle").field("message_id", &self.message_id).field("pause", &self.pause).finish()
    }
}

/// Everything a receiver can see and touch while it runs
pub struct ReceiverEnv<'a> {
    pub message:  &'a mut Message,
    pub context:  &'a mut MessageContext,
    pub sequence: &'a mut MessageProcessingSequence,
    arguments:    Arc<Value>,
    chains:       &'a dyn ChainRegistry,
    resume:       ResumeHandle
}

impl<'a> ReceiverEnv<'a> {
    pub fn new(
        message: &'a mut Message,
        context: &'a mut MessageContext,
        sequence: &'a mut MessageProcessingSequence,
        arguments: Arc<Value>,
        chains: &'a dyn ChainRegistry,
        resume: ResumeHandle
    ) -> Self {
        Self { message, context, sequence, arguments, chains, resume }
    }

    /// Arguments bound to the current step
    pub fn arguments(&self) -> &Value {
        &self.arguments
    }

    /// Required string argument
    pub fn argument_str(&self, key: &str) -> Result<&str, Fault> {
        self.arguments
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| Fault::new("receiver.arguments", format!("missing string argument '{}'", key)))
    }

    /// Required non-negative integer argument
    pub fn argument_usize(&self, key: &str) -> Result<usize, Fault> {
        self.arguments
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|value| usize::try_from(value).ok())
            .ok_or_else(|| Fault::new("receiver.arguments", format!("missing integer argument '{}'", key)))
    }

    pub fn chains(&self) -> &dyn ChainRegistry {
        self.chains
    }

    pub fn message_id(&self) -> Uuid {
        self.resume.message_id()
    }

    /// Handle to continue this message after returning [`ReceiverOutcome::Pause`]
    pub fn resume_handle(&self) -> ResumeHandle {
        self.resume.clone()
    }
}
