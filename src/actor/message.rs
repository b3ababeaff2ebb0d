//! Typed messages for actor communication

use chrono::{DateTime, Utc};
use ractor::{Message, RpcReplyPort};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    error::RuntimeError,
    fault::Fault,
    record::{Message as Payload, MessageContext},
    sequence::MessageProcessingSequence
};

/// Reply port of a caller waiting for a message to finish
pub type ProcessingReply = RpcReplyPort<Result<ProcessingReport, RuntimeError>>;

/// One in-flight message, owned by exactly one actor at a time
pub struct Processing {
    pub id:         Uuid,
    /// Entry chain name
    pub chain:      String,
    pub sequence:   MessageProcessingSequence,
    pub message:    Payload,
    pub context:    MessageContext,
    pub reply:      Option<ProcessingReply>,
    pub started_at: DateTime<Utc>,
    /// Receivers invoked so far; also the pause token of the latest invocation
    pub steps:      u64
}

impl Processing {
    pub fn new(
        id: Uuid,
        chain: impl Into<String>,
        sequence: MessageProcessingSequence,
        message: Payload,
        context: MessageContext,
        reply: Option<ProcessingReply>
    ) -> Self {
        Self { id, chain: chain.into(), sequence, message, context, reply, started_at: Utc::now(), steps: 0 }
    }
}

impl std::fmt::Debug for Processing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processing")
            .field("id", &self.id)
            .field("chain", &self.chain)
            .field("sequence", &self.sequence)
            .field("steps", &self.steps)
            .finish()
    }
}

/// How a worker picks up a processing handed to it
#[derive(Debug, Clone)]
pub enum Resumption {
    /// Run the step the sequence is positioned on
    Current,
    /// The paused step completed; advance first
    Next,
    /// The paused step failed with this fault
    Raise(Fault)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingOutcome {
    /// Every frame was popped
    Completed,
    /// `end` was called, directly or by a completion callback
    Terminated
}

/// Final state of a processed message
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingReport {
    pub id:               Uuid,
    pub chain:            String,
    pub message:          Payload,
    pub context:          MessageContext,
    pub outcome:          ProcessingOutcome,
    /// Fault raised by a completion callback that ended processing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_fault: Option<Fault>,
    pub steps:            u64,
    pub started_at:       DateTime<Utc>,
    pub finished_at:      DateTime<Utc>
}

/// How a processing left the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishKind {
    Completed,
    Terminated,
    Failed
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub submitted:  u64,
    pub completed:  u64,
    pub terminated: u64,
    pub failed:     u64,
    pub expired:    u64,
    pub in_flight:  usize,
    pub parked:     usize
}

/// Messages for the Dispatcher actor
#[derive(Debug)]
pub enum DispatcherMessage {
    /// Start processing a message on the named chain
    Submit {
        id:      Uuid,
        chain:   String,
        message: Payload,
        context: MessageContext,
        reply:   Option<ProcessingReply>
    },
    /// A worker used up its step budget
    Continue(Box<Processing>),
    /// A receiver paused the message
    Park(Box<Processing>),
    /// Continue a paused message; `pause` names the step invocation that paused
    Resume { id: Uuid, pause: u64, fault: Option<Fault> },
    /// Pause timer fired
    ExpireParked { id: Uuid, generation: u64 },
    /// A worker finished a message and replied to its caller
    Finished { id: Uuid, kind: FinishKind },
    GetStats { reply: RpcReplyPort<DispatcherStats> },
    /// Fail parked messages and stop the pool
    Shutdown
}

/// Messages for ProcessorWorker actors
#[derive(Debug)]
pub enum ProcessorMessage {
    Run { processing: Box<Processing>, resumption: Resumption }
}

// Implement Message trait for Ractor
impl Message for DispatcherMessage {}
impl Message for ProcessorMessage {}
