//! Shared helpers for unit tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::{chain::Chain, error::RuntimeError, fault::Fault, sequence::MessageProcessingSequence},
    port::receiver::{Continuation, Receiver, ReceiverEnv, ReceiverOutcome, ResumeHandle}
};

/// Receiver that does nothing and proceeds
pub struct Noop {
    name: String
}

#[async_trait]
impl Receiver for Noop {
    async fn receive(&self, _env: &mut ReceiverEnv<'_>) -> Result<ReceiverOutcome, Fault> {
        Ok(ReceiverOutcome::Proceed)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn noop(name: &str) -> Arc<dyn Receiver> {
    Arc::new(Noop { name: name.to_string() })
}

/// Chain of no-op receivers named after `steps`
pub fn chain_of(name: &str, steps: &[&str]) -> Arc<Chain> {
    steps.iter().fold(Chain::builder(name), |builder, step| builder.step(noop(step), Value::Null)).build()
}

/// Name of the receiver the sequence is positioned on
pub fn current_name(sequence: &MessageProcessingSequence) -> Option<String> {
    sequence.current_receiver().map(|receiver| receiver.name().to_string())
}

/// Continuation that records resume requests instead of delivering them
#[derive(Default)]
pub struct RecordingContinuation {
    pub resumed: Mutex<Vec<(Uuid, u64, Option<Fault>)>>
}

impl Continuation for RecordingContinuation {
    fn resume(&self, message_id: Uuid, pause: u64, fault: Option<Fault>) -> Result<(), RuntimeError> {
        self.resumed.lock().map_err(|e| RuntimeError::Dispatch(e.to_string()))?.push((message_id, pause, fault));
        Ok(())
    }
}

pub fn detached_handle() -> (ResumeHandle, Arc<RecordingContinuation>) {
    let continuation = Arc::new(RecordingContinuation::default());
    (ResumeHandle::new(Uuid::new_v4(), 1, continuation.clone()), continuation)
}
