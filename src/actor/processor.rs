//! ProcessorWorker Actor
//!
//! Drives one message at a time through its sequence:
//! - invokes the receiver at the current position
//! - advances on success, routes faults to fallback chains
//! - hands the processing back to the dispatcher when the receiver pauses
//!   or the step budget of the task is used up
//! - replies to the caller once the sequence is finished

use std::sync::Arc;

use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tracing::{Level, event};

use crate::{
    actor::message::{
        DispatcherMessage, FinishKind, Processing, ProcessingOutcome, ProcessingReport, ProcessorMessage, Resumption
    },
    domain::{
        constant::processor_worker,
        error::RuntimeError,
        fault::Fault,
        record::{EXCEPTION, FaultCoordinates},
        sequence::SequenceState
    },
    port::{
        receiver::{Continuation, ReceiverEnv, ReceiverOutcome, ResumeHandle},
        registry::ChainRegistry
    }
};

pub struct WorkerArguments {
    pub index:          usize,
    pub dispatcher:     ActorRef<DispatcherMessage>,
    pub registry:       Arc<dyn ChainRegistry>,
    pub steps_per_task: usize,
    pub max_steps:      u64
}

/// ProcessorWorker Actor State
pub struct ProcessorWorkerState {
    index:          usize,
    dispatcher:     ActorRef<DispatcherMessage>,
    /// Resume target handed to pausing receivers
    continuation:   Arc<dyn Continuation>,
    registry:       Arc<dyn ChainRegistry>,
    steps_per_task: usize,
    /// Receivers one message may run in total
    max_steps:      u64
}

/// Where a task left its processing
enum Handoff {
    Finished(Result<(), RuntimeError>),
    Park,
    Yield
}

/// ProcessorWorker Actor - runs receivers for whichever message it is handed
pub struct ProcessorWorker;

#[async_trait::async_trait]
impl Actor for ProcessorWorker {
    type Arguments = WorkerArguments;
    type Msg = ProcessorMessage;
    type State = ProcessorWorkerState;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments
    ) -> Result<Self::State, ActorProcessingErr> {
        event!(Level::DEBUG, event = processor_worker::WORKER_STARTED, worker = args.index);

        Ok(ProcessorWorkerState {
            index:          args.index,
            continuation:   Arc::new(args.dispatcher.clone()),
            dispatcher:     args.dispatcher,
            registry:       args.registry,
            steps_per_task: args.steps_per_task.max(1),
            max_steps:      args.max_steps.max(1)
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ProcessorMessage::Run { processing, resumption } => {
                self.handle_run(processing, resumption, state).await;
                Ok(())
            }
        }
    }
}

impl ProcessorWorker {
    async fn handle_run(&self, mut processing: Box<Processing>, resumption: Resumption, state: &ProcessorWorkerState) {
        let handoff = match self.resume(&mut processing, resumption) {
            Ok(()) => self.run_task(&mut processing, state).await,
            Err(e) => Handoff::Finished(Err(e))
        };

        match handoff {
            Handoff::Finished(result) => self.finish(*processing, result, state),
            Handoff::Park => self.hand_back(DispatcherMessage::Park(processing), state),
            Handoff::Yield => {
                event!(Level::TRACE, event = processor_worker::TASK_YIELDED,
                       message_id = %processing.id, worker = state.index, steps = processing.steps);
                self.hand_back(DispatcherMessage::Continue(processing), state)
            }
        }
    }

    /// Apply the way the previous task ended before running more steps
    fn resume(&self, processing: &mut Processing, resumption: Resumption) -> Result<(), RuntimeError> {
        match resumption {
            Resumption::Current => {}
            Resumption::Next => {
                processing.sequence.advance();
            }
            Resumption::Raise(fault) => {
                self.raise(processing, fault)?;
                processing.sequence.advance();
            }
        }
        Ok(())
    }

    /// Run up to `steps_per_task` receivers
    async fn run_task(&self, processing: &mut Processing, state: &ProcessorWorkerState) -> Handoff {
        let mut budget = state.steps_per_task;

        loop {
            if !processing.sequence.is_active() {
                return Handoff::Finished(Ok(()));
            }
            if processing.steps >= state.max_steps {
                event!(Level::WARN, event = processor_worker::STEP_LIMIT_EXCEEDED,
                       message_id = %processing.id, worker = state.index, steps = processing.steps);
                return Handoff::Finished(Err(RuntimeError::Timeout(format!(
                    "message {} did not finish within {} steps",
                    processing.id, state.max_steps
                ))));
            }
            if budget == 0 {
                return Handoff::Yield;
            }

            let Some(step) = processing.sequence.current_step().cloned() else {
                processing.sequence.advance();
                continue;
            };
            budget -= 1;
            processing.steps += 1;

            event!(Level::TRACE, event = processor_worker::STEP_STARTED,
                   message_id = %processing.id, worker = state.index,
                   level = ?processing.sequence.current_level(), receiver = %step.receiver.name());

            let outcome = {
                let mut env = ReceiverEnv::new(
                    &mut processing.message,
                    &mut processing.context,
                    &mut processing.sequence,
                    step.arguments.clone(),
                    state.registry.as_ref(),
                    ResumeHandle::new(processing.id, processing.steps, state.continuation.clone())
                );
                step.receiver.receive(&mut env).await
            };

            match outcome {
                Ok(ReceiverOutcome::Proceed) => {
                    processing.sequence.advance();
                }
                Ok(ReceiverOutcome::Pause) => {
                    event!(Level::DEBUG, event = processor_worker::STEP_PAUSED,
                           message_id = %processing.id, receiver = %step.receiver.name());
                    return Handoff::Park;
                }
                Err(fault) => {
                    if let Err(e) = self.raise(processing, fault) {
                        return Handoff::Finished(Err(e));
                    }
                    processing.sequence.advance();
                }
            }
        }
    }

    /// Record the fault in the context and route it to a fallback chain
    fn raise(&self, processing: &mut Processing, fault: Fault) -> Result<(), RuntimeError> {
        event!(Level::DEBUG, event = processor_worker::FAULT_RAISED,
               message_id = %processing.id, kind = %fault.kind(), fault = %fault);

        processing.context.set(EXCEPTION, fault.to_value());

        match processing.sequence.catch_fault(&fault, &mut processing.context) {
            Ok(()) => {
                if let Some(at) = FaultCoordinates::read(&processing.context) {
                    event!(Level::DEBUG, event = processor_worker::FAULT_CAUGHT,
                           message_id = %processing.id, kind = %fault.kind(),
                           cause_level = at.cause_level, cause_step = at.cause_step,
                           catch_level = at.catch_level, catch_step = at.catch_step);
                }
                Ok(())
            }
            Err(e) => {
                event!(Level::WARN, event = processor_worker::FAULT_UNHANDLED,
                       message_id = %processing.id, kind = %fault.kind(), error = %e);
                Err(e)
            }
        }
    }

    fn finish(&self, processing: Processing, result: Result<(), RuntimeError>, state: &ProcessorWorkerState) {
        let Processing { id, chain, sequence, message, context, reply, started_at, steps } = processing;

        let (kind, response) = match result {
            Ok(()) => {
                if let Some(fault) = sequence.completion_fault() {
                    event!(Level::WARN, event = processor_worker::COMPLETION_CALLBACK_FAILED,
                           message_id = %id, fault = %fault);
                }

                let outcome = match sequence.state() {
                    SequenceState::Terminated => ProcessingOutcome::Terminated,
                    _ => ProcessingOutcome::Completed
                };
                let kind = match outcome {
                    ProcessingOutcome::Completed => FinishKind::Completed,
                    ProcessingOutcome::Terminated => FinishKind::Terminated
                };

                let report = ProcessingReport {
                    id,
                    chain,
                    message,
                    context,
                    outcome,
                    completion_fault: sequence.completion_fault().cloned(),
                    steps,
                    started_at,
                    finished_at: Utc::now()
                };
                (kind, Ok(report))
            }
            Err(e) => (FinishKind::Failed, Err(e))
        };

        event!(Level::DEBUG, event = processor_worker::MESSAGE_COMPLETED,
               message_id = %id, worker = state.index, outcome = ?kind, steps = steps);

        if let Err(e) = state.dispatcher.cast(DispatcherMessage::Finished { id, kind }) {
            event!(Level::ERROR, event = processor_worker::HANDOFF_FAILED, message_id = %id, error = %e);
        }

        if let Some(reply) = reply {
            if let Err(e) = reply.send(response) {
                event!(Level::DEBUG, event = processor_worker::HANDOFF_FAILED,
                       message_id = %id, error = %e, message = "caller_gone");
            }
        }
    }

    fn hand_back(&self, message: DispatcherMessage, state: &ProcessorWorkerState) {
        if let Err(e) = state.dispatcher.cast(message) {
            event!(Level::ERROR, event = processor_worker::HANDOFF_FAILED, worker = state.index, error = %e);
        }
    }
}
