//! Dispatcher Actor - owns the task queue and the worker pool
//!
//! - Spawns a fixed pool of linked ProcessorWorker actors
//! - Turns submissions into processings and hands them to workers round-robin
//! - Requeues processings whose task budget ran out
//! - Parks paused processings until resumed or expired
//! - Keeps processing statistics

use std::{
    collections::{HashMap, HashSet},
    sync::Arc
};

use ractor::{Actor, ActorProcessingErr, ActorRef, MessagingErr, RpcReplyPort};
use tracing::{Level, event};
use uuid::Uuid;

use crate::{
    actor::{
        message::{
            DispatcherMessage, DispatcherStats, FinishKind, Processing, ProcessingReply, ProcessorMessage, Resumption
        },
        processor::{ProcessorWorker, WorkerArguments}
    },
    config::RuntimeSettings,
    domain::{
        constant::dispatcher,
        error::RuntimeError,
        fault::Fault,
        record::{Message, MessageContext},
        sequence::MessageProcessingSequence
    },
    port::{receiver::Continuation, registry::ChainRegistry}
};

pub struct DispatcherArguments {
    /// Prefix for worker actor names
    pub name:     String,
    pub settings: RuntimeSettings,
    pub registry: Arc<dyn ChainRegistry>
}

struct Parked {
    processing: Box<Processing>,
    generation: u64
}

/// A resume that reached the dispatcher while its message was still running
struct EarlyResume {
    pause: u64,
    fault: Option<Fault>
}

/// Dispatcher Actor State
pub struct DispatcherState {
    settings:        RuntimeSettings,
    registry:        Arc<dyn ChainRegistry>,
    workers:         Vec<ActorRef<ProcessorMessage>>,
    next_worker:     usize,
    /// Messages owned by a worker or parked
    active:          HashSet<Uuid>,
    parked:          HashMap<Uuid, Parked>,
    /// Resumes that arrived before the matching park, newest pause only
    early_resumes:   HashMap<Uuid, EarlyResume>,
    park_generation: u64,
    stats:           DispatcherStats
}

/// Dispatcher Actor
pub struct Dispatcher;

#[async_trait::async_trait]
impl Actor for Dispatcher {
    type Arguments = DispatcherArguments;
    type Msg = DispatcherMessage;
    type State = DispatcherState;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments
    ) -> Result<Self::State, ActorProcessingErr> {
        event!(Level::DEBUG, event = dispatcher::DISPATCHER_STARTED,
               workers = args.settings.workers, stack_depth = args.settings.stack_depth);

        let mut workers = Vec::with_capacity(args.settings.workers);
        for index in 0..args.settings.workers {
            let worker_args = WorkerArguments {
                index,
                dispatcher: myself.clone(),
                registry: args.registry.clone(),
                steps_per_task: args.settings.steps_per_task,
                max_steps: args.settings.max_steps
            };

            match Actor::spawn_linked(
                Some(format!("{}_worker_{}", args.name, index)),
                ProcessorWorker,
                worker_args,
                myself.get_cell()
            )
            .await
            {
                Ok((worker, _handle)) => {
                    event!(Level::DEBUG, event = dispatcher::WORKER_SPAWNED, worker = index);
                    workers.push(worker);
                }
                Err(e) => {
                    event!(Level::ERROR, event = dispatcher::WORKER_SPAWN_FAILED, worker = index, error = %e);
                    return Err(ActorProcessingErr::from(format!("failed to spawn worker {}: {}", index, e)));
                }
            }
        }

        Ok(DispatcherState {
            settings: args.settings,
            registry: args.registry,
            workers,
            next_worker: 0,
            active: HashSet::new(),
            parked: HashMap::new(),
            early_resumes: HashMap::new(),
            park_generation: 0,
            stats: DispatcherStats::default()
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DispatcherMessage::Submit { id, chain, message, context, reply } => {
                self.handle_submit(id, chain, message, context, reply, state);
            }
            DispatcherMessage::Continue(processing) => {
                self.route(processing, Resumption::Current, state);
            }
            DispatcherMessage::Park(processing) => self.handle_park(myself, processing, state),
            DispatcherMessage::Resume { id, pause, fault } => self.handle_resume(id, pause, fault, state),
            DispatcherMessage::ExpireParked { id, generation } => self.handle_expire(id, generation, state),
            DispatcherMessage::Finished { id, kind } => self.handle_finished(id, kind, state),
            DispatcherMessage::GetStats { reply } => self.handle_get_stats(reply, state),
            DispatcherMessage::Shutdown => self.handle_shutdown(myself, state)
        }
        Ok(())
    }
}

impl Dispatcher {
    fn handle_submit(
        &self,
        id: Uuid,
        chain: String,
        message: Message,
        context: MessageContext,
        reply: Option<ProcessingReply>,
        state: &mut DispatcherState
    ) {
        state.stats.submitted += 1;

        let sequence = state
            .registry
            .resolve(&chain)
            .and_then(|entry| MessageProcessingSequence::new(state.settings.stack_depth, entry));

        match sequence {
            Ok(sequence) => {
                event!(Level::DEBUG, event = dispatcher::MESSAGE_SUBMITTED, message_id = %id, chain = %chain);

                state.active.insert(id);
                let processing = Processing::new(id, chain, sequence, message, context, reply);
                self.route(Box::new(processing), Resumption::Current, state);
            }
            Err(e) => {
                event!(Level::WARN, event = dispatcher::MESSAGE_REJECTED, message_id = %id, chain = %chain, error = %e);

                state.stats.failed += 1;
                if let Some(reply) = reply {
                    Self::reply(reply, Err(e));
                }
            }
        }
    }

    /// Hand a processing to the next worker
    fn route(&self, processing: Box<Processing>, resumption: Resumption, state: &mut DispatcherState) {
        let id = processing.id;
        let index = state.next_worker % state.workers.len().max(1);
        state.next_worker = state.next_worker.wrapping_add(1);

        let Some(worker) = state.workers.get(index) else {
            self.fail(*processing, RuntimeError::Dispatch("no processor workers".to_string()), state);
            return;
        };

        event!(Level::TRACE, event = dispatcher::TASK_ENQUEUED, message_id = %id, worker = index);

        match worker.cast(ProcessorMessage::Run { processing, resumption }) {
            Ok(()) => {}
            Err(MessagingErr::SendErr(ProcessorMessage::Run { processing, .. })) => {
                event!(Level::ERROR, event = dispatcher::TASK_ROUTING_FAILED, message_id = %id, worker = index);
                self.fail(*processing, RuntimeError::Dispatch(format!("worker {} is not running", index)), state);
            }
            Err(e) => {
                event!(Level::ERROR, event = dispatcher::TASK_ROUTING_FAILED,
                       message_id = %id, worker = index, error = %e);
                state.active.remove(&id);
                state.stats.failed += 1;
            }
        }
    }

    fn handle_park(&self, myself: ActorRef<DispatcherMessage>, processing: Box<Processing>, state: &mut DispatcherState) {
        let id = processing.id;
        let pause = processing.steps;

        if let Some(early) = state.early_resumes.remove(&id) {
            if early.pause == pause {
                event!(Level::DEBUG, event = dispatcher::MESSAGE_RESUMED,
                       message_id = %id, pause = pause, message = "resumed_before_park");
                self.route(processing, Self::resumption(early.fault), state);
                return;
            }
            event!(Level::DEBUG, event = dispatcher::RESUME_DISCARDED,
                   message_id = %id, pause = early.pause, expected = pause);
        }

        state.park_generation += 1;
        let generation = state.park_generation;
        state.parked.insert(id, Parked { processing, generation });

        event!(Level::DEBUG, event = dispatcher::MESSAGE_PARKED, message_id = %id, generation = generation);

        myself.send_after(state.settings.pause_timeout(), move || DispatcherMessage::ExpireParked { id, generation });
    }

    fn handle_resume(&self, id: Uuid, pause: u64, fault: Option<Fault>, state: &mut DispatcherState) {
        if let Some(parked) = state.parked.get(&id) {
            let expected = parked.processing.steps;
            if expected != pause {
                event!(Level::DEBUG, event = dispatcher::RESUME_DISCARDED,
                       message_id = %id, pause = pause, expected = expected);
                return;
            }
            if let Some(parked) = state.parked.remove(&id) {
                event!(Level::DEBUG, event = dispatcher::MESSAGE_RESUMED,
                       message_id = %id, pause = pause, with_fault = fault.is_some());
                self.route(parked.processing, Self::resumption(fault), state);
            }
        } else if state.active.contains(&id) {
            // Pause tokens only grow, so an older pending resume can never match again
            let newer = state.early_resumes.get(&id).is_none_or(|early| early.pause < pause);
            if newer {
                event!(Level::DEBUG, event = dispatcher::RESUME_DEFERRED, message_id = %id, pause = pause);
                state.early_resumes.insert(id, EarlyResume { pause, fault });
            } else {
                event!(Level::DEBUG, event = dispatcher::RESUME_DISCARDED, message_id = %id, pause = pause);
            }
        } else {
            event!(Level::WARN, event = dispatcher::RESUME_DEFERRED, message_id = %id, message = "unknown_message");
        }
    }

    fn handle_expire(&self, id: Uuid, generation: u64, state: &mut DispatcherState) {
        let current = state.parked.get(&id).is_some_and(|parked| parked.generation == generation);
        if !current {
            return;
        }

        if let Some(parked) = state.parked.remove(&id) {
            event!(Level::WARN, event = dispatcher::PARK_EXPIRED, message_id = %id, chain = %parked.processing.chain);

            state.active.remove(&id);
            state.early_resumes.remove(&id);
            state.stats.expired += 1;
            if let Some(reply) = parked.processing.reply {
                Self::reply(
                    reply,
                    Err(RuntimeError::Timeout(format!(
                        "message {} was not resumed within {} ms",
                        id, state.settings.pause_timeout_ms
                    )))
                );
            }
        }
    }

    fn handle_finished(&self, id: Uuid, kind: FinishKind, state: &mut DispatcherState) {
        event!(Level::DEBUG, event = dispatcher::MESSAGE_FINISHED, message_id = %id, outcome = ?kind);

        state.active.remove(&id);
        state.early_resumes.remove(&id);
        match kind {
            FinishKind::Completed => state.stats.completed += 1,
            FinishKind::Terminated => state.stats.terminated += 1,
            FinishKind::Failed => state.stats.failed += 1
        }
    }

    fn handle_get_stats(&self, reply: RpcReplyPort<DispatcherStats>, state: &DispatcherState) {
        let stats = DispatcherStats { in_flight: state.active.len(), parked: state.parked.len(), ..state.stats };
        if let Err(e) = reply.send(stats) {
            event!(Level::ERROR, event = dispatcher::REPLY_FAILED, error = %e);
        }
    }

    fn handle_shutdown(&self, myself: ActorRef<DispatcherMessage>, state: &mut DispatcherState) {
        event!(Level::DEBUG, event = dispatcher::SHUTDOWN_STARTED,
               in_flight = state.active.len(), parked = state.parked.len());

        let parked: Vec<Parked> = state.parked.drain().map(|(_, parked)| parked).collect();
        for parked in parked {
            self.fail(*parked.processing, RuntimeError::Dispatch("message bus is shutting down".to_string()), state);
        }

        for worker in &state.workers {
            worker.stop(None);
        }
        myself.stop(None);

        event!(Level::INFO, event = dispatcher::SHUTDOWN_COMPLETED);
    }

    fn fail(&self, processing: Processing, error: RuntimeError, state: &mut DispatcherState) {
        state.active.remove(&processing.id);
        state.early_resumes.remove(&processing.id);
        state.stats.failed += 1;
        if let Some(reply) = processing.reply {
            Self::reply(reply, Err(error));
        }
    }

    fn resumption(fault: Option<Fault>) -> Resumption {
        match fault {
            Some(fault) => Resumption::Raise(fault),
            None => Resumption::Next
        }
    }

    fn reply<T>(reply: RpcReplyPort<T>, value: T)
    where
        T: Send + 'static
    {
        if let Err(e) = reply.send(value) {
            event!(Level::DEBUG, event = dispatcher::REPLY_FAILED, error = %e);
        }
    }
}

/// Resume requests from pausing receivers go through the dispatcher mailbox
impl Continuation for ActorRef<DispatcherMessage> {
    fn resume(&self, message_id: Uuid, pause: u64, fault: Option<Fault>) -> Result<(), RuntimeError> {
        self.cast(DispatcherMessage::Resume { id: message_id, pause, fault })
            .map_err(|e| RuntimeError::Dispatch(format!("failed to resume message {}: {}", message_id, e)))
    }
}
