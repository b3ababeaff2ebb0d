//! Domain Events - Structured events for internal monitoring and debugging

/// MessageBus Events
pub mod message_bus {
    pub const BUS_STARTED: &str = "bus.started";
    pub const BUS_START_FAILED: &str = "bus.start_failed";
    pub const MESSAGE_POSTED: &str = "message.posted";
    pub const SHUTDOWN_REQUESTED: &str = "bus.shutdown_requested";
}

/// Dispatcher Actor Events
pub mod dispatcher {
    pub const DISPATCHER_STARTED: &str = "dispatcher.started";
    pub const WORKER_SPAWNED: &str = "worker.spawned";
    pub const WORKER_SPAWN_FAILED: &str = "worker.spawn_failed";
    pub const MESSAGE_SUBMITTED: &str = "message.submitted";
    pub const MESSAGE_REJECTED: &str = "message.rejected";
    pub const TASK_ENQUEUED: &str = "task.enqueued";
    pub const TASK_ROUTING_FAILED: &str = "task.routing_failed";
    pub const MESSAGE_PARKED: &str = "message.parked";
    pub const MESSAGE_RESUMED: &str = "message.resumed";
    pub const RESUME_DEFERRED: &str = "message.resume_deferred";
    pub const RESUME_DISCARDED: &str = "message.resume_discarded";
    pub const PARK_EXPIRED: &str = "message.park_expired";
    pub const MESSAGE_FINISHED: &str = "message.finished";
    pub const REPLY_FAILED: &str = "reply.failed";
    pub const SHUTDOWN_STARTED: &str = "dispatcher.shutdown_started";
    pub const SHUTDOWN_COMPLETED: &str = "dispatcher.shutdown_completed";
}

/// ProcessorWorker Actor Events
pub mod processor_worker {
    pub const WORKER_STARTED: &str = "worker.started";
    pub const STEP_STARTED: &str = "step.started";
    pub const STEP_PAUSED: &str = "step.paused";
    pub const FAULT_RAISED: &str = "fault.raised";
    pub const FAULT_CAUGHT: &str = "fault.caught";
    pub const FAULT_UNHANDLED: &str = "fault.unhandled";
    pub const COMPLETION_CALLBACK_FAILED: &str = "completion_callback.failed";
    pub const TASK_YIELDED: &str = "task.yielded";
    pub const STEP_LIMIT_EXCEEDED: &str = "step.limit_exceeded";
    pub const MESSAGE_COMPLETED: &str = "message.completed";
    pub const HANDOFF_FAILED: &str = "handoff.failed";
}

/// Chain registry Events
pub mod registry {
    pub const CHAIN_REGISTERED: &str = "chain.registered";
    pub const REGISTRY_BUILT: &str = "registry.built";
}

/// Built-in receiver Events
pub mod receiver {
    pub const LOG: &str = "receiver.log";
}
