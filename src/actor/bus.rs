//! MessageBus - entry point of the actor system
//!
//! Spawns the dispatcher (which spawns its workers) and offers a small
//! request/response API over it.

use std::{sync::Arc, time::Duration};

use ractor::{
    Actor, ActorRef,
    rpc::{CallResult, call}
};
use tokio::task::JoinHandle;
use tracing::{Level, event};
use uuid::Uuid;

use crate::{
    actor::{
        dispatcher::{Dispatcher, DispatcherArguments},
        message::{DispatcherMessage, DispatcherStats, ProcessingReport}
    },
    config::RuntimeSettings,
    domain::{
        constant::message_bus,
        error::RuntimeError,
        record::{Message, MessageContext}
    },
    port::registry::ChainRegistry
};

pub struct MessageBus {
    dispatcher:   ActorRef<DispatcherMessage>,
    handle:       JoinHandle<()>,
    call_timeout: Duration
}

impl MessageBus {
    /// Validate `settings` and spawn the dispatcher with its worker pool
    pub async fn start(settings: &RuntimeSettings, registry: Arc<dyn ChainRegistry>) -> Result<Self, RuntimeError> {
        settings.validate()?;

        let name = format!("dispatcher_{}", Uuid::new_v4().simple());
        let args = DispatcherArguments { name: name.clone(), settings: settings.clone(), registry };

        let (dispatcher, handle) = Actor::spawn(Some(name.clone()), Dispatcher, args).await.map_err(|e| {
            event!(Level::ERROR, event = message_bus::BUS_START_FAILED, error = %e);
            RuntimeError::from(e)
        })?;

        event!(Level::INFO, event = message_bus::BUS_STARTED, dispatcher = %name, workers = settings.workers);

        Ok(Self { dispatcher, handle, call_timeout: settings.call_timeout() })
    }

    /// Run `message` through `chain` and wait for the final report
    pub async fn process(
        &self,
        chain: &str,
        message: Message,
        context: MessageContext
    ) -> Result<ProcessingReport, RuntimeError> {
        let id = Uuid::new_v4();

        match call(
            &self.dispatcher,
            |reply| DispatcherMessage::Submit { id, chain: chain.to_string(), message, context, reply: Some(reply) },
            Some(self.call_timeout)
        )
        .await
        {
            Ok(CallResult::Success(result)) => result,
            Ok(CallResult::Timeout) => Err(RuntimeError::Timeout(format!(
                "message {} did not finish within {} ms",
                id,
                self.call_timeout.as_millis()
            ))),
            Ok(CallResult::SenderError) => {
                Err(RuntimeError::Dispatch(format!("message {} was dropped before it finished", id)))
            }
            Err(e) => Err(RuntimeError::Dispatch(format!("failed to submit message {}: {}", id, e)))
        }
    }

    /// Submit `message` without waiting for it; returns its id
    pub fn post(&self, chain: &str, message: Message, context: MessageContext) -> Result<Uuid, RuntimeError> {
        let id = Uuid::new_v4();

        self.dispatcher
            .cast(DispatcherMessage::Submit { id, chain: chain.to_string(), message, context, reply: None })
            .map_err(|e| RuntimeError::Dispatch(format!("failed to post message {}: {}", id, e)))?;

        event!(Level::DEBUG, event = message_bus::MESSAGE_POSTED, message_id = %id, chain = %chain);
        Ok(id)
    }

    pub async fn stats(&self) -> Result<DispatcherStats, RuntimeError> {
        match call(&self.dispatcher, |reply| DispatcherMessage::GetStats { reply }, Some(self.call_timeout)).await {
            Ok(CallResult::Success(stats)) => Ok(stats),
            Ok(_) => Err(RuntimeError::Timeout("dispatcher did not report statistics".to_string())),
            Err(e) => Err(RuntimeError::Dispatch(e.to_string()))
        }
    }

    /// Fail parked messages, stop every actor and wait for the dispatcher to exit
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        event!(Level::DEBUG, event = message_bus::SHUTDOWN_REQUESTED);

        self.dispatcher.cast(DispatcherMessage::Shutdown).map_err(|e| RuntimeError::Dispatch(e.to_string()))?;
        self.handle.await.map_err(|e| RuntimeError::Dispatch(e.to_string()))
    }
}
