//! Built-in receivers
//!
//! Small control-flow and bookkeeping receivers available to every chain
//! definition without registration:
//!
//! | name         | arguments                                      |
//! |--------------|------------------------------------------------|
//! | `call_chain` | `{ chain: <name> }`                            |
//! | `end`        |                                                |
//! | `jump`       | `{ step: <index> }`                            |
//! | `raise`      | `{ kind, message, details? }`                  |
//! | `set`        | `{ target: message \| context, field, value }` |
//! | `log`        | `{ label? }`                                   |

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{Level, event};

use crate::{
    adapter::registry::ReceiverTable,
    domain::{constant::receiver, fault::Fault},
    port::receiver::{Receiver, ReceiverEnv, ReceiverOutcome}
};

pub const CALL_CHAIN: &str = "call_chain";
pub const END: &str = "end";
pub const JUMP: &str = "jump";
pub const RAISE: &str = "raise";
pub const SET: &str = "set";
pub const LOG: &str = "log";

pub fn register_builtins(table: &mut ReceiverTable) {
    table
        .register(CALL_CHAIN, Arc::new(CallChain))
        .register(END, Arc::new(End))
        .register(JUMP, Arc::new(Jump))
        .register(RAISE, Arc::new(Raise))
        .register(SET, Arc::new(Set))
        .register(LOG, Arc::new(Log));
}

/// Run another chain as a nested call, then continue after this step
pub struct CallChain;

#[async_trait]
impl Receiver for CallChain {
    async fn receive(&self, env: &mut ReceiverEnv<'_>) -> Result<ReceiverOutcome, Fault> {
        let chain = env.chains().resolve(env.argument_str("chain")?)?;
        env.sequence.invoke_nested_chain(chain)?;
        Ok(ReceiverOutcome::Proceed)
    }

    fn name(&self) -> &str {
        CALL_CHAIN
    }
}

/// Stop processing the message
pub struct End;

#[async_trait]
impl Receiver for End {
    async fn receive(&self, env: &mut ReceiverEnv<'_>) -> Result<ReceiverOutcome, Fault> {
        env.sequence.end();
        Ok(ReceiverOutcome::Proceed)
    }

    fn name(&self) -> &str {
        END
    }
}

/// Continue at another step of the chain this receiver belongs to
pub struct Jump;

#[async_trait]
impl Receiver for Jump {
    async fn receive(&self, env: &mut ReceiverEnv<'_>) -> Result<ReceiverOutcome, Fault> {
        let step = env.argument_usize("step")?;
        let level = env
            .sequence
            .current_level()
            .ok_or_else(|| Fault::new("receiver.jump", "sequence has no active level"))?;
        env.sequence.go_to(level, step)?;
        Ok(ReceiverOutcome::Proceed)
    }

    fn name(&self) -> &str {
        JUMP
    }
}

/// Raise the configured fault
pub struct Raise;

#[async_trait]
impl Receiver for Raise {
    async fn receive(&self, env: &mut ReceiverEnv<'_>) -> Result<ReceiverOutcome, Fault> {
        let mut fault = Fault::new(env.argument_str("kind")?, env.argument_str("message").unwrap_or_default());
        if let Some(details) = env.arguments().get("details") {
            fault = fault.with_details(details.clone());
        }
        Err(fault)
    }

    fn name(&self) -> &str {
        RAISE
    }
}

/// Write a field into the message or its context
pub struct Set;

#[async_trait]
impl Receiver for Set {
    async fn receive(&self, env: &mut ReceiverEnv<'_>) -> Result<ReceiverOutcome, Fault> {
        let field = env.argument_str("field")?.to_string();
        let value = env.arguments().get("value").cloned().unwrap_or(Value::Null);
        let target = env.arguments().get("target").and_then(Value::as_str).unwrap_or("message").to_string();

        match target.as_str() {
            "message" => env.message.set(field, value),
            "context" => env.context.set(field, value),
            other => {
                return Err(Fault::new("receiver.arguments", format!("unknown set target '{}'", other)));
            }
        };

        Ok(ReceiverOutcome::Proceed)
    }

    fn name(&self) -> &str {
        SET
    }
}

/// Emit the message as a tracing event
pub struct Log;

#[async_trait]
impl Receiver for Log {
    async fn receive(&self, env: &mut ReceiverEnv<'_>) -> Result<ReceiverOutcome, Fault> {
        let label = env.arguments().get("label").and_then(Value::as_str).unwrap_or(LOG);
        let body = serde_json::to_string(&*env.message).unwrap_or_default();

        event!(Level::INFO, event = receiver::LOG, message_id = %env.message_id(), label = %label, message = %body);

        Ok(ReceiverOutcome::Proceed)
    }

    fn name(&self) -> &str {
        LOG
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        adapter::registry::InMemoryChainRegistry,
        domain::{
            chain::Chain,
            record::{Message, MessageContext},
            sequence::MessageProcessingSequence
        },
        testing::{chain_of, current_name, detached_handle}
    };

    struct Harness {
        message:  Message,
        context:  MessageContext,
        sequence: MessageProcessingSequence,
        registry: InMemoryChainRegistry
    }

    impl Harness {
        fn new(entry: Arc<Chain>, others: Vec<Arc<Chain>>) -> Self {
            Self {
                message:  Message::new(),
                context:  MessageContext::new(),
                sequence: MessageProcessingSequence::new(4, entry).unwrap(),
                registry: InMemoryChainRegistry::from_chains(others)
            }
        }

        async fn run(&mut self, receiver: &dyn Receiver, arguments: Value) -> Result<ReceiverOutcome, Fault> {
            let (handle, _) = detached_handle();
            let mut env = ReceiverEnv::new(
                &mut self.message,
                &mut self.context,
                &mut self.sequence,
                Arc::new(arguments),
                &self.registry,
                handle
            );
            receiver.receive(&mut env).await
        }
    }

    #[tokio::test]
    async fn test_call_chain_pushes_resolved_chain() {
        let mut harness = Harness::new(chain_of("main", &["a", "b"]), vec![chain_of("audit", &["x"])]);

        harness.run(&CallChain, json!({ "chain": "audit" })).await.unwrap();

        assert_eq!(harness.sequence.depth(), 2);
        assert!(harness.sequence.advance());
        assert_eq!(current_name(&harness.sequence).as_deref(), Some("x"));
        assert!(harness.sequence.advance());
        assert_eq!(current_name(&harness.sequence).as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_call_chain_unknown_chain_raises_fault() {
        let mut harness = Harness::new(chain_of("main", &["a"]), vec![]);

        let fault = harness.run(&CallChain, json!({ "chain": "ghost" })).await.unwrap_err();

        assert_eq!(fault.kind(), "runtime.chain_not_found");
        assert_eq!(harness.sequence.depth(), 1);
    }

    #[tokio::test]
    async fn test_call_chain_without_argument_raises_fault() {
        let mut harness = Harness::new(chain_of("main", &["a"]), vec![]);

        let fault = harness.run(&CallChain, Value::Null).await.unwrap_err();

        assert_eq!(fault.kind(), "receiver.arguments");
    }

    #[tokio::test]
    async fn test_end_terminates_sequence() {
        let mut harness = Harness::new(chain_of("main", &["a", "b"]), vec![]);

        harness.run(&End, Value::Null).await.unwrap();

        assert!(!harness.sequence.advance());
        assert!(!harness.sequence.is_active());
    }

    #[tokio::test]
    async fn test_jump_repositions_within_current_chain() {
        let mut harness = Harness::new(chain_of("main", &["a", "b", "c"]), vec![]);

        harness.run(&Jump, json!({ "step": 2 })).await.unwrap();

        assert!(harness.sequence.advance());
        assert_eq!(current_name(&harness.sequence).as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_jump_past_chain_end_is_rejected() {
        let mut harness = Harness::new(chain_of("main", &["a"]), vec![]);

        let fault = harness.run(&Jump, json!({ "step": 5 })).await.unwrap_err();

        assert_eq!(fault.kind(), "runtime.invalid_position");
    }

    #[tokio::test]
    async fn test_raise_returns_configured_fault() {
        let mut harness = Harness::new(chain_of("main", &["a"]), vec![]);

        let fault = harness
            .run(&Raise, json!({ "kind": "db.timeout", "message": "slow", "details": { "ms": 30 } }))
            .await
            .unwrap_err();

        assert_eq!(fault.kind(), "db.timeout");
        assert_eq!(fault.message(), "slow");
        assert_eq!(fault.details().unwrap()["ms"], 30);
    }

    #[tokio::test]
    async fn test_set_writes_message_and_context() {
        let mut harness = Harness::new(chain_of("main", &["a"]), vec![]);

        harness.run(&Set, json!({ "field": "greeting", "value": "hello" })).await.unwrap();
        harness.run(&Set, json!({ "target": "context", "field": "seen", "value": true })).await.unwrap();

        assert_eq!(harness.message.get_str("greeting"), Some("hello"));
        assert_eq!(harness.context.get("seen"), Some(&json!(true)));

        let fault = harness.run(&Set, json!({ "target": "elsewhere", "field": "x" })).await.unwrap_err();
        assert_eq!(fault.kind(), "receiver.arguments");
    }

    #[tokio::test]
    async fn test_log_proceeds() {
        let mut harness = Harness::new(chain_of("main", &["a"]), vec![]);

        assert_eq!(harness.run(&Log, json!({ "label": "trace" })).await.unwrap(), ReceiverOutcome::Proceed);
    }

    #[test]
    fn test_builtins_are_registered() {
        let table = ReceiverTable::with_builtins();

        for name in [CALL_CHAIN, END, JUMP, RAISE, SET, LOG] {
            assert!(table.contains(name), "missing {}", name);
        }
    }
}
