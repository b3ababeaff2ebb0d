//! Receiver chains
//!
//! A chain is an ordered, immutable list of (receiver, arguments) steps
//! plus an exceptional-chain table. Chains are built once at load time and
//! shared read-only by every sequence that runs them.

use std::{fmt::Debug, sync::Arc};

use serde_json::Value;

use crate::{
    domain::{fault::Fault, fault::FaultMatcher, sequence::MessageProcessingSequence},
    port::receiver::Receiver
};

/// One step of a chain
#[derive(Clone)]
pub struct Step {
    pub receiver:  Arc<dyn Receiver>,
    pub arguments: Arc<Value>
}

impl Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step").field("receiver", &self.receiver.name()).field("arguments", &self.arguments).finish()
    }
}

type AfterFn = dyn Fn(&mut MessageProcessingSequence) -> Result<(), Fault> + Send + Sync;

/// Completion callback run when a fallback chain pushed by a catch is exhausted
#[derive(Clone)]
pub struct AfterAction {
    name:   String,
    action: Arc<AfterFn>
}

impl AfterAction {
    pub const PROCEED: &'static str = "proceed";
    pub const END: &'static str = "end";

    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut MessageProcessingSequence) -> Result<(), Fault> + Send + Sync + 'static
    {
        Self { name: name.into(), action: Arc::new(action) }
    }

    /// Continue with the step after the one that was active at the catching level
    pub fn proceed() -> Self {
        Self::new(Self::PROCEED, |_| Ok(()))
    }

    /// Stop processing the message
    pub fn end() -> Self {
        Self::new(Self::END, |sequence| {
            sequence.end();
            Ok(())
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run(&self, sequence: &mut MessageProcessingSequence) -> Result<(), Fault> {
        (self.action)(sequence)
    }
}

impl Debug for AfterAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AfterAction").field(&self.name).finish()
    }
}

/// Fallback declared by a chain for a family of faults
#[derive(Debug, Clone)]
pub struct ExceptionalEntry {
    pub matcher: FaultMatcher,
    pub chain:   Arc<Chain>,
    pub after:   AfterAction
}

/// Named, immutable list of steps with an exceptional-chain table
pub struct Chain {
    name:        String,
    steps:       Vec<Step>,
    exceptional: Vec<ExceptionalEntry>
}

impl Chain {
    pub fn builder(name: impl Into<String>) -> ChainBuilder {
        ChainBuilder { name: name.into(), steps: Vec::new(), exceptional: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn exceptional(&self) -> &[ExceptionalEntry] {
        &self.exceptional
    }

    /// First entry of the exceptional table that matches `fault`
    pub fn exceptional_entry(&self, fault: &Fault) -> Option<&ExceptionalEntry> {
        self.exceptional.iter().find(|entry| entry.matcher.matches(fault))
    }
}

impl Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("name", &self.name)
            .field("steps", &self.steps)
            .field(
                "exceptional",
                &self.exceptional.iter().map(|e| (e.matcher.to_string(), e.chain.name())).collect::<Vec<_>>()
            )
            .finish()
    }
}

pub struct ChainBuilder {
    name:        String,
    steps:       Vec<Step>,
    exceptional: Vec<ExceptionalEntry>
}

impl ChainBuilder {
    pub fn step(mut self, receiver: Arc<dyn Receiver>, arguments: Value) -> Self {
        self.steps.push(Step { receiver, arguments: Arc::new(arguments) });
        self
    }

    pub fn exceptional(mut self, matcher: FaultMatcher, chain: Arc<Chain>, after: AfterAction) -> Self {
        self.exceptional.push(ExceptionalEntry { matcher, chain, after });
        self
    }

    pub fn build(self) -> Arc<Chain> {
        Arc::new(Chain { name: self.name, steps: self.steps, exceptional: self.exceptional })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{chain_of, noop};

    #[test]
    fn test_steps_are_indexable_in_order() {
        let chain = Chain::builder("main").step(noop("a"), json!({ "x": 1 })).step(noop("b"), Value::Null).build();

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.step(0).unwrap().receiver.name(), "a");
        assert_eq!(chain.step(0).unwrap().arguments["x"], 1);
        assert_eq!(chain.step(1).unwrap().receiver.name(), "b");
        assert!(chain.step(2).is_none());
    }

    #[test]
    fn test_first_declared_matching_entry_wins() {
        let on_timeout = chain_of("on_timeout", &["t"]);
        let on_db = chain_of("on_db", &["d"]);
        let chain = Chain::builder("main")
            .step(noop("r"), Value::Null)
            .exceptional(FaultMatcher::kind("db.timeout"), on_timeout, AfterAction::end())
            .exceptional(FaultMatcher::kind("db"), on_db, AfterAction::proceed())
            .build();

        let entry = chain.exceptional_entry(&Fault::new("db.timeout", "slow")).unwrap();
        assert_eq!(entry.chain.name(), "on_timeout");
        assert_eq!(entry.after.name(), AfterAction::END);

        let entry = chain.exceptional_entry(&Fault::new("db.constraint", "dup")).unwrap();
        assert_eq!(entry.chain.name(), "on_db");

        assert!(chain.exceptional_entry(&Fault::new("http", "down")).is_none());
    }
}
