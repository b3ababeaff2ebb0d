//! In-memory chain registry
//!
//! Chains are assembled from definitions in a single construction-time
//! pass: receivers and completion callbacks are looked up by name once,
//! fallback chains are built before the chains that reference them, and the
//! result is a table of immutable `Arc<Chain>` values.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc
};

use tracing::{Level, event};

use crate::{
    adapter::receivers,
    domain::{
        chain::{AfterAction, Chain},
        constant::registry,
        definition::ChainDefinition,
        error::RuntimeError
    },
    port::{receiver::Receiver, registry::ChainRegistry}
};

/// Receivers available to chain definitions, by name
#[derive(Clone, Default)]
pub struct ReceiverTable {
    receivers: HashMap<String, Arc<dyn Receiver>>
}

impl ReceiverTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-populated with the built-in receivers
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        receivers::register_builtins(&mut table);
        table
    }

    /// Register a receiver, replacing any previous one with the same name
    pub fn register(&mut self, name: impl Into<String>, receiver: Arc<dyn Receiver>) -> &mut Self {
        self.receivers.insert(name.into(), receiver);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Receiver>> {
        self.receivers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.receivers.contains_key(name)
    }
}

/// Completion callbacks available to exceptional entries, by name
#[derive(Clone)]
pub struct AfterActionTable {
    actions: HashMap<String, AfterAction>
}

impl AfterActionTable {
    /// Table with `proceed` and `end`
    pub fn new() -> Self {
        let mut table = Self { actions: HashMap::new() };
        table.register(AfterAction::proceed());
        table.register(AfterAction::end());
        table
    }

    pub fn register(&mut self, action: AfterAction) -> &mut Self {
        self.actions.insert(action.name().to_string(), action);
        self
    }

    pub fn get(&self, name: &str) -> Option<AfterAction> {
        self.actions.get(name).cloned()
    }
}

impl Default for AfterActionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable name -> chain table
#[derive(Debug, Default)]
pub struct InMemoryChainRegistry {
    chains: BTreeMap<String, Arc<Chain>>
}

impl InMemoryChainRegistry {
    /// Registry over already constructed chains
    pub fn from_chains(chains: impl IntoIterator<Item = Arc<Chain>>) -> Self {
        Self { chains: chains.into_iter().map(|chain| (chain.name().to_string(), chain)).collect() }
    }

    /// Resolve every definition into an immutable chain.
    ///
    /// Fails on duplicate names, unknown receivers or completion callbacks,
    /// fallbacks naming unknown chains, and cycles through fallback references.
    pub fn build(
        definitions: &[ChainDefinition],
        receivers: &ReceiverTable,
        after_actions: &AfterActionTable
    ) -> Result<Self, RuntimeError> {
        let mut by_name: HashMap<&str, &ChainDefinition> = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            if by_name.insert(definition.name.as_str(), definition).is_some() {
                return Err(RuntimeError::InvalidConfiguration(format!(
                    "chain '{}' is defined more than once",
                    definition.name
                )));
            }
        }

        let mut builder = RegistryBuilder { definitions: by_name, receivers, after_actions, built: BTreeMap::new() };
        for definition in definitions {
            builder.build_chain(&definition.name, &mut Vec::new())?;
        }

        event!(Level::DEBUG, event = registry::REGISTRY_BUILT, chains = builder.built.len());

        Ok(Self { chains: builder.built })
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl ChainRegistry for InMemoryChainRegistry {
    fn resolve(&self, name: &str) -> Result<Arc<Chain>, RuntimeError> {
        self.chains.get(name).cloned().ok_or_else(|| RuntimeError::ChainNotFound(name.to_string()))
    }

    fn names(&self) -> Vec<String> {
        self.chains.keys().cloned().collect()
    }
}

struct RegistryBuilder<'a> {
    definitions:   HashMap<&'a str, &'a ChainDefinition>,
    receivers:     &'a ReceiverTable,
    after_actions: &'a AfterActionTable,
    built:         BTreeMap<String, Arc<Chain>>
}

impl RegistryBuilder<'_> {
    fn build_chain(&mut self, name: &str, visiting: &mut Vec<String>) -> Result<Arc<Chain>, RuntimeError> {
        if let Some(chain) = self.built.get(name) {
            return Ok(chain.clone());
        }
        if visiting.iter().any(|pending| pending == name) {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "exceptional chains form a cycle: {} -> {}",
                visiting.join(" -> "),
                name
            )));
        }

        let definition = *self.definitions.get(name).ok_or_else(|| RuntimeError::ChainNotFound(name.to_string()))?;
        visiting.push(name.to_string());

        let mut chain = Chain::builder(name);
        for step in &definition.steps {
            let receiver = self.receivers.get(&step.receiver).ok_or_else(|| {
                RuntimeError::InvalidConfiguration(format!("chain '{}' uses unknown receiver '{}'", name, step.receiver))
            })?;
            chain = chain.step(receiver, step.arguments.clone());
        }

        for entry in &definition.exceptional {
            let fallback = self.build_chain(&entry.chain, visiting)?;
            let after = self.after_actions.get(&entry.after).ok_or_else(|| {
                RuntimeError::InvalidConfiguration(format!(
                    "chain '{}' uses unknown completion callback '{}'",
                    name, entry.after
                ))
            })?;
            chain = chain.exceptional(entry.fault.clone(), fallback, after);
        }

        visiting.pop();

        let chain = chain.build();
        event!(Level::DEBUG, event = registry::CHAIN_REGISTERED, chain = %name, steps = chain.len(),
               fallbacks = chain.exceptional().len());
        self.built.insert(name.to_string(), chain.clone());

        Ok(chain)
    }
}
