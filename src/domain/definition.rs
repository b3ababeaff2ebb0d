//! Chain definitions as they appear in configuration files
//!
//! # Example YAML structure
//! ```yaml
//! - name: main
//!   steps:
//!     - receiver: set
//!       arguments: { target: message, field: greeting, value: hello }
//!     - receiver: call_chain
//!       arguments: { chain: audit }
//!   exceptional:
//!     - fault: db            # db and every db.* kind
//!       chain: on_db_error
//!       after: end           # defaults to proceed
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{chain::AfterAction, fault::FaultMatcher};

/// A named chain before its receivers and fallbacks are resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDefinition {
    /// Unique chain name
    pub name:        String,
    /// Steps in execution order
    #[serde(default)]
    pub steps:       Vec<StepDefinition>,
    /// Fallbacks searched in declaration order
    #[serde(default)]
    pub exceptional: Vec<ExceptionalDefinition>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Name of a registered receiver
    pub receiver:  String,
    /// Arguments bound to this step
    #[serde(default)]
    pub arguments: Value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionalDefinition {
    /// Fault kind prefix or `*`
    pub fault: FaultMatcher,
    /// Name of the fallback chain
    pub chain: String,
    /// Name of the completion callback
    #[serde(default = "default_after")]
    pub after: String
}

fn default_after() -> String {
    AfterAction::PROCEED.to_string()
}
