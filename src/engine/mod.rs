//! Engine module: the boundary to the component that actually computes beliefs.
//!
//! [`InferenceEngine`] is the seven-operation contract the orchestrators program against.
//! [`GrainEngine`] implements it for any [`Session`] that evaluates gRain command text; two
//! sessions ship with the crate:
//!
//! - [`LocalSession`]: in-process, exact inference by enumeration
//! - `RProcess` (feature `r`): a child `R` process with the gRain package loaded

mod grain;
mod local;
#[cfg(feature = "r")]
mod rprocess;

use std::{collections::BTreeMap, fmt};

use crate::{
    alias::{AbsorbEvidence, CompileModel, ImportLibrary, QueryJoint, QueryMarginal, TableSpec},
    error::BayesError,
};

pub use grain::GrainEngine;
pub use local::LocalSession;
#[cfg(feature = "r")]
pub use rprocess::RProcess;

/// Marginal beliefs by node name. Nodes fixed by evidence in the queried model are absent.
pub type Marginals = BTreeMap<String, Vec<f64>>;

/// What evaluating one command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
    Null,
    Numbers(Vec<f64>),
}

impl EngineValue {
    pub fn is_null(&self) -> bool {
        matches!(self, EngineValue::Null)
    }

    pub fn into_numbers(self) -> Option<Vec<f64>> {
        match self {
            EngineValue::Null => None,
            EngineValue::Numbers(values) => Some(values),
        }
    }
}

impl fmt::Display for EngineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineValue::Null => f.write_str("NULL"),
            EngineValue::Numbers(values) => write!(f, "{values:?}"),
        }
    }
}

/// A stateful interpreter for gRain command text.
pub trait Session: Send {
    fn eval(&mut self, command: &str) -> Result<EngineValue, BayesError>;
}

impl<S: Session + ?Sized> Session for Box<S> {
    fn eval(&mut self, command: &str) -> Result<EngineValue, BayesError> {
        (**self).eval(command)
    }
}

/// The operations an orchestrator needs from an inference engine.
///
/// Implementations are shared between threads and must serialize their own access to any
/// underlying session.
pub trait InferenceEngine: Send + Sync {
    /// Prepares the session for later commands. Importing twice is harmless.
    fn import_library(&self, library: &ImportLibrary) -> Result<(), BayesError>;

    fn create_table(&self, table: &TableSpec) -> Result<(), BayesError>;

    fn compile_model(&self, model: &CompileModel) -> Result<(), BayesError>;

    fn absorb_evidence(&self, evidence: &AbsorbEvidence) -> Result<(), BayesError>;

    /// Queries and binds the marginals under `query.result`, then reads back one vector per
    /// requested node.
    fn query_marginal(&self, query: &QueryMarginal) -> Result<Marginals, BayesError>;

    fn query_joint(&self, query: &QueryJoint) -> Result<Vec<f64>, BayesError>;

    /// Frees a binding. Must succeed for names that were never bound.
    fn release(&self, name: &str) -> Result<(), BayesError>;
}
