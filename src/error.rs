use std::{fmt, io};

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use tokio::task::JoinError;

/// Broad classes of [`BayesError`], used by callers that only care about who is at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The caller handed in a structurally invalid graph, level or distribution.
    Validation,
    /// A lookup by name missed.
    NotFound,
    /// The inference engine failed or answered with something unusable.
    Engine,
    /// Configuration, I/O, (de)serialization or runtime plumbing.
    Environment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum BayesError {
    #[error("Node {0} already exists in the network")]
    DuplicateNode(String),
    #[error("Node with the name '{0}' is already present in the network")]
    DuplicateName(String),
    #[error("Link {0} already exists in the network")]
    DuplicateLink(String),
    #[error("Node {0} belongs to another network")]
    ForeignNode(String),
    #[error("Node {0} doesn't exist in the network yet")]
    UnknownNode(String),
    #[error("Invalid node name: {0}")]
    InvalidName(String),
    #[error("Node {0} must have at least one level")]
    EmptyLevels(String),
    #[error("Node {node} doesn't contain level with name {level}")]
    InvalidLevel { node: String, level: String },
    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),
    #[error("Node {node} expects a table of {expected} values, got {actual}")]
    CptShape {
        node: String,
        expected: usize,
        actual: usize,
    },
    #[error("Network contains a cycle through node {0}")]
    Cycle(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Node {0} has no inference yet")]
    NoInference(String),
    #[error("Inference engine error: {0}")]
    Engine(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Operation cancelled before it completed")]
    OperationCancelled,
}

impl BayesError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BayesError::DuplicateNode(_) => ErrorKind::Validation,
            BayesError::DuplicateName(_) => ErrorKind::Validation,
            BayesError::DuplicateLink(_) => ErrorKind::Validation,
            BayesError::ForeignNode(_) => ErrorKind::Validation,
            BayesError::UnknownNode(_) => ErrorKind::Validation,
            BayesError::InvalidName(_) => ErrorKind::Validation,
            BayesError::EmptyLevels(_) => ErrorKind::Validation,
            BayesError::InvalidLevel { .. } => ErrorKind::Validation,
            BayesError::InvalidDistribution(_) => ErrorKind::Validation,
            BayesError::CptShape { .. } => ErrorKind::Validation,
            BayesError::Cycle(_) => ErrorKind::Validation,
            BayesError::NotFound(_) => ErrorKind::NotFound,
            BayesError::NoInference(_) => ErrorKind::NotFound,
            BayesError::Engine(_) => ErrorKind::Engine,
            BayesError::Config(_) => ErrorKind::Environment,
            BayesError::Io(_) => ErrorKind::Environment,
            BayesError::Serialization(_) => ErrorKind::Environment,
            BayesError::OperationCancelled => ErrorKind::Environment,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl From<toml::de::Error> for BayesError {
    fn from(src: toml::de::Error) -> BayesError {
        BayesError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for BayesError {
    fn from(src: toml::ser::Error) -> BayesError {
        BayesError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for BayesError {
    fn from(src: JsonError) -> BayesError {
        BayesError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for BayesError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => BayesError::NotFound(format!("{x}")),
            _ => BayesError::Io(format!("IOError: {}: {x}", x.kind())),
        }
    }
}

impl From<fmt::Error> for BayesError {
    fn from(x: fmt::Error) -> Self {
        BayesError::Engine(format!("command rendering failed: {x}"))
    }
}

impl From<RegexError> for BayesError {
    fn from(x: RegexError) -> Self {
        BayesError::Engine(format!("Regex parse failed: {x}"))
    }
}

impl From<JoinError> for BayesError {
    fn from(x: JoinError) -> Self {
        if x.is_cancelled() {
            BayesError::OperationCancelled
        } else {
            BayesError::Engine(format!("inference task panicked: {x}"))
        }
    }
}
