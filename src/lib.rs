//! # bayesnet-core
//!
//! A Rust library for describing discrete Bayesian networks and querying them through an
//! external inference engine speaking the gRain command language.
//!
//! ## Overview
//!
//! bayesnet-core keeps the network itself (nodes, levels, conditional probability tables,
//! evidence) as an ordinary in-memory graph, and delegates the probability computation to an
//! engine. The crate translates the graph into engine commands, pushes the model once,
//! and then answers queries by absorbing the current evidence into short-lived scratch
//! models.
//!
//! ### Key Features
//!
//! - **Arena graph model**: nodes and links live in a `petgraph` graph owned by the network;
//!   back-references are ids, never pointers
//! - **Evidence state**: observed levels collapse a node's belief to a one-hot vector
//! - **Deterministic aliases**: `bn.asia`, `t.a`, `d.be`, overridable per network and node
//! - **Pluggable engines**: the seven-operation [`engine::InferenceEngine`] contract, an
//!   in-process exact interpreter and (feature `r`) a child `R` process
//! - **Blocking and pooled orchestrators**: [`inference::Inferer`] writes marginals into the
//!   network, [`inference::AsyncInferer`] resolves most-probable levels on a tokio pool
//! - **Collision-free scratch names**: every call gets its own `<alias>.temp.<n>` /
//!   `<alias>.res.<n>` pair, released on every exit path
//!
//! ## Architecture
//!
//! - **[`network`]**: `Network`, `Node`, `Link`, `Distribution`
//! - **[`alias`]**: `NetworkAdapter` and the gRain command values
//! - **[`engine`]**: `InferenceEngine`, `Session`, `GrainEngine`, `LocalSession`
//! - **[`inference`]**: `BayesInferer`, `Inferer`, `AsyncInferer`
//! - **[`codec`]**: networks described in TOML or JSON
//! - **[`config`]**: engine and pool settings
//!
//! ## Quick Start
//!
//! ### Marginals
//!
//! ```rust
//! use std::sync::Arc;
//! use bayesnet_core::{
//!     engine::GrainEngine,
//!     inference::{BayesInferer, Inferer},
//!     network::{Distribution, Network, Node},
//! };
//!
//! # fn main() -> Result<(), bayesnet_core::BayesError> {
//! let mut net = Network::new("weather");
//! let rain = net.add_node(Node::with_distribution(
//!     "rain",
//!     ["T", "F"],
//!     Distribution::from_weights([20, 80])?,
//! )?)?;
//! let sprinkler = net.add_node(Node::with_distribution(
//!     "sprinkler",
//!     ["T", "F"],
//!     Distribution::from_weights([1, 99, 40, 60])?,
//! )?)?;
//! net.add_link_between(rain, sprinkler)?;
//!
//! let network = net.into_shared();
//! network.write().set_evidence("sprinkler", "T")?;
//!
//! let inferer = Inferer::new(Arc::new(GrainEngine::local()), network.clone());
//! inferer.infer_node("rain")?;
//! let belief = network.read().node_by_name("rain")?.belief();
//! assert!(belief[0] < 0.1);
//! # Ok(())
//! # }
//! ```
//!
//! ### Most Probable Levels
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use bayesnet_core::{codec::NetworkSpec, engine::GrainEngine, inference::AsyncInferer};
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let network = NetworkSpec::from_path("weather.toml")?.into_network()?.into_shared();
//!     let inferer = AsyncInferer::new(Arc::new(GrainEngine::local()), network);
//!
//!     let levels = inferer.infer_most_probable_levels(&["rain", "sprinkler"])?.await?;
//!     println!("{levels:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **default**: graph model, translation, in-process engine, orchestrators
//! - **r**: the `RProcess` session driving an installed `R` with the gRain package

pub mod alias;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod inference;
pub mod network;
#[cfg(test)]
mod tests;

pub use error::*;
