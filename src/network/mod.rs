//! Network module: the graph model of a discrete Bayesian network.
//!
//! # Module Organization
//!
//! - [`base`]: the [`Network`] container, ids and [`Link`]s
//! - [`node`]: [`Node`]s and their evidence state machine
//! - [`distribution`]: flattened conditional probability tables
//!
//! # Public API
//!
//! ```rust
//! use bayesnet_core::network::{Distribution, Network, Node};
//!
//! let mut net = Network::new("weather");
//! let rain = net
//!     .add_node(Node::with_distribution("rain", ["T", "F"], Distribution::from_weights([20, 80])?)?)?;
//! let sprinkler = net.add_node(Node::with_distribution(
//!     "sprinkler",
//!     ["T", "F"],
//!     Distribution::from_weights([1, 99, 40, 60])?,
//! )?)?;
//! net.add_link_between(rain, sprinkler)?;
//! net.set_evidence("sprinkler", "T")?;
//! assert_eq!(net.node_by_name("sprinkler")?.inference(), Some(&[1.0, 0.0][..]));
//! # Ok::<(), bayesnet_core::BayesError>(())
//! ```

mod base;
mod distribution;
mod node;


pub use base::{Endpoint, Link, LinkId, Network, NetworkId, NodeId, SharedNetwork};
pub use distribution::Distribution;
pub use node::{Combination, Node};
