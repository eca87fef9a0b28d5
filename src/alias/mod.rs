//! Alias module: symbolic names for a network inside the engine, and the commands that
//! build and query it.
//!
//! Translation is a pure function of the current graph: nothing here mutates the network
//! or talks to an engine. The orchestrators in [`crate::inference`] hand the produced
//! command values to an [`InferenceEngine`](crate::engine::InferenceEngine).
//!
//! Derived aliases follow the gRain convention: a network named `asia` becomes `bn.asia`,
//! a root node `asia` becomes `a` and a node `tub` with parent `asia` becomes `t.a`.
//! Two nodes may legitimately derive the same alias; register an explicit one with
//! [`NetworkAdapter::set_node_alias`] to tell them apart.

pub mod commands;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    error::BayesError,
    network::{Network, Node, NodeId, SharedNetwork},
};
pub use commands::{
    quoted_list, AbsorbEvidence, CompileModel, FetchMarginal, ImportLibrary, QueryJoint,
    QueryMarginal, Release, TableKind, TableSpec,
};

/// Either a caller-chosen name or one derived from the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alias {
    Explicit(String),
    #[default]
    Derived,
}

impl Alias {
    pub fn explicit(alias: Option<&str>) -> Self {
        match alias {
            Some(alias) if !alias.is_empty() => Alias::Explicit(alias.to_string()),
            _ => Alias::Derived,
        }
    }

    pub fn as_explicit(&self) -> Option<&str> {
        match self {
            Alias::Explicit(alias) if !alias.is_empty() => Some(alias),
            _ => None,
        }
    }
}

impl From<Option<String>> for Alias {
    fn from(alias: Option<String>) -> Self {
        Alias::explicit(alias.as_deref())
    }
}

/// The engine-side view of one network.
#[derive(Debug)]
pub struct NetworkAdapter {
    network: SharedNetwork,
    alias: Alias,
    resolved: OnceCell<String>,
    node_aliases: BTreeMap<String, String>,
}

impl NetworkAdapter {
    pub fn new(network: SharedNetwork) -> Self {
        NetworkAdapter::with_alias(network, Alias::Derived)
    }

    pub fn with_alias(network: SharedNetwork, alias: Alias) -> Self {
        NetworkAdapter {
            network,
            alias,
            resolved: OnceCell::new(),
            node_aliases: BTreeMap::new(),
        }
    }

    pub fn network(&self) -> &SharedNetwork {
        &self.network
    }

    /// The model's name in the engine: the explicit alias, or `bn.<network name>`.
    ///
    /// Resolved on first use and cached. Renaming the network afterwards does not change it.
    pub fn alias(&self) -> &str {
        self.resolved.get_or_init(|| match self.alias.as_explicit() {
            Some(alias) => alias.to_string(),
            None => format!("bn.{}", self.network.read().name()),
        })
    }

    pub fn set_alias(&mut self, alias: Alias) {
        self.alias = alias;
        self.resolved = OnceCell::new();
    }

    /// Registers an explicit alias for the node called `node_name`. An empty alias removes
    /// a previous registration.
    pub fn set_node_alias<N, A>(&mut self, node_name: N, alias: A)
    where
        N: Into<String>,
        A: Into<String>,
    {
        let (node_name, alias) = (node_name.into(), alias.into());
        if alias.is_empty() {
            self.node_aliases.remove(&node_name);
        } else {
            self.node_aliases.insert(node_name, alias);
        }
    }

    /// View of one member node. `network` must be the (locked) network this adapter wraps.
    pub fn node<'a>(
        &'a self,
        network: &'a Network,
        id: NodeId,
    ) -> Result<NodeAdapter<'a>, BayesError> {
        let node = network
            .node(id)
            .ok_or_else(|| BayesError::UnknownNode(id.to_string()))?;
        Ok(NodeAdapter {
            network,
            id,
            node,
            explicit: self.node_aliases.get(node.name()).map(String::as_str),
        })
    }

    /// Node aliases in insertion order.
    pub fn node_aliases(&self) -> Result<Vec<String>, BayesError> {
        let network = self.network.read();
        network
            .node_ids()
            .into_iter()
            .map(|id| Ok(self.node(&network, id)?.alias()))
            .collect()
    }

    /// One table creation per node, in insertion order.
    pub fn table_specs(&self) -> Result<Vec<TableSpec>, BayesError> {
        let network = self.network.read();
        network
            .node_ids()
            .into_iter()
            .map(|id| Ok(self.node(&network, id)?.table_spec()))
            .collect()
    }

    pub fn compile_command(&self) -> Result<CompileModel, BayesError> {
        let network_alias = self.alias().to_string();
        Ok(CompileModel {
            network_alias,
            node_aliases: self.node_aliases()?,
        })
    }

    /// Absorbs the network's current evidence into a new model bound to `temp`.
    pub fn absorb_command(&self, temp: &str) -> AbsorbEvidence {
        let base = self.alias().to_string();
        let snapshot = self.network.read().evidence_snapshot();
        AbsorbEvidence::from_snapshot(&base, temp, &snapshot)
    }
}

/// The engine-side view of one node, borrowed from a locked network.
#[derive(Debug, Clone, Copy)]
pub struct NodeAdapter<'a> {
    network: &'a Network,
    id: NodeId,
    node: &'a Node,
    explicit: Option<&'a str>,
}

fn initial(name: &str) -> &str {
    name.char_indices()
        .nth(1)
        .map(|(end, _)| &name[..end])
        .unwrap_or(name)
}

impl<'a> NodeAdapter<'a> {
    pub fn node(&self) -> &'a Node {
        self.node
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The explicit alias, otherwise the node's initial followed, when the node has parents,
    /// by a dot and the initial of each direct parent in link order: `tub` under `asia` is `t.a`.
    pub fn alias(&self) -> String {
        if let Some(alias) = self.explicit {
            return alias.to_string();
        }
        let parents = self.network.parents(self.id);
        let own = initial(self.node.name());
        if parents.is_empty() {
            own.to_string()
        } else {
            let tail: String = parents.iter().map(|p| initial(p.name())).collect();
            format!("{own}.{tail}")
        }
    }

    /// The node's own name followed by its parents' names in link order.
    pub fn formula(&self) -> Vec<String> {
        std::iter::once(self.node.name().to_string())
            .chain(
                self.network
                    .parents(self.id)
                    .into_iter()
                    .map(|p| p.name().to_string()),
            )
            .collect()
    }

    pub fn table_spec(&self) -> TableSpec {
        let kind = TableKind::from(self.node.combination());
        TableSpec {
            alias: self.alias(),
            kind,
            formula: self.formula(),
            values: match kind {
                TableKind::Conditional => Some(self.node.distribution().clone()),
                TableKind::And | TableKind::Or => None,
            },
            levels: self.node.levels().to_vec(),
        }
    }
}
