//! The network container: a node arena plus the links between nodes.

use parking_lot::RwLock;
use petgraph::{
    algo::toposort,
    graph::{DiGraph, EdgeIndex, NodeIndex},
};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use super::node::{Combination, Node};
use crate::error::BayesError;

static NEXT_NETWORK_ID: AtomicU64 = AtomicU64::new(1);

/// A network shared between the caller and one or more orchestrators.
pub type SharedNetwork = Arc<RwLock<Network>>;

/// Process-unique identity of a [`Network`]. Nodes and links keep it as their back-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId(u64);

impl NetworkId {
    fn next() -> Self {
        NetworkId(NEXT_NETWORK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net#{}", self.0)
    }
}

/// Arena index of a node, tagged with the network that issued it. A network only resolves
/// ids it issued itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    network: NetworkId,
    index: NodeIndex,
}

impl NodeId {
    pub fn index(&self) -> usize {
        self.index.index()
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/node#{}", self.network, self.index.index())
    }
}

/// Arena index of a link, tagged with the network that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId {
    network: NetworkId,
    index: EdgeIndex,
}

impl LinkId {
    pub fn index(&self) -> usize {
        self.index.index()
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }
}

/// A directed dependency from `parent` to `child`. Identity is the endpoint pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    parent: NodeId,
    child: NodeId,
    network: Option<NetworkId>,
}

impl Link {
    pub fn new(parent: NodeId, child: NodeId) -> Self {
        Link {
            parent,
            child,
            network: None,
        }
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn child(&self) -> NodeId {
        self.child
    }

    pub fn network(&self) -> Option<NetworkId> {
        self.network
    }
}

/// One end of a link handed to [`Network::add_link_between`].
#[derive(Debug)]
pub enum Endpoint {
    /// A node already registered in the network.
    Id(NodeId),
    /// A registered node looked up by name.
    Name(String),
    /// A node that is registered first if it isn't a member yet.
    Node(Node),
}

impl From<NodeId> for Endpoint {
    fn from(id: NodeId) -> Self {
        Endpoint::Id(id)
    }
}

impl From<&str> for Endpoint {
    fn from(name: &str) -> Self {
        Endpoint::Name(name.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(name: String) -> Self {
        Endpoint::Name(name)
    }
}

impl From<Node> for Endpoint {
    fn from(node: Node) -> Self {
        Endpoint::Node(node)
    }
}

/// A Bayesian network: insertion-ordered nodes with unique names and the links between them.
///
/// The underlying petgraph graph is the node arena; [`NodeId`] and [`LinkId`] index into
/// it. Nodes are never removed, so ids stay valid for the life of the network.
#[derive(Debug)]
pub struct Network {
    id: NetworkId,
    name: String,
    graph: DiGraph<Node, Link>,
}

impl Default for Network {
    fn default() -> Self {
        Network::new("")
    }
}

impl Network {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Network {
            id: NetworkId::next(),
            name: name.into(),
            graph: DiGraph::new(),
        }
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    pub fn into_shared(self) -> SharedNetwork {
        Arc::new(RwLock::new(self))
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn add_node(&mut self, mut node: Node) -> Result<NodeId, BayesError> {
        match node.network() {
            Some(net) if net == self.id => {
                return Err(BayesError::DuplicateNode(node.to_string()));
            }
            Some(net) => {
                return Err(BayesError::ForeignNode(format!("{node} (owned by {net})")));
            }
            None => {}
        }
        self.ensure_name_not_exists(node.name())?;
        node.attach(self.id);
        let index = self.graph.add_node(node);
        Ok(self.node_id_at(index))
    }

    pub fn add_nodes<I>(&mut self, nodes: I) -> Result<Vec<NodeId>, BayesError>
    where
        I: IntoIterator<Item = Node>,
    {
        nodes.into_iter().map(|node| self.add_node(node)).collect()
    }

    /// Registers a link between two existing members. Ids issued by another network are
    /// rejected with [`BayesError::UnknownNode`].
    pub fn add_link(&mut self, mut link: Link) -> Result<LinkId, BayesError> {
        let parent = self
            .member(link.parent)
            .ok_or_else(|| BayesError::UnknownNode(format!("parent {}", link.parent)))?;
        let child = self
            .member(link.child)
            .ok_or_else(|| BayesError::UnknownNode(format!("child {}", link.child)))?;
        if self.graph.find_edge(parent, child).is_some() {
            return Err(BayesError::DuplicateLink(self.describe_link(&link)));
        }
        link.network = Some(self.id);
        let id = LinkId {
            network: self.id,
            index: self.graph.add_edge(parent, child, link),
        };
        self.graph[parent].push_out_link(id);
        self.graph[child].push_in_link(id);
        Ok(id)
    }

    /// Links `parent` to `child`, registering either endpoint first when it is a node that
    /// isn't a member yet.
    pub fn add_link_between<P, C>(&mut self, parent: P, child: C) -> Result<LinkId, BayesError>
    where
        P: Into<Endpoint>,
        C: Into<Endpoint>,
    {
        let parent = self.resolve_endpoint(parent.into())?;
        let child = self.resolve_endpoint(child.into())?;
        self.add_link(Link::new(parent, child))
    }

    fn resolve_endpoint(&mut self, endpoint: Endpoint) -> Result<NodeId, BayesError> {
        match endpoint {
            Endpoint::Id(id) => match self.member(id) {
                Some(_) => Ok(id),
                None => Err(BayesError::UnknownNode(id.to_string())),
            },
            Endpoint::Name(name) => self.node_id(&name),
            Endpoint::Node(node) if node.network() == Some(self.id) => self.node_id(node.name()),
            Endpoint::Node(node) => self.add_node(node),
        }
    }

    fn ensure_name_not_exists(&self, name: &str) -> Result<(), BayesError> {
        if self.graph.node_weights().any(|n| n.name() == name) {
            return Err(BayesError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn describe_link(&self, link: &Link) -> String {
        let name = |id: NodeId| {
            self.node(id)
                .map(|n| n.name().to_string())
                .unwrap_or_else(|| id.to_string())
        };
        format!("Link{{parent={}, child={}}}", name(link.parent), name(link.child))
    }

    fn node_id_at(&self, index: NodeIndex) -> NodeId {
        NodeId {
            network: self.id,
            index,
        }
    }

    /// Arena index of `id` when this network issued it.
    fn member(&self, id: NodeId) -> Option<NodeIndex> {
        (id.network == self.id && self.graph.node_weight(id.index).is_some()).then_some(id.index)
    }

    /// `None` for ids issued by another network.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.member(id).map(|index| &self.graph[index])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let index = self.member(id)?;
        self.graph.node_weight_mut(index)
    }

    pub fn node_id(&self, name: &str) -> Result<NodeId, BayesError> {
        self.graph
            .node_indices()
            .find(|idx| self.graph[*idx].name() == name)
            .map(|idx| self.node_id_at(idx))
            .ok_or_else(|| BayesError::NotFound(format!("node '{name}'")))
    }

    pub fn node_by_name(&self, name: &str) -> Result<&Node, BayesError> {
        let id = self.node_id(name)?;
        Ok(&self.graph[id.index])
    }

    pub fn node_by_name_mut(&mut self, name: &str) -> Result<&mut Node, BayesError> {
        let id = self.node_id(name)?;
        Ok(&mut self.graph[id.index])
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.graph
            .node_indices()
            .map(move |idx| (self.node_id_at(idx), &self.graph[idx]))
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .map(|idx| self.node_id_at(idx))
            .collect()
    }

    /// Links in registration order.
    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> + '_ {
        self.graph.edge_indices().map(move |index| {
            (
                LinkId {
                    network: self.id,
                    index,
                },
                &self.graph[index],
            )
        })
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        if id.network != self.id {
            return None;
        }
        self.graph.edge_weight(id.index)
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_link(&self, parent: NodeId, child: NodeId) -> bool {
        match (self.member(parent), self.member(child)) {
            (Some(parent), Some(child)) => self.graph.find_edge(parent, child).is_some(),
            _ => false,
        }
    }

    /// Direct parents of `id`, in the order their links were registered.
    pub fn parents(&self, id: NodeId) -> Vec<&Node> {
        self.node(id)
            .map(|node| {
                node.in_links()
                    .iter()
                    .map(|link| &self.graph[self.graph[link.index].parent.index])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Direct children of `id`, in the order their links were registered.
    pub fn children(&self, id: NodeId) -> Vec<&Node> {
        self.node(id)
            .map(|node| {
                node.out_links()
                    .iter()
                    .map(|link| &self.graph[self.graph[link.index].child.index])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_evidence(&mut self, node_name: &str, level: &str) -> Result<(), BayesError> {
        self.node_by_name_mut(node_name)?.set_evidence(level)
    }

    pub fn clear_evidences(&mut self) {
        self.graph
            .node_weights_mut()
            .for_each(|node| node.clear_evidence());
    }

    /// `(name, level)` for every node currently fixed by evidence, in insertion order.
    pub fn evidence_snapshot(&self) -> Vec<(String, String)> {
        self.graph
            .node_weights()
            .filter_map(|node| {
                node.evidence()
                    .map(|level| (node.name().to_string(), level.to_string()))
            })
            .collect()
    }

    /// Node ids ordered so that every parent precedes its children.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, BayesError> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|idx| self.node_id_at(idx)).collect())
            .map_err(|cycle| BayesError::Cycle(self.graph[cycle.node_id()].name().to_string()))
    }

    /// Checks the invariants the engine relies on before a model is built from this network:
    /// the graph is acyclic, logical nodes have parents, and every explicitly assigned table
    /// has one block of values per parent configuration.
    pub fn validate(&self) -> Result<(), BayesError> {
        self.topological_order()?;
        for (id, node) in self.nodes() {
            let parents = self.parents(id);
            match node.combination() {
                Combination::And | Combination::Or => {
                    if parents.is_empty() {
                        return Err(BayesError::InvalidDistribution(format!(
                            "logical node {} needs at least one parent",
                            node.name()
                        )));
                    }
                }
                Combination::Plain if node.has_explicit_distribution() => {
                    let expected = parents
                        .iter()
                        .fold(node.levels().len(), |acc, p| acc * p.levels().len());
                    let actual = node.distribution().len();
                    if expected != actual {
                        return Err(BayesError::CptShape {
                            node: node.name().to_string(),
                            expected,
                            actual,
                        });
                    }
                }
                Combination::Plain => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BayesNet{{name={}}}", self.name)
    }
}
