//! Networks described as data.
//!
//! ```toml
//! name = "weather"
//!
//! [[nodes]]
//! name = "rain"
//! levels = ["T", "F"]
//! distribution = [20.0, 80.0]
//!
//! [[nodes]]
//! name = "sprinkler"
//! levels = ["T", "F"]
//! distribution = [1.0, 99.0, 40.0, 60.0]
//! parents = ["rain"]
//! ```

use serde::{Deserialize, Serialize};
use std::{fs::read_to_string, path::Path};

use crate::{
    error::BayesError,
    network::{Combination, Distribution, Network, Node},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub levels: Vec<String>,
    /// Flattened table, the node's own level varying fastest and then the parents in
    /// `parents` order. Omitted for a uniform table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "is_plain")]
    pub combination: Combination,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

fn is_plain(combination: &Combination) -> bool {
    *combination == Combination::Plain
}

impl NetworkSpec {
    pub fn from_toml_str(content: &str) -> Result<Self, BayesError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, BayesError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Reads a `.json` file as JSON and anything else as TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, BayesError> {
        let path = path.as_ref();
        tracing::debug!("Reading network description {:?}", path);
        let content = read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => NetworkSpec::from_json_str(&content),
            _ => NetworkSpec::from_toml_str(&content),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, BayesError> {
        Ok(toml::to_string(self)?)
    }

    pub fn to_json_string(&self) -> Result<String, BayesError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds the network: every node first, then the links in parent order, then the
    /// evidence.
    pub fn into_network(self) -> Result<Network, BayesError> {
        let mut network = Network::new(self.name);
        for spec in &self.nodes {
            let mut node = Node::with_combination(
                spec.name.as_str(),
                spec.levels.iter().map(String::as_str),
                spec.combination,
            )?;
            if let Some(values) = &spec.distribution {
                node.set_distribution(Distribution::new(values.clone())?);
            }
            network.add_node(node)?;
        }
        for spec in &self.nodes {
            for parent in &spec.parents {
                network.add_link_between(parent.as_str(), spec.name.as_str())?;
            }
        }
        for spec in &self.nodes {
            if let Some(level) = &spec.evidence {
                network.set_evidence(&spec.name, level)?;
            }
        }
        Ok(network)
    }
}

impl From<&Network> for NetworkSpec {
    fn from(network: &Network) -> Self {
        let nodes = network
            .nodes()
            .map(|(id, node)| NodeSpec {
                name: node.name().to_string(),
                levels: node.levels().to_vec(),
                distribution: node
                    .has_explicit_distribution()
                    .then(|| node.distribution().values().to_vec()),
                combination: node.combination(),
                parents: network
                    .parents(id)
                    .into_iter()
                    .map(|p| p.name().to_string())
                    .collect(),
                evidence: node.evidence().map(str::to_string),
            })
            .collect();
        NetworkSpec {
            name: network.name().to_string(),
            nodes,
        }
    }
}
