//! Network nodes and their evidence state.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{
    base::{LinkId, NetworkId},
    distribution::Distribution,
};
use crate::error::BayesError;

/// How a node combines its parents.
///
/// Plain nodes carry an explicit conditional probability table. Logical nodes are
/// deterministic: their first level is "true" exactly when all (`And`) or any (`Or`) of the
/// parents sit at their own first level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combination {
    #[default]
    Plain,
    And,
    Or,
}

/// A discrete random variable.
///
/// A node is built standalone and then moved into a [`Network`](super::Network), which
/// records its own [`NetworkId`] on the node and keeps its incoming and outgoing links in
/// registration order.
///
/// Evidence state: with no evidence the inference vector holds whatever the last query
/// produced (or nothing). Fixing evidence replaces it with a one-hot vector; clearing the
/// evidence discards it.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    levels: Vec<String>,
    distribution: OnceCell<Distribution>,
    explicit_distribution: bool,
    combination: Combination,
    evidence: Option<usize>,
    inference: Option<Vec<f64>>,
    network: Option<NetworkId>,
    in_links: Vec<LinkId>,
    out_links: Vec<LinkId>,
}

/// Names double as engine symbols.
fn is_symbol(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_alphabetic() || first == '.')
        && chars.all(|c| c.is_alphabetic() || c.is_numeric() || c == '_' || c == '.')
}

impl Node {
    pub fn new<S, L, I>(name: S, levels: I) -> Result<Self, BayesError>
    where
        S: Into<String>,
        L: Into<String>,
        I: IntoIterator<Item = L>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BayesError::InvalidName(
                "node name cannot be empty".to_string(),
            ));
        }
        if !is_symbol(&name) {
            return Err(BayesError::InvalidName(format!(
                "node name {name:?} must start with a letter or '.' and continue with letters, digits, '_' or '.'"
            )));
        }
        let levels: Vec<String> = levels.into_iter().map(Into::into).collect();
        if levels.is_empty() {
            return Err(BayesError::EmptyLevels(name));
        }
        Ok(Node {
            name,
            levels,
            distribution: OnceCell::new(),
            explicit_distribution: false,
            combination: Combination::Plain,
            evidence: None,
            inference: None,
            network: None,
            in_links: Vec::new(),
            out_links: Vec::new(),
        })
    }

    pub fn with_distribution<S, L, I>(
        name: S,
        levels: I,
        distribution: Distribution,
    ) -> Result<Self, BayesError>
    where
        S: Into<String>,
        L: Into<String>,
        I: IntoIterator<Item = L>,
    {
        let mut node = Node::new(name, levels)?;
        node.set_distribution(distribution);
        Ok(node)
    }

    pub fn with_combination<S, L, I>(
        name: S,
        levels: I,
        combination: Combination,
    ) -> Result<Self, BayesError>
    where
        S: Into<String>,
        L: Into<String>,
        I: IntoIterator<Item = L>,
    {
        let mut node = Node::new(name, levels)?;
        node.combination = combination;
        Ok(node)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// The node's table, materializing (and caching) a uniform one over the levels if none
    /// was ever assigned.
    pub fn distribution(&self) -> &Distribution {
        self.distribution
            .get_or_init(|| Distribution::uniform(self.levels.len()))
    }

    pub fn set_distribution(&mut self, distribution: Distribution) {
        self.distribution = OnceCell::with_value(distribution);
        self.explicit_distribution = true;
    }

    /// True when the table was assigned rather than defaulted.
    pub fn has_explicit_distribution(&self) -> bool {
        self.explicit_distribution
    }

    pub fn combination(&self) -> Combination {
        self.combination
    }

    pub fn set_combination(&mut self, combination: Combination) {
        self.combination = combination;
    }

    pub fn network(&self) -> Option<NetworkId> {
        self.network
    }

    pub(crate) fn attach(&mut self, network: NetworkId) {
        self.network = Some(network);
    }

    pub fn in_links(&self) -> &[LinkId] {
        &self.in_links
    }

    pub fn out_links(&self) -> &[LinkId] {
        &self.out_links
    }

    pub(crate) fn push_in_link(&mut self, link: LinkId) {
        self.in_links.push(link);
    }

    pub(crate) fn push_out_link(&mut self, link: LinkId) {
        self.out_links.push(link);
    }

    pub fn level_index(&self, level: &str) -> Result<usize, BayesError> {
        self.levels
            .iter()
            .position(|l| l == level)
            .ok_or_else(|| BayesError::InvalidLevel {
                node: self.name.clone(),
                level: level.to_string(),
            })
    }

    pub fn evidence(&self) -> Option<&str> {
        self.evidence.map(|idx| self.levels[idx].as_str())
    }

    pub fn evidence_index(&self) -> Option<usize> {
        self.evidence
    }

    pub fn has_evidence(&self) -> bool {
        self.evidence.is_some()
    }

    /// Fixes the node at `level`, replacing its inference with the matching one-hot vector.
    pub fn set_evidence(&mut self, level: &str) -> Result<(), BayesError> {
        let index = self.level_index(level)?;
        if self.evidence == Some(index) {
            return Ok(());
        }
        tracing::trace!("Evidence {} is set to Node {}", level, self.name);
        self.evidence = Some(index);
        self.inference = Some(
            (0..self.levels.len())
                .map(|i| if i == index { 1.0 } else { 0.0 })
                .collect(),
        );
        Ok(())
    }

    pub fn clear_evidence(&mut self) {
        self.evidence = None;
        self.inference = None;
    }

    pub fn inference(&self) -> Option<&[f64]> {
        self.inference.as_deref()
    }

    pub(crate) fn store_inference(&mut self, values: Vec<f64>) -> Result<(), BayesError> {
        if values.len() != self.levels.len() {
            return Err(BayesError::Engine(format!(
                "belief for node {} has {} entries but the node has {} levels",
                self.name,
                values.len(),
                self.levels.len()
            )));
        }
        self.inference = Some(values);
        Ok(())
    }

    pub fn inference_at(&self, level: &str) -> Result<f64, BayesError> {
        let index = self.level_index(level)?;
        self.inference
            .as_ref()
            .map(|values| values[index])
            .ok_or_else(|| BayesError::NoInference(self.name.clone()))
    }

    /// The current inference, or a uniform belief over the levels when nothing has been
    /// computed or observed yet.
    pub fn belief(&self) -> Vec<f64> {
        match &self.inference {
            Some(values) => values.clone(),
            None => Distribution::uniform(self.levels.len()).values().to_vec(),
        }
    }

    /// Level with the highest inferred belief. Ties go to the earliest level, and an
    /// all-zero vector yields the first level.
    pub fn most_probable_level(&self) -> Result<&str, BayesError> {
        let inference = self
            .inference
            .as_ref()
            .ok_or_else(|| BayesError::NoInference(self.name.clone()))?;
        let mut index_of_max = 0;
        let mut max = 0.0;
        for (i, value) in inference.iter().enumerate() {
            if *value > max {
                max = *value;
                index_of_max = i;
            }
        }
        Ok(&self.levels[index_of_max])
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Node{{name={}, combination={:?}, levels={:?}}}",
            self.name, self.combination, self.levels
        )
    }
}
