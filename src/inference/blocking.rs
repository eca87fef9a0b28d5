use std::sync::Arc;

use super::{BayesInferer, InfererBase};
use crate::{
    alias::{AbsorbEvidence, NetworkAdapter, QueryMarginal},
    engine::InferenceEngine,
    error::BayesError,
    network::{NodeId, SharedNetwork},
};

/// Runs inference on the caller's thread and writes the marginals into the network.
pub struct Inferer {
    base: InfererBase,
}

impl Inferer {
    pub fn new(engine: Arc<dyn InferenceEngine>, network: SharedNetwork) -> Self {
        Inferer::with_adapter(engine, NetworkAdapter::new(network))
    }

    pub fn with_adapter(engine: Arc<dyn InferenceEngine>, adapter: NetworkAdapter) -> Self {
        Inferer::from_base(InfererBase::new(engine, adapter))
    }

    pub fn from_base(base: InfererBase) -> Self {
        Inferer { base }
    }

    pub fn base(&self) -> &InfererBase {
        &self.base
    }

    fn run(&self, ids: &[NodeId]) -> Result<(), BayesError> {
        let alias = self.base.adapter().alias().to_string();
        let scratch = self.base.scratch();

        // Evidence and the nodes still worth querying are read under one lock.
        let (absorb, pending) = {
            let network = self.network().read();
            let mut pending: Vec<String> = Vec::with_capacity(ids.len());
            for id in ids {
                let node = network
                    .node(*id)
                    .ok_or_else(|| BayesError::UnknownNode(id.to_string()))?;
                if !node.has_evidence() && !pending.iter().any(|n| n == node.name()) {
                    pending.push(node.name().to_string());
                }
            }
            let snapshot = network.evidence_snapshot();
            (
                AbsorbEvidence::from_snapshot(&alias, scratch.temp(), &snapshot),
                pending,
            )
        };

        self.base.engine().absorb_evidence(&absorb)?;
        if pending.is_empty() {
            return Ok(());
        }

        let marginals = self.base.engine().query_marginal(&QueryMarginal {
            model: scratch.temp().to_string(),
            result: scratch.result().to_string(),
            nodes: pending.clone(),
        })?;

        let mut network = self.network().write();
        let mut updates = Vec::with_capacity(pending.len());
        for name in &pending {
            let values = marginals.get(name).ok_or_else(|| {
                BayesError::Engine(format!("engine returned no marginal for node {name}"))
            })?;
            let node = network.node_by_name(name)?;
            if values.len() != node.levels().len() {
                return Err(BayesError::Engine(format!(
                    "marginal for node {} has {} entries but the node has {} levels",
                    name,
                    values.len(),
                    node.levels().len()
                )));
            }
            updates.push((name, values.clone()));
        }
        for (name, values) in updates {
            network.node_by_name_mut(name)?.store_inference(values)?;
        }
        Ok(())
    }
}

impl BayesInferer for Inferer {
    fn network(&self) -> &SharedNetwork {
        self.base.network()
    }

    fn infer_nodes(&self, ids: &[NodeId]) -> Result<(), BayesError> {
        self.base.initialize_if_necessary()?;
        self.run(ids).inspect_err(|e| {
            tracing::error!(
                "inference on {} failed: {}",
                self.base.adapter().alias(),
                e
            )
        })
    }
}
