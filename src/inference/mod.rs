//! Inference module: orchestrators that push a network into an engine and pull beliefs back.
//!
//! - [`Inferer`]: blocking, writes marginals into the network's nodes
//! - [`AsyncInferer`]: submits most-probable-level queries to a worker pool
//!
//! Both build the engine model once, on first use, and give every call its own pair of
//! scratch names (`<alias>.temp.<n>` and `<alias>.res.<n>`) that are released when the call
//! ends, however it ends. Calls sharing one engine therefore never clobber each other's
//! temporaries.

mod base;
mod blocking;
mod pool;

use crate::{
    error::BayesError,
    network::{NodeId, SharedNetwork},
};

pub use base::{default_libraries, InfererBase, Scratch, DEFAULT_LIBRARIES};
pub use blocking::Inferer;
pub use pool::{AsyncInferer, PendingLevels, PoolBuilder, WorkerPool};

/// Blocking inference over a shared network.
pub trait BayesInferer {
    fn network(&self) -> &SharedNetwork;

    /// Computes marginals for `ids` given the evidence currently set on the network and
    /// stores them as the nodes' inference. Nodes carrying evidence are left as they are.
    fn infer_nodes(&self, ids: &[NodeId]) -> Result<(), BayesError>;

    fn infer_node(&self, name: &str) -> Result<(), BayesError> {
        let id = self.network().read().node_id(name)?;
        self.infer_nodes(&[id])
    }

    fn infer_all_nodes(&self) -> Result<(), BayesError> {
        let ids = self.network().read().node_ids();
        self.infer_nodes(&ids)
    }
}

/// Index picked as "most probable" by [`AsyncInferer`].
///
/// Every element is compared against the first one, never against a running maximum, and
/// the last index that beats the first wins. For `[0.2, 0.5, 0.3]` this yields `2`, not `1`.
/// On binary nodes it agrees with a true argmax except that ties keep index 0.
pub fn baseline_argmax(values: &[f64]) -> Result<usize, BayesError> {
    let (first, rest) = values
        .split_first()
        .ok_or_else(|| BayesError::Engine("cannot pick a level from an empty belief".into()))?;
    let mut index = 0;
    for (i, value) in rest.iter().enumerate() {
        if *first < *value {
            index = i + 1;
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_baseline_argmax_binary() {
        assert_eq!(baseline_argmax(&[0.3577, 0.6423]).unwrap(), 1);
        assert_eq!(baseline_argmax(&[0.6467, 0.3533]).unwrap(), 0);
        assert_eq!(baseline_argmax(&[0.5, 0.5]).unwrap(), 0);
        assert_eq!(baseline_argmax(&[1.0]).unwrap(), 0);
    }

    #[test]
    fn test_baseline_argmax_keeps_last_index_above_first() {
        assert_eq!(baseline_argmax(&[0.2, 0.5, 0.3]).unwrap(), 2);
        assert_eq!(baseline_argmax(&[0.6, 0.1, 0.3]).unwrap(), 0);
    }

    #[test]
    fn test_baseline_argmax_empty() {
        assert!(matches!(baseline_argmax(&[]), Err(BayesError::Engine(_))));
    }
}
