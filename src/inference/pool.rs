use parking_lot::Mutex;
use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::{
    runtime::{Builder, Handle, Runtime},
    task::JoinHandle,
};

use super::{baseline_argmax, InfererBase, Scratch};
use crate::{
    alias::{AbsorbEvidence, NetworkAdapter, QueryJoint, QueryMarginal},
    engine::InferenceEngine,
    error::BayesError,
    network::SharedNetwork,
};

pub const DEFAULT_THREAD_NAME: &str = "bayesnet-infer";

/// Settings for the runtime an [`AsyncInferer`] builds for itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolBuilder {
    pub worker_threads: Option<usize>,
    pub thread_name: String,
}

impl Default for PoolBuilder {
    fn default() -> Self {
        PoolBuilder {
            worker_threads: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl PoolBuilder {
    pub fn build(&self) -> Result<Runtime, BayesError> {
        let mut builder = Builder::new_multi_thread();
        builder.thread_name(self.thread_name.clone()).enable_time();
        if let Some(threads) = self.worker_threads {
            builder.worker_threads(threads.max(1));
        }
        Ok(builder.build()?)
    }
}

enum PoolState {
    Owned {
        builder: PoolBuilder,
        runtime: Option<Runtime>,
    },
    Shared(Handle),
}

/// Where inference work runs: a runtime owned by the pool, built on first use, or a
/// caller's runtime reached through its handle.
///
/// Closing an owned pool shuts its runtime down without waiting for queued work; the next
/// submission builds a fresh one. A shared runtime is never shut down by the pool.
pub struct WorkerPool {
    state: Mutex<PoolState>,
}

impl WorkerPool {
    pub fn owned(builder: PoolBuilder) -> Self {
        WorkerPool {
            state: Mutex::new(PoolState::Owned {
                builder,
                runtime: None,
            }),
        }
    }

    pub fn shared(handle: Handle) -> Self {
        WorkerPool {
            state: Mutex::new(PoolState::Shared(handle)),
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(*self.state.lock(), PoolState::Owned { .. })
    }

    /// True when submissions would run without building a runtime first.
    pub fn is_running(&self) -> bool {
        match &*self.state.lock() {
            PoolState::Owned { runtime, .. } => runtime.is_some(),
            PoolState::Shared(_) => true,
        }
    }

    pub fn handle(&self) -> Result<Handle, BayesError> {
        let mut state = self.state.lock();
        match &mut *state {
            PoolState::Owned { builder, runtime } => {
                if let Some(rt) = runtime {
                    return Ok(rt.handle().clone());
                }
                tracing::debug!("starting inference pool '{}'", builder.thread_name);
                let rt = builder.build()?;
                let handle = rt.handle().clone();
                *runtime = Some(rt);
                Ok(handle)
            }
            PoolState::Shared(handle) => Ok(handle.clone()),
        }
    }

    pub fn close(&self) {
        if let PoolState::Owned { builder, runtime } = &mut *self.state.lock() {
            if let Some(rt) = runtime.take() {
                tracing::debug!("shutting down inference pool '{}'", builder.thread_name);
                rt.shutdown_background();
            }
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        WorkerPool::owned(PoolBuilder::default())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("owned", &self.is_owned())
            .field("running", &self.is_running())
            .finish()
    }
}

/// The most probable level index of each requested node, in request order.
///
/// Await it, poll [`is_finished`](Self::is_finished), or block with [`wait`](Self::wait).
/// Dropping it does not stop the work already submitted.
#[derive(Debug)]
pub struct PendingLevels {
    task: JoinHandle<Result<Vec<usize>, BayesError>>,
}

impl PendingLevels {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Blocks the current thread until the levels are available. Do not call this from
    /// inside an async task; `.await` instead.
    pub fn wait(self) -> Result<Vec<usize>, BayesError> {
        futures::executor::block_on(self)
    }
}

impl Future for PendingLevels {
    type Output = Result<Vec<usize>, BayesError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task)
            .poll(cx)
            .map(|joined| joined.map_err(BayesError::from).and_then(|levels| levels))
    }
}

/// Submits most-probable-level queries to a worker pool.
pub struct AsyncInferer {
    base: InfererBase,
    pool: WorkerPool,
}

impl AsyncInferer {
    pub fn new(engine: Arc<dyn InferenceEngine>, network: SharedNetwork) -> Self {
        AsyncInferer::with_adapter(engine, NetworkAdapter::new(network))
    }

    pub fn with_adapter(engine: Arc<dyn InferenceEngine>, adapter: NetworkAdapter) -> Self {
        AsyncInferer::from_base(InfererBase::new(engine, adapter), WorkerPool::default())
    }

    /// Runs the work on the caller's runtime instead of an owned one.
    pub fn with_handle(
        engine: Arc<dyn InferenceEngine>,
        adapter: NetworkAdapter,
        handle: Handle,
    ) -> Self {
        AsyncInferer::from_base(InfererBase::new(engine, adapter), WorkerPool::shared(handle))
    }

    pub fn from_base(base: InfererBase, pool: WorkerPool) -> Self {
        AsyncInferer { base, pool }
    }

    pub fn base(&self) -> &InfererBase {
        &self.base
    }

    pub fn network(&self) -> &SharedNetwork {
        self.base.network()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Shuts an owned pool down. Work still queued resolves to
    /// [`BayesError::OperationCancelled`].
    pub fn close(&self) {
        self.pool.close();
    }

    /// Queries the most probable level of each named node given the network's current
    /// evidence.
    ///
    /// The evidence is captured before this returns; later changes to the network do not
    /// affect the submitted work. Unknown names and initialization failures are reported
    /// here, engine failures through the returned [`PendingLevels`].
    pub fn infer_most_probable_levels<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<PendingLevels, BayesError> {
        self.base.initialize_if_necessary()?;
        let nodes: Vec<String> = {
            let network = self.network().read();
            names
                .iter()
                .map(|name| {
                    network
                        .node_id(name.as_ref())
                        .map(|_| name.as_ref().to_string())
                })
                .collect::<Result<Vec<String>, BayesError>>()?
        };

        let scratch = self.base.scratch();
        let absorb = self.base.adapter().absorb_command(scratch.temp());
        let engine = self.base.engine().clone();
        let handle = self.pool.handle()?;
        let task = handle.spawn_blocking(move || {
            let levels = most_probable_levels(engine.as_ref(), &scratch, &absorb, &nodes);
            if let Err(e) = &levels {
                tracing::error!("most probable levels on {} failed: {}", absorb.base, e);
            }
            levels
        });
        Ok(PendingLevels { task })
    }
}

impl Drop for AsyncInferer {
    fn drop(&mut self) {
        self.close();
    }
}

/// A node that carries evidence has no entry among the marginals; its level comes from
/// the joint distribution of that node alone.
fn most_probable_levels(
    engine: &dyn InferenceEngine,
    scratch: &Scratch,
    absorb: &AbsorbEvidence,
    nodes: &[String],
) -> Result<Vec<usize>, BayesError> {
    engine.absorb_evidence(absorb)?;
    let marginals = engine.query_marginal(&QueryMarginal {
        model: scratch.temp().to_string(),
        result: scratch.result().to_string(),
        nodes: nodes.to_vec(),
    })?;
    nodes
        .iter()
        .map(|node| match marginals.get(node) {
            Some(values) => baseline_argmax(values),
            None => {
                let joint = engine.query_joint(&QueryJoint {
                    model: scratch.temp().to_string(),
                    nodes: vec![node.clone()],
                })?;
                baseline_argmax(&joint)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{create_weather_network, RecordingEngine};
    use test_log::test;

    fn weather_with_wet_grass() -> SharedNetwork {
        let network = create_weather_network().into_shared();
        network.write().set_evidence("grasswet", "T").unwrap();
        network
    }

    #[tokio::test]
    async fn test_levels_on_caller_runtime() {
        let engine = Arc::new(RecordingEngine::local());
        let inferer = AsyncInferer::with_handle(
            engine.clone(),
            NetworkAdapter::new(weather_with_wet_grass()),
            Handle::current(),
        );
        let levels = inferer
            .infer_most_probable_levels(&["rain", "sprinkler"])
            .unwrap()
            .await
            .unwrap();
        assert_eq!(levels, vec![1, 0]);
        assert!(!inferer.pool().is_owned());
    }

    #[tokio::test]
    async fn test_evidence_node_falls_back_to_joint() {
        let engine = Arc::new(RecordingEngine::local());
        let inferer = AsyncInferer::with_handle(
            engine.clone(),
            NetworkAdapter::new(weather_with_wet_grass()),
            Handle::current(),
        );
        let levels = inferer
            .infer_most_probable_levels(&["grasswet", "rain"])
            .unwrap()
            .await
            .unwrap();
        assert_eq!(levels, vec![0, 1]);
        assert_eq!(engine.count("query_joint"), 1);
    }

    #[tokio::test]
    async fn test_failure_resolves_to_error_and_releases() {
        let engine = Arc::new(RecordingEngine::local());
        let inferer = AsyncInferer::with_handle(
            engine.clone(),
            NetworkAdapter::new(weather_with_wet_grass()),
            Handle::current(),
        );
        engine.fail_on("query_marginal");
        let result = inferer
            .infer_most_probable_levels(&["rain"])
            .unwrap()
            .await;
        assert!(matches!(result, Err(BayesError::Engine(_))));
        assert_eq!(engine.released().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_name_fails_before_submission() {
        let engine = Arc::new(RecordingEngine::local());
        let inferer = AsyncInferer::with_handle(
            engine.clone(),
            NetworkAdapter::new(weather_with_wet_grass()),
            Handle::current(),
        );
        assert!(matches!(
            inferer.infer_most_probable_levels(&["snow"]),
            Err(BayesError::NotFound(_))
        ));
        assert_eq!(engine.count("absorb_evidence"), 0);
        assert!(engine.released().is_empty());
    }

    #[test]
    fn test_owned_pool_is_lazy_and_restartable() {
        let engine = Arc::new(RecordingEngine::local());
        let inferer = AsyncInferer::new(engine.clone(), weather_with_wet_grass());
        assert!(inferer.pool().is_owned());
        assert!(!inferer.pool().is_running());

        let levels = inferer
            .infer_most_probable_levels(&["rain", "sprinkler"])
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(levels, vec![1, 0]);
        assert!(inferer.pool().is_running());

        inferer.close();
        assert!(!inferer.pool().is_running());

        let levels = inferer
            .infer_most_probable_levels(&["sprinkler"])
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(levels, vec![0]);
    }

    #[test]
    fn test_concurrent_requests_agree_and_release_their_own_names() {
        let engine = Arc::new(RecordingEngine::local());
        let inferer = AsyncInferer::new(engine.clone(), weather_with_wet_grass());
        let pending: Vec<PendingLevels> = (0..100)
            .map(|_| {
                inferer
                    .infer_most_probable_levels(&["rain", "sprinkler"])
                    .unwrap()
            })
            .collect();
        for levels in pending {
            assert_eq!(levels.wait().unwrap(), vec![1, 0]);
        }

        let mut created = engine.created();
        let mut released = engine.released();
        assert_eq!(created.len(), 200);
        created.sort();
        released.sort();
        assert_eq!(created, released);
        created.dedup();
        assert_eq!(created.len(), 200);
        assert_eq!(engine.bindings(), vec!["bn.weather", "g.sr", "r", "s.r"]);
    }
}
