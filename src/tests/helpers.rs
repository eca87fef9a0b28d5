//! Shared test utilities: example networks and an engine wrapper that records its calls.

use parking_lot::Mutex;

use crate::{
    alias::{AbsorbEvidence, CompileModel, ImportLibrary, QueryJoint, QueryMarginal, TableSpec},
    engine::{GrainEngine, InferenceEngine, LocalSession, Marginals},
    error::BayesError,
    network::{Combination, Distribution, Network, Node},
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

fn node(name: &str, levels: [&str; 2], weights: &[f64]) -> Node {
    Node::with_distribution(
        name,
        levels,
        Distribution::from_weights(weights.iter().copied()).unwrap(),
    )
    .unwrap()
}

/// rain -> sprinkler, sprinkler -> grasswet, rain -> grasswet
pub fn create_weather_network() -> Network {
    init_logging();
    let mut net = Network::new("weather");
    let rain = net.add_node(node("rain", ["T", "F"], &[20.0, 80.0])).unwrap();
    let sprinkler = net
        .add_node(node("sprinkler", ["T", "F"], &[1.0, 99.0, 40.0, 60.0]))
        .unwrap();
    let grasswet = net
        .add_node(node(
            "grasswet",
            ["T", "F"],
            &[99.0, 1.0, 80.0, 20.0, 90.0, 10.0, 0.0, 100.0],
        ))
        .unwrap();
    net.add_link_between(rain, sprinkler).unwrap();
    net.add_link_between(sprinkler, grasswet).unwrap();
    net.add_link_between(rain, grasswet).unwrap();
    net
}

/// The "Asia" chest clinic network. `either` is the logical OR of `lung` and `tub`.
pub fn create_asia_network() -> Network {
    init_logging();
    let yn = ["yes", "no"];
    let mut net = Network::new("asia");
    let asia = net.add_node(node("asia", yn, &[1.0, 99.0])).unwrap();
    let tub = net
        .add_node(node("tub", yn, &[5.0, 95.0, 1.0, 99.0]))
        .unwrap();
    let smoke = net.add_node(node("smoke", yn, &[5.0, 5.0])).unwrap();
    let lung = net
        .add_node(node("lung", yn, &[1.0, 9.0, 1.0, 99.0]))
        .unwrap();
    let bronc = net
        .add_node(node("bronc", yn, &[6.0, 4.0, 3.0, 7.0]))
        .unwrap();
    let either = net
        .add_node(Node::with_combination("either", yn, Combination::Or).unwrap())
        .unwrap();
    let xray = net
        .add_node(node("xray", yn, &[98.0, 2.0, 5.0, 95.0]))
        .unwrap();
    let dysp = net
        .add_node(node(
            "dysp",
            yn,
            &[9.0, 1.0, 7.0, 3.0, 8.0, 2.0, 1.0, 9.0],
        ))
        .unwrap();
    net.add_link_between(asia, tub).unwrap();
    net.add_link_between(smoke, lung).unwrap();
    net.add_link_between(smoke, bronc).unwrap();
    net.add_link_between(lung, either).unwrap();
    net.add_link_between(tub, either).unwrap();
    net.add_link_between(either, xray).unwrap();
    net.add_link_between(bronc, dysp).unwrap();
    net.add_link_between(either, dysp).unwrap();
    net
}

/// Forwards to an in-process engine, recording every operation and the scratch names it
/// sees. A single operation can be made to fail on demand.
pub struct RecordingEngine {
    inner: GrainEngine<LocalSession>,
    calls: Mutex<Vec<String>>,
    created: Mutex<Vec<String>>,
    released: Mutex<Vec<String>>,
    failing: Mutex<Option<String>>,
}

impl RecordingEngine {
    pub fn local() -> Self {
        RecordingEngine {
            inner: GrainEngine::local(),
            calls: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            failing: Mutex::new(None),
        }
    }

    pub fn fail_on(&self, operation: &str) {
        *self.failing.lock() = Some(operation.to_string());
    }

    pub fn clear_failure(&self) {
        *self.failing.lock() = None;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == operation).count()
    }

    /// Scratch bindings created through evidence absorption and marginal queries.
    pub fn created(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    pub fn released(&self) -> Vec<String> {
        self.released.lock().clone()
    }

    /// Names still bound in the underlying session.
    pub fn bindings(&self) -> Vec<String> {
        self.inner.with_session(|session| session.bindings())
    }

    fn record(&self, operation: &str) -> Result<(), BayesError> {
        self.calls.lock().push(operation.to_string());
        match self.failing.lock().as_deref() {
            Some(failing) if failing == operation => {
                Err(BayesError::Engine(format!("injected {operation} failure")))
            }
            _ => Ok(()),
        }
    }
}

impl InferenceEngine for RecordingEngine {
    fn import_library(&self, library: &ImportLibrary) -> Result<(), BayesError> {
        self.record("import_library")?;
        self.inner.import_library(library)
    }

    fn create_table(&self, table: &TableSpec) -> Result<(), BayesError> {
        self.record("create_table")?;
        self.inner.create_table(table)
    }

    fn compile_model(&self, model: &CompileModel) -> Result<(), BayesError> {
        self.record("compile_model")?;
        self.inner.compile_model(model)
    }

    fn absorb_evidence(&self, evidence: &AbsorbEvidence) -> Result<(), BayesError> {
        self.record("absorb_evidence")?;
        self.created.lock().push(evidence.temp.clone());
        self.inner.absorb_evidence(evidence)
    }

    fn query_marginal(&self, query: &QueryMarginal) -> Result<Marginals, BayesError> {
        self.record("query_marginal")?;
        self.created.lock().push(query.result.clone());
        self.inner.query_marginal(query)
    }

    fn query_joint(&self, query: &QueryJoint) -> Result<Vec<f64>, BayesError> {
        self.record("query_joint")?;
        self.inner.query_joint(query)
    }

    fn release(&self, name: &str) -> Result<(), BayesError> {
        self.calls.lock().push("release".to_string());
        self.released.lock().push(name.to_string());
        self.inner.release(name)
    }
}
