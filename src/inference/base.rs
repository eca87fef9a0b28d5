use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::{
    alias::{ImportLibrary, NetworkAdapter},
    engine::InferenceEngine,
    error::BayesError,
    network::SharedNetwork,
};

/// Libraries imported into the engine before the model is built.
pub const DEFAULT_LIBRARIES: [&str; 2] = ["gRbase", "gRain"];

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn default_libraries(lib_loc: Option<&str>) -> Vec<ImportLibrary> {
    DEFAULT_LIBRARIES
        .iter()
        .map(|name| ImportLibrary {
            name: name.to_string(),
            lib_loc: lib_loc.map(str::to_string),
        })
        .collect()
}

/// State shared by the orchestrators: the engine, the adapter over the network, and whether
/// the engine model has been built yet.
pub struct InfererBase {
    engine: Arc<dyn InferenceEngine>,
    adapter: NetworkAdapter,
    libraries: Vec<ImportLibrary>,
    initialized: Mutex<bool>,
}

impl InfererBase {
    pub fn new(engine: Arc<dyn InferenceEngine>, adapter: NetworkAdapter) -> Self {
        InfererBase {
            engine,
            adapter,
            libraries: default_libraries(None),
            initialized: Mutex::new(false),
        }
    }

    pub fn with_libraries(mut self, libraries: Vec<ImportLibrary>) -> Self {
        self.libraries = libraries;
        self
    }

    pub fn engine(&self) -> &Arc<dyn InferenceEngine> {
        &self.engine
    }

    pub fn adapter(&self) -> &NetworkAdapter {
        &self.adapter
    }

    pub fn network(&self) -> &SharedNetwork {
        self.adapter.network()
    }

    pub fn libraries(&self) -> &[ImportLibrary] {
        &self.libraries
    }

    pub fn is_initialized(&self) -> bool {
        *self.initialized.lock()
    }

    /// Builds the engine model on first use: imports the libraries, creates every node's
    /// table and compiles the model. Concurrent first callers wait for a single build; a
    /// failed build is retried by the next caller.
    pub fn initialize_if_necessary(&self) -> Result<(), BayesError> {
        let mut initialized = self.initialized.lock();
        if *initialized {
            return Ok(());
        }
        self.initialize().inspect_err(|e| {
            tracing::error!(
                "initializing {} in the engine failed: {}",
                self.adapter.alias(),
                e
            )
        })?;
        *initialized = true;
        Ok(())
    }

    fn initialize(&self) -> Result<(), BayesError> {
        self.network().read().validate()?;
        let compile = self.adapter.compile_command()?;
        let tables = self.adapter.table_specs()?;
        tracing::debug!(
            "building model {} from {} tables",
            compile.network_alias,
            tables.len()
        );
        for library in &self.libraries {
            self.engine.import_library(library)?;
        }
        for table in &tables {
            self.engine.create_table(table)?;
        }
        self.engine.compile_model(&compile)
    }

    /// Mints a fresh pair of scratch names under this network's alias.
    pub fn scratch(&self) -> Scratch {
        Scratch::new(self.engine.clone(), self.adapter.alias())
    }
}

/// A pair of engine bindings owned by one call: the model with the call's evidence absorbed
/// and the query result computed from it. Both are released on drop.
pub struct Scratch {
    engine: Arc<dyn InferenceEngine>,
    temp: String,
    result: String,
}

impl Scratch {
    pub fn new(engine: Arc<dyn InferenceEngine>, alias: &str) -> Self {
        let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        Scratch {
            engine,
            temp: format!("{alias}.temp.{n}"),
            result: format!("{alias}.res.{n}"),
        }
    }

    pub fn temp(&self) -> &str {
        &self.temp
    }

    pub fn result(&self) -> &str {
        &self.result
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        for name in [&self.temp, &self.result] {
            match self.engine.release(name) {
                Ok(()) => tracing::debug!("released {}", name),
                Err(e) => tracing::debug!("releasing {} failed: {}", name, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{create_weather_network, RecordingEngine};
    use test_log::test;

    #[test]
    fn test_scratch_names_are_unique_and_released() {
        let engine = Arc::new(RecordingEngine::local());
        let (first, second) = {
            let a = Scratch::new(engine.clone(), "bn.weather");
            let b = Scratch::new(engine.clone(), "bn.weather");
            assert_ne!(a.temp(), b.temp());
            assert!(a.temp().starts_with("bn.weather.temp."));
            assert!(a.result().starts_with("bn.weather.res."));
            (a.temp().to_string(), b.result().to_string())
        };
        let released = engine.released();
        assert_eq!(released.len(), 4);
        assert!(released.contains(&first));
        assert!(released.contains(&second));
    }

    #[test]
    fn test_initialization_runs_once() {
        let engine = Arc::new(RecordingEngine::local());
        let adapter = NetworkAdapter::new(create_weather_network().into_shared());
        let base = InfererBase::new(engine.clone(), adapter);
        assert!(!base.is_initialized());
        base.initialize_if_necessary().unwrap();
        base.initialize_if_necessary().unwrap();
        assert!(base.is_initialized());
        assert_eq!(engine.count("compile_model"), 1);
        assert_eq!(engine.count("create_table"), 3);
        assert_eq!(engine.count("import_library"), 2);
    }

    #[test]
    fn test_failed_initialization_is_retried() {
        let engine = Arc::new(RecordingEngine::local());
        engine.fail_on("compile_model");
        let adapter = NetworkAdapter::new(create_weather_network().into_shared());
        let base = InfererBase::new(engine.clone(), adapter);
        assert!(matches!(
            base.initialize_if_necessary(),
            Err(BayesError::Engine(_))
        ));
        assert!(!base.is_initialized());
        engine.clear_failure();
        base.initialize_if_necessary().unwrap();
        assert!(base.is_initialized());
    }

    #[test]
    fn test_invalid_network_never_reaches_engine() {
        let mut net = create_weather_network();
        net.add_link_between("grasswet", "rain").unwrap();
        let engine = Arc::new(RecordingEngine::local());
        let base = InfererBase::new(engine.clone(), NetworkAdapter::new(net.into_shared()));
        assert!(matches!(
            base.initialize_if_necessary(),
            Err(BayesError::Cycle(_))
        ));
        assert!(engine.calls().is_empty());
    }
}
