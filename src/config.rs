use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::PathBuf,
    sync::Arc,
};

use crate::{
    alias::{Alias, ImportLibrary, NetworkAdapter},
    engine::{GrainEngine, InferenceEngine},
    error::BayesError,
    inference::{
        default_libraries, AsyncInferer, Inferer, InfererBase, PoolBuilder, WorkerPool,
        DEFAULT_LIBRARIES,
    },
    network::SharedNetwork,
};

/// Environment variable consulted when `engine.lib_loc` is not configured.
pub const LIB_LOC_ENV: &str = "R_LIB_HOME";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The in-process interpreter.
    #[default]
    Local,
    /// A child `R` process running gRain. Needs the `r` feature.
    R,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: Backend,
    pub r_binary: String,
    pub lib_loc: Option<String>,
    pub libraries: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            backend: Backend::Local,
            r_binary: "R".to_string(),
            lib_loc: None,
            libraries: DEFAULT_LIBRARIES.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl EngineConfig {
    /// `lib_loc`, falling back to `R_LIB_HOME`.
    pub fn resolved_lib_loc(&self) -> Option<String> {
        self.lib_loc
            .clone()
            .filter(|loc| !loc.is_empty())
            .or_else(|| std::env::var(LIB_LOC_ENV).ok().filter(|loc| !loc.is_empty()))
    }

    pub fn import_libraries(&self) -> Vec<ImportLibrary> {
        let lib_loc = self.resolved_lib_loc();
        if self.libraries.is_empty() {
            return default_libraries(lib_loc.as_deref());
        }
        self.libraries
            .iter()
            .map(|name| ImportLibrary {
                name: name.clone(),
                lib_loc: lib_loc.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfererConfig {
    pub network_alias: Option<String>,
    pub worker_threads: Option<usize>,
    pub thread_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub inferer: InfererConfig,
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, BayesError> {
        Ok(toml::from_str(content)?)
    }

    /// Starts the configured engine.
    pub fn connect(&self) -> Result<Arc<dyn InferenceEngine>, BayesError> {
        match self.engine.backend {
            Backend::Local => Ok(Arc::new(GrainEngine::local())),
            #[cfg(feature = "r")]
            Backend::R => Ok(Arc::new(GrainEngine::new(crate::engine::RProcess::spawn(
                &self.engine.r_binary,
            )?))),
            #[cfg(not(feature = "r"))]
            Backend::R => Err(BayesError::Config(
                "the R backend needs the `r` feature".to_string(),
            )),
        }
    }

    pub fn adapter(&self, network: SharedNetwork) -> NetworkAdapter {
        NetworkAdapter::with_alias(network, Alias::from(self.inferer.network_alias.clone()))
    }

    pub fn pool_builder(&self) -> PoolBuilder {
        let mut builder = PoolBuilder::default();
        builder.worker_threads = self.inferer.worker_threads;
        if let Some(name) = self.inferer.thread_name.as_ref().filter(|n| !n.is_empty()) {
            builder.thread_name = name.clone();
        }
        builder
    }

    fn base(&self, engine: Arc<dyn InferenceEngine>, network: SharedNetwork) -> InfererBase {
        InfererBase::new(engine, self.adapter(network))
            .with_libraries(self.engine.import_libraries())
    }

    pub fn inferer(&self, engine: Arc<dyn InferenceEngine>, network: SharedNetwork) -> Inferer {
        Inferer::from_base(self.base(engine, network))
    }

    pub fn async_inferer(
        &self,
        engine: Arc<dyn InferenceEngine>,
        network: SharedNetwork,
    ) -> AsyncInferer {
        AsyncInferer::from_base(
            self.base(engine, network),
            WorkerPool::owned(self.pool_builder()),
        )
    }
}

pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<Config, BayesError>;
    fn set_config(&self, config: &Config) -> Result<(), BayesError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<Config, BayesError> {
        tracing::debug!("Attempting to read config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(Config::default());
        }
        let content = read_to_string(&self.path)?;
        Config::from_toml_str(&content)
    }

    fn set_config(&self, config: &Config) -> Result<(), BayesError> {
        tracing::debug!("Attempting to write config to: {:?}", &self.path);
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}
