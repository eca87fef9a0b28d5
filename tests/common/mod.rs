//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use bayesnet_core::{codec::NetworkSpec, network::Network};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times, subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[allow(dead_code)]
pub const WEATHER_TOML: &str = r#"
name = "weather"

[[nodes]]
name = "rain"
levels = ["T", "F"]
distribution = [20.0, 80.0]

[[nodes]]
name = "sprinkler"
levels = ["T", "F"]
distribution = [1.0, 99.0, 40.0, 60.0]
parents = ["rain"]

[[nodes]]
name = "grasswet"
levels = ["T", "F"]
distribution = [99.0, 1.0, 80.0, 20.0, 90.0, 10.0, 0.0, 100.0]
parents = ["sprinkler", "rain"]
"#;

#[allow(dead_code)]
pub const ASIA_JSON: &str = r#"{
  "name": "asia",
  "nodes": [
    { "name": "asia",   "levels": ["yes", "no"], "distribution": [1, 99] },
    { "name": "tub",    "levels": ["yes", "no"], "distribution": [5, 95, 1, 99], "parents": ["asia"] },
    { "name": "smoke",  "levels": ["yes", "no"], "distribution": [5, 5] },
    { "name": "lung",   "levels": ["yes", "no"], "distribution": [1, 9, 1, 99], "parents": ["smoke"] },
    { "name": "bronc",  "levels": ["yes", "no"], "distribution": [6, 4, 3, 7], "parents": ["smoke"] },
    { "name": "either", "levels": ["yes", "no"], "combination": "or", "parents": ["lung", "tub"] },
    { "name": "xray",   "levels": ["yes", "no"], "distribution": [98, 2, 5, 95], "parents": ["either"] },
    { "name": "dysp",   "levels": ["yes", "no"], "distribution": [9, 1, 7, 3, 8, 2, 1, 9], "parents": ["bronc", "either"] }
  ]
}"#;

/// rain -> sprinkler -> grasswet, rain -> grasswet
#[allow(dead_code)]
pub fn weather_network() -> Network {
    init_logging();
    NetworkSpec::from_toml_str(WEATHER_TOML)
        .unwrap()
        .into_network()
        .unwrap()
}

/// The "Asia" chest clinic network.
#[allow(dead_code)]
pub fn asia_network() -> Network {
    init_logging();
    NetworkSpec::from_json_str(ASIA_JSON)
        .unwrap()
        .into_network()
        .unwrap()
}

#[allow(dead_code)]
pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() < tolerance,
        "expected {expected}, got {actual}"
    );
}
