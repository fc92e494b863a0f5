//! Engine configuration.
//!
//! Loaded from a TOML file, adjusted at runtime through `setoption`, and
//! turned into a [`SearchConfig`] whenever the searcher is rebuilt.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::eval::{EvalParams, MaterialScale, MAX_GRANULARITY};
use crate::search::{FallbackPolicy, SearchConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Search depth in plies.
    pub depth: u32,
    /// Ply at which subtrees go to remote workers.
    pub distribution_ply: u32,
    /// Worker addresses; empty means search locally only.
    pub workers: Vec<String>,
    pub granularity: i32,
    pub material: MaterialScale,
    /// Requests per worker before selection spills over to busier ones.
    pub worker_concurrency: usize,
    pub rpc_timeout_ms: u64,
    pub fallback: FallbackPolicy,
    /// Search thread pool size; 0 shares rayon's global pool.
    pub threads: usize,
    pub node: NodeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            depth: 6,
            distribution_ply: 2,
            workers: Vec::new(),
            granularity: 100,
            material: MaterialScale::OneToThree,
            worker_concurrency: 4,
            rpc_timeout_ms: 30_000,
            fallback: FallbackPolicy::Local,
            threads: 0,
            node: NodeConfig::default(),
        }
    }
}

/// Settings used by `kingrow-node`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    /// How long a coordinator lets a task stay assigned.
    pub lease_ms: u64,
    pub sweep_interval_ms: u64,
    /// Deepest subtree a worker or pull worker accepts.
    pub max_depth: u32,
    pub poll_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            lease_ms: 10_000,
            sweep_interval_ms: 1_000,
            max_depth: 12,
            poll_interval_ms: 50,
        }
    }
}

impl NodeConfig {
    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.depth == 0 {
            return Err(EngineError::Config("depth must be at least 1".into()));
        }
        if !(1..=MAX_GRANULARITY).contains(&self.granularity) {
            return Err(EngineError::Config(format!(
                "granularity must be between 1 and {MAX_GRANULARITY}"
            )));
        }
        if self.worker_concurrency == 0 {
            return Err(EngineError::Config("worker_concurrency must be at least 1".into()));
        }
        if self.rpc_timeout_ms == 0 {
            return Err(EngineError::Config("rpc_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            depth: self.depth,
            distribution_ply: self.distribution_ply,
            eval: self.eval_params(),
            fallback: self.fallback,
            threads: self.threads,
        }
    }

    /// Search settings for a `kingrow-node` process. Nodes always search on
    /// a dedicated pool, sized to the machine when `threads` is 0.
    pub fn node_search_config(&self) -> SearchConfig {
        let threads = match self.threads {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        };
        SearchConfig {
            threads,
            ..self.search_config()
        }
    }

    pub fn eval_params(&self) -> EvalParams {
        EvalParams {
            granularity: self.granularity,
            material: self.material,
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Applies a driver option. Names are matched case-insensitively; a
    /// rejected value leaves the configuration unchanged.
    pub fn set_option(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        let value = value.unwrap_or("").trim();
        let mut next = self.clone();
        match name.to_ascii_lowercase().as_str() {
            "depth" => next.depth = parse(name, value)?,
            "distributionply" | "distribution_ply" => next.distribution_ply = parse(name, value)?,
            "workers" => {
                next.workers = value
                    .split([',', ' '])
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "granularity" => next.granularity = parse(name, value)?,
            "material" => {
                next.material = match value {
                    "1:3" | "one_to_three" => MaterialScale::OneToThree,
                    "2:5" | "two_to_five" => MaterialScale::TwoToFive,
                    _ => return Err(EngineError::Config(format!("unknown material scale '{value}'"))),
                }
            }
            "workerconcurrency" | "worker_concurrency" => next.worker_concurrency = parse(name, value)?,
            "rpctimeout" | "rpc_timeout_ms" => next.rpc_timeout_ms = parse(name, value)?,
            "fallback" => {
                next.fallback = match value {
                    "local" => FallbackPolicy::Local,
                    "fail" => FallbackPolicy::Fail,
                    _ => return Err(EngineError::Config(format!("unknown fallback policy '{value}'"))),
                }
            }
            "threads" => next.threads = parse(name, value)?,
            _ => return Err(EngineError::Config(format!("unknown option '{name}'"))),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| EngineError::Config(format!("invalid value '{value}' for {name}")))
}
