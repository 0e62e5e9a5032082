//! Operational configuration, read from the environment. Unlike the
//! compile-time sizing constants in `constants`, these are the knobs an
//! operator flips per-run (which pool strategy, what memory ceiling).

use crate::error::ConfigError;

/// Which `Pool` strategy to instantiate. `binned` is accepted as an alias
/// for `split`, naming the strategy after its three size-classed free-lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Dummy,
    Simple,
    Split,
}

impl PoolKind {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw {
            "dummy" => Ok(PoolKind::Dummy),
            "simple" => Ok(PoolKind::Simple),
            "split" | "binned" => Ok(PoolKind::Split),
            other => Err(ConfigError::UnsupportedPool(other.to_string())),
        }
    }
}

pub struct Config {
    pub pool_kind: PoolKind,
    /// Whether `POOL_KIND` was set explicitly rather than defaulted,
    /// gating the process-exit summary line (spec.md §6).
    pub pool_kind_explicit: bool,
    pub usage_limit: Option<usize>,
    pub trace: bool,
}

const ENV_MEM_LIMIT: &str = "POOL_MEM_LIMIT";
const ENV_POOL_KIND: &str = "POOL_KIND";
const ENV_TRACE: &str = "POOL_TRACE";

impl Config {
    /// Reads `POOL_MEM_LIMIT` (bytes, unset = unbounded), `POOL_KIND`
    /// (`dummy` | `simple` | `split`/`binned`, default `split`), and
    /// `POOL_TRACE` (`1`/`true`/`yes`, case-insensitive, enables the exit
    /// summary; anything else, including unset, leaves it off).
    pub fn from_env() -> Result<Self, ConfigError> {
        let (pool_kind, pool_kind_explicit) = match std::env::var(ENV_POOL_KIND) {
            Ok(raw) => (PoolKind::parse(&raw)?, true),
            Err(_) => (PoolKind::Split, false),
        };

        let usage_limit = match std::env::var(ENV_MEM_LIMIT) {
            Ok(raw) => {
                let bytes: usize = raw
                    .parse()
                    .map_err(|_| ConfigError::InvalidLimit(raw.clone()))?;
                if bytes == 0 {
                    return Err(ConfigError::InvalidLimit(raw));
                }
                Some(bytes)
            }
            Err(_) => None,
        };

        let trace = std::env::var(ENV_TRACE)
            .is_ok_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));

        Ok(Config {
            pool_kind,
            pool_kind_explicit,
            usage_limit,
            trace,
        })
    }
}
