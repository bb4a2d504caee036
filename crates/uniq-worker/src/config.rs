//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::WorkerError;

/// Hard ceiling on copies requested from one batch call.
pub const MAX_COPIES_PER_CALL: usize = 5;

/// Which video seeds the next round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedPolicy {
    /// Re-encode one fresh copy of the previous round (lineage compounds).
    #[default]
    CarryForward,
    /// Always re-encode the pristine original.
    Original,
}

impl FromStr for SeedPolicy {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "carry_forward" | "carry-forward" => Ok(SeedPolicy::CarryForward),
            "original" => Ok(SeedPolicy::Original),
            other => Err(WorkerError::config_error(format!("unknown seed policy: {}", other))),
        }
    }
}

/// Which file size the recipe bitrate is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitrateBasis {
    /// Size of the video actually being encoded this round.
    #[default]
    Seed,
    /// Size of the original source, fixed for the whole job.
    Original,
}

impl FromStr for BitrateBasis {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seed" => Ok(BitrateBasis::Seed),
            "original" => Ok(BitrateBasis::Original),
            other => Err(WorkerError::config_error(format!("unknown bitrate basis: {}", other))),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory for batch outputs and carried-forward seeds
    pub work_dir: PathBuf,
    /// Copies requested per batch call (clamped to `MAX_COPIES_PER_CALL`)
    pub max_copies_per_call: usize,
    /// Batch attempts per round before falling back
    pub max_batch_retries: u32,
    /// Base delay for backoff between batch attempts
    pub retry_base_delay: Duration,
    /// Maximum delay between batch attempts
    pub retry_max_delay: Duration,
    /// Consecutive rounds with zero uploaded copies before aborting
    pub max_empty_rounds: u32,
    /// Bound on a single encode invocation
    pub encode_timeout: Duration,
    /// Bound on a single capability probe
    pub probe_timeout: Duration,
    pub seed_policy: SeedPolicy,
    pub bitrate_basis: BitrateBasis,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("data"),
            max_copies_per_call: MAX_COPIES_PER_CALL,
            max_batch_retries: 10,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(10),
            max_empty_rounds: 3,
            encode_timeout: Duration::from_secs(600),
            probe_timeout: Duration::from_secs(5),
            seed_policy: SeedPolicy::CarryForward,
            bitrate_basis: BitrateBasis::Seed,
        }
    }
}

/// Parse a numeric variable into its target type; out-of-range values are errors.
fn number<F, T>(lookup: &F, name: &str, default: T) -> Result<T, WorkerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(v) => v.trim().parse().map_err(|_| {
            WorkerError::config_error(format!("{} must be a number in range, got {:?}", name, v))
        }),
        None => Ok(default),
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            work_dir: lookup("UNIQ_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            max_copies_per_call: number(&lookup, "UNIQ_MAX_COPIES_PER_CALL", defaults.max_copies_per_call)?,
            max_batch_retries: number(&lookup, "UNIQ_MAX_BATCH_RETRIES", defaults.max_batch_retries)?,
            retry_base_delay: Duration::from_millis(number(
                &lookup,
                "UNIQ_RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay.as_millis() as u64,
            )?),
            retry_max_delay: Duration::from_millis(number(
                &lookup,
                "UNIQ_RETRY_MAX_DELAY_MS",
                defaults.retry_max_delay.as_millis() as u64,
            )?),
            max_empty_rounds: number(&lookup, "UNIQ_MAX_EMPTY_ROUNDS", defaults.max_empty_rounds)?,
            encode_timeout: Duration::from_secs(number(
                &lookup,
                "UNIQ_ENCODE_TIMEOUT_SECS",
                defaults.encode_timeout.as_secs(),
            )?),
            probe_timeout: Duration::from_secs(number(
                &lookup,
                "UNIQ_PROBE_TIMEOUT_SECS",
                defaults.probe_timeout.as_secs(),
            )?),
            seed_policy: match lookup("UNIQ_SEED_POLICY") {
                Some(v) => v.parse()?,
                None => defaults.seed_policy,
            },
            bitrate_basis: match lookup("UNIQ_BITRATE_BASIS") {
                Some(v) => v.parse()?,
                None => defaults.bitrate_basis,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.max_copies_per_call == 0 || self.max_copies_per_call > MAX_COPIES_PER_CALL {
            return Err(WorkerError::config_error(format!(
                "max_copies_per_call must be in 1..={}, got {}",
                MAX_COPIES_PER_CALL, self.max_copies_per_call
            )));
        }
        if self.max_batch_retries == 0 {
            return Err(WorkerError::config_error("max_batch_retries must be at least 1"));
        }
        if self.encode_timeout.is_zero() || self.probe_timeout.is_zero() {
            return Err(WorkerError::config_error("timeouts must be non-zero"));
        }
        Ok(())
    }
}
