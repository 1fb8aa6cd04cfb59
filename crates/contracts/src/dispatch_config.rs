//! DispatchConfig - per-run dispatcher settings
//!
//! Resolution order for one api: built-in defaults, then the blueprint
//! `[defaults]` table, then the api's own `dispatch` table. Resolved values
//! above the api's `limits` are capped to the ceiling.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ContractError;

/// Default records per upload request
pub const DEFAULT_RECORDS_PER_REQUEST: usize = 1000;
/// Default requests per second
pub const DEFAULT_QPS: f64 = 1.0;
/// Default concurrent in-flight requests
pub const DEFAULT_NUMBER_OF_THREADS: usize = 10;
/// Default retry ceiling per batch
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default base backoff in milliseconds
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;

/// Immutable configuration for one dispatch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DispatchConfig {
    /// Max records per batch
    #[serde(alias = "recordsPerRequest")]
    #[validate(range(min = 1))]
    pub records_per_request: usize,

    /// Max payload bytes per batch (None = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "maxBatchBytes")]
    #[validate(range(min = 1))]
    pub max_batch_bytes: Option<usize>,

    /// Max requests per second, fractional values allowed
    #[validate(range(exclusive_min = 0.0))]
    pub qps: f64,

    /// Max concurrent in-flight requests
    #[serde(alias = "numberOfThreads")]
    #[validate(range(min = 1))]
    pub number_of_threads: usize,

    /// Retries per batch after the first attempt
    #[serde(alias = "maxRetries")]
    pub max_retries: u32,

    /// Base backoff; attempt `n` waits `retry_backoff_ms * 2^n`
    #[serde(alias = "retryBackoffMs")]
    pub retry_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            records_per_request: DEFAULT_RECORDS_PER_REQUEST,
            max_batch_bytes: None,
            qps: DEFAULT_QPS,
            number_of_threads: DEFAULT_NUMBER_OF_THREADS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl DispatchConfig {
    /// Check the config before any batch is formed.
    ///
    /// # Errors
    /// `ContractError::ConfigValidation` naming the first offending field.
    pub fn ensure_valid(&self) -> Result<(), ContractError> {
        // NaN slips through range checks
        if !self.qps.is_finite() {
            return Err(ContractError::config_validation(
                "qps",
                format!("qps must be a finite number, got {}", self.qps),
            ));
        }

        self.validate().map_err(|errors| {
            let mut fields: Vec<String> = errors
                .field_errors()
                .keys()
                .map(|k| k.to_string())
                .collect();
            fields.sort();
            let field = fields.into_iter().next().unwrap_or_default();
            ContractError::config_validation(field, errors.to_string())
        })
    }

    /// Backoff before retry number `attempt` (0-based)
    pub fn backoff_for(&self, attempt: u32) -> std::time::Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        std::time::Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

/// User supplied dispatch values; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchSettings {
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "recordsPerRequest")]
    pub records_per_request: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "maxBatchBytes")]
    pub max_batch_bytes: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qps: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "numberOfThreads")]
    pub number_of_threads: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "maxRetries")]
    pub max_retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "retryBackoffMs")]
    pub retry_backoff_ms: Option<u64>,
}

impl DispatchSettings {
    /// Layer `over` on top of `self`; values present in `over` win
    pub fn merged_with(&self, over: &DispatchSettings) -> DispatchSettings {
        DispatchSettings {
            records_per_request: over.records_per_request.or(self.records_per_request),
            max_batch_bytes: over.max_batch_bytes.or(self.max_batch_bytes),
            qps: over.qps.or(self.qps),
            number_of_threads: over.number_of_threads.or(self.number_of_threads),
            max_retries: over.max_retries.or(self.max_retries),
            retry_backoff_ms: over.retry_backoff_ms.or(self.retry_backoff_ms),
        }
    }

    /// Fill missing values from `base`.
    ///
    /// Present values are taken as-is, including invalid ones, so that
    /// `ensure_valid` reports them instead of silently using a default.
    pub fn resolve(&self, base: &DispatchConfig) -> DispatchConfig {
        DispatchConfig {
            records_per_request: self.records_per_request.unwrap_or(base.records_per_request),
            max_batch_bytes: self.max_batch_bytes.or(base.max_batch_bytes),
            qps: self.qps.unwrap_or(base.qps),
            number_of_threads: self.number_of_threads.unwrap_or(base.number_of_threads),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            retry_backoff_ms: self.retry_backoff_ms.unwrap_or(base.retry_backoff_ms),
        }
    }
}

/// Per-api ceilings imposed by the target API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchLimits {
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "recordsPerRequest")]
    pub records_per_request: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "maxBatchBytes")]
    pub max_batch_bytes: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qps: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none", alias = "numberOfThreads")]
    pub number_of_threads: Option<usize>,
}

/// A value lowered to its ceiling
#[derive(Debug, Clone, PartialEq)]
pub struct CappedValue {
    pub field: &'static str,
    pub requested: f64,
    pub ceiling: f64,
}

impl DispatchLimits {
    /// Cap `config` to these limits, returning every adjustment made
    pub fn apply(&self, config: &mut DispatchConfig) -> Vec<CappedValue> {
        let mut capped = Vec::new();

        if let Some(max) = self.records_per_request {
            if config.records_per_request > max {
                capped.push(CappedValue {
                    field: "records_per_request",
                    requested: config.records_per_request as f64,
                    ceiling: max as f64,
                });
                config.records_per_request = max;
            }
        }

        if let Some(max) = self.max_batch_bytes {
            match config.max_batch_bytes {
                Some(v) if v <= max => {}
                requested => {
                    capped.push(CappedValue {
                        field: "max_batch_bytes",
                        requested: requested.map_or(f64::INFINITY, |v| v as f64),
                        ceiling: max as f64,
                    });
                    config.max_batch_bytes = Some(max);
                }
            }
        }

        if let Some(max) = self.qps {
            if config.qps > max {
                capped.push(CappedValue {
                    field: "qps",
                    requested: config.qps,
                    ceiling: max,
                });
                config.qps = max;
            }
        }

        if let Some(max) = self.number_of_threads {
            if config.number_of_threads > max {
                capped.push(CappedValue {
                    field: "number_of_threads",
                    requested: config.number_of_threads as f64,
                    ceiling: max as f64,
                });
                config.number_of_threads = max;
            }
        }

        capped
    }
}
