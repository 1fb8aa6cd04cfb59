//! ApiRegistry - resolves api names to uploaders and dispatch settings

use std::collections::HashMap;
use std::time::{Duration, Instant};

use contracts::{
    ApiConfig, ApiName, CappedValue, ConnectorBlueprint, DispatchConfig, DispatchReport, Record,
    TransportHint,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::coordinator::DispatchCoordinator;
use crate::error::DispatcherError;
use crate::metrics::MetricsSnapshot;
use crate::uploaders::create_uploader;

/// A registered api with its resolved settings
#[derive(Debug, Clone)]
pub struct ApiEntry {
    api: ApiConfig,
    config: DispatchConfig,
    capped: Vec<CappedValue>,
}

/// Result of one dispatch through the registry
#[derive(Debug, Clone)]
pub struct DispatchRun {
    pub api: ApiName,
    pub report: DispatchReport,
    pub metrics: MetricsSnapshot,
    pub elapsed: Duration,
}

impl ApiEntry {
    /// Api name
    pub fn name(&self) -> &ApiName {
        &self.api.name
    }

    /// Raw api configuration
    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    /// Resolved dispatch configuration
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Values lowered to the api's limits during resolution
    pub fn capped(&self) -> &[CappedValue] {
        &self.capped
    }

    /// Where this api's records normally come from
    pub fn transport(&self) -> TransportHint {
        self.api.transport()
    }

    /// Build the uploader and run one dispatch.
    ///
    /// # Errors
    /// - `UploaderCreation` when the uploader params are unusable
    /// - `Config` when the resolved configuration is invalid
    #[instrument(
        name = "registry_dispatch",
        skip(self, records, cancel),
        fields(api = %self.api.name, uploader = self.api.uploader.as_str())
    )]
    pub async fn dispatch(
        &self,
        records: Vec<Record>,
        cancel: CancellationToken,
    ) -> Result<DispatchRun, DispatcherError> {
        let uploader = create_uploader(&self.api)?;
        let coordinator =
            DispatchCoordinator::new(uploader, self.config.clone()).with_cancellation(cancel);

        let started = Instant::now();
        let report = coordinator.dispatch(records).await?;

        Ok(DispatchRun {
            api: self.api.name.clone(),
            report,
            metrics: coordinator.metrics().snapshot(),
            elapsed: started.elapsed(),
        })
    }
}

/// Static mapping from api name to entry
#[derive(Debug, Clone, Default)]
pub struct ApiRegistry {
    entries: HashMap<ApiName, ApiEntry>,
}

impl ApiRegistry {
    /// Register every api of a validated blueprint
    #[instrument(name = "registry_from_blueprint", skip(blueprint), fields(apis = blueprint.apis.len()))]
    pub fn from_blueprint(blueprint: &ConnectorBlueprint) -> Self {
        let mut registry = Self::default();
        for api in &blueprint.apis {
            let resolved = blueprint.dispatch_config_for(api);
            for cap in &resolved.capped {
                warn!(
                    api = %api.name,
                    field = cap.field,
                    requested = cap.requested,
                    ceiling = cap.ceiling,
                    "value above api limit, capped"
                );
            }
            registry.entries.insert(
                api.name.clone(),
                ApiEntry {
                    api: api.clone(),
                    config: resolved.config,
                    capped: resolved.capped,
                },
            );
        }
        info!(apis = registry.entries.len(), "api registry built");
        registry
    }

    /// Look up an api by name.
    ///
    /// # Errors
    /// `UnsupportedApi` if no api is registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<&ApiEntry, DispatcherError> {
        self.entries
            .get(name)
            .ok_or_else(|| DispatcherError::UnsupportedApi {
                name: name.to_string(),
            })
    }

    /// Registered entries, sorted by name
    pub fn entries(&self) -> Vec<&ApiEntry> {
        let mut entries: Vec<&ApiEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name().as_str().cmp(b.name().as_str()));
        entries
    }

    /// Number of registered apis
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no api is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
