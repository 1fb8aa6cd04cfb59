//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{DispatchConfig, TransportHint};
use dispatcher::{ApiEntry, ApiRegistry};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    apis: Vec<ApiInfo>,
}

#[derive(Debug, Serialize)]
struct ApiInfo {
    name: String,
    uploader: &'static str,
    transport: TransportHint,
    dispatch: DispatchConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    capped: Vec<CappedInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    params: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CappedInfo {
    field: &'static str,
    requested: f64,
    ceiling: f64,
}

impl From<&ApiEntry> for ApiInfo {
    fn from(entry: &ApiEntry) -> Self {
        let mut params: Vec<String> = entry.api().params.keys().cloned().collect();
        params.sort();

        Self {
            name: entry.name().to_string(),
            uploader: entry.api().uploader.as_str(),
            transport: entry.transport(),
            dispatch: entry.config().clone(),
            capped: entry
                .capped()
                .iter()
                .map(|c| CappedInfo {
                    field: c.field,
                    requested: c.requested,
                    ceiling: c.ceiling,
                })
                .collect(),
            params,
        }
    }
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let registry = ApiRegistry::from_blueprint(&blueprint);
    let apis = select_apis(&registry, args.api.as_deref())?;

    let info = ConfigInfo {
        version: format!("{:?}", blueprint.version),
        apis,
    };

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn select_apis(registry: &ApiRegistry, name: Option<&str>) -> Result<Vec<ApiInfo>> {
    match name {
        Some(name) => Ok(vec![ApiInfo::from(registry.resolve(name)?)]),
        None => Ok(registry.entries().into_iter().map(ApiInfo::from).collect()),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Tentacles Configuration                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📍 Version: {}", info.version);
    println!("\n🔌 Apis ({})", info.apis.len());

    for (i, api) in info.apis.iter().enumerate() {
        let is_last = i == info.apis.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child = if is_last { "   " } else { "│  " };
        let d = &api.dispatch;

        println!("   {} {} ({} uploader, {:?} input)", prefix, api.name, api.uploader, api.transport);
        println!(
            "   {}  ├─ records_per_request: {}, max_batch_bytes: {}",
            child,
            d.records_per_request,
            d.max_batch_bytes
                .map_or_else(|| "unbounded".to_string(), |b| b.to_string())
        );
        println!(
            "   {}  ├─ qps: {}, number_of_threads: {}",
            child, d.qps, d.number_of_threads
        );
        println!(
            "   {}  {} max_retries: {}, retry_backoff_ms: {}",
            child,
            if api.capped.is_empty() { "└─" } else { "├─" },
            d.max_retries,
            d.retry_backoff_ms
        );

        for (j, cap) in api.capped.iter().enumerate() {
            let cap_prefix = if j == api.capped.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {}  {} ⚠ {} capped: {} -> {}",
                child, cap_prefix, cap.field, cap.requested, cap.ceiling
            );
        }
    }

    println!();
}
