//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::{ConnectorBlueprint, DispatchSettings};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig, PipelineStats};

/// Failures listed in the text summary before truncating
const MAX_LISTED_FAILURES: usize = 20;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    // Load and parse configuration
    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    apply_overrides(&mut blueprint, args)?;

    info!(
        api = %args.api,
        apis = blueprint.apis.len(),
        inputs = args.input.len(),
        dry_run = args.dry_run,
        "Configuration loaded"
    );

    // Build pipeline configuration
    let pipeline_config = PipelineConfig {
        blueprint,
        api: args.api.clone(),
        inputs: args.input.clone(),
        format: args.format.record_format(),
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
        dry_run: args.dry_run,
    };

    let pipeline = Pipeline::new(pipeline_config);

    // Ctrl+C stops admission; batches already admitted finish and are reported
    let cancel = pipeline.cancellation_token();
    let shutdown = tokio::spawn(async move {
        setup_shutdown_signal().await;
        warn!("Received shutdown signal, no new batches will be admitted");
        cancel.cancel();
    });

    info!("Starting pipeline...");
    let result = pipeline.run().await;
    shutdown.abort();

    let stats = result.context("Pipeline execution failed")?;

    info!(
        records = stats.total_records(),
        failed = stats.total_failed(),
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Pipeline completed"
    );

    if args.json {
        let json = serde_json::to_string_pretty(&stats).context("Failed to serialize run result")?;
        println!("{}", json);
    } else {
        stats.print_summary();
        print_failures(&stats);
    }

    if stats.is_success() {
        Ok(())
    } else {
        Err(CliError::records_failed(stats.total_failed(), stats.total_records()).into())
    }
}

/// Write CLI dispatch overrides into the selected api's settings
fn apply_overrides(blueprint: &mut ConnectorBlueprint, args: &RunArgs) -> Result<()> {
    let overrides = DispatchSettings {
        qps: args.qps,
        number_of_threads: args.threads,
        records_per_request: args.records_per_request,
        ..Default::default()
    };
    if overrides == DispatchSettings::default() {
        return Ok(());
    }

    let api = blueprint
        .apis
        .iter_mut()
        .find(|api| api.name == args.api.as_str())
        .ok_or_else(|| dispatcher::DispatcherError::UnsupportedApi {
            name: args.api.clone(),
        })?;

    info!(api = %api.name, ?overrides, "Overriding dispatch settings from CLI");
    api.dispatch = api.dispatch.merged_with(&overrides);

    // Overrides go through the same checks as the file
    config_loader::validate(blueprint).context("Invalid dispatch override")?;
    Ok(())
}

fn print_failures(stats: &PipelineStats) {
    let total = stats.total_failed();
    if total == 0 {
        return;
    }

    println!("✗ {} records failed", total);
    for (path, failure) in stats.failures().take(MAX_LISTED_FAILURES) {
        println!(
            "  - {}#{} [{}] {}",
            path.display(),
            failure.record_index,
            failure.error_kind,
            failure.message.as_deref().unwrap_or("")
        );
    }
    if total > MAX_LISTED_FAILURES {
        println!("  ... and {} more", total - MAX_LISTED_FAILURES);
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use config_loader::{ConfigFormat, ConfigLoader};

    fn blueprint() -> ConnectorBlueprint {
        ConfigLoader::load_from_str(
            r#"
[defaults]
qps = 5.0

[[apis]]
name = "LOG"
uploader = "log"
[apis.dispatch]
records_per_request = 10
"#,
            ConfigFormat::Toml,
        )
        .unwrap()
    }

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["tentacles", "run", "--api", "LOG", "--input", "a.txt"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_overrides_applied_to_selected_api() {
        let mut blueprint = blueprint();
        apply_overrides(&mut blueprint, &run_args(&["--qps", "2", "--threads", "4"])).unwrap();

        let config = blueprint.dispatch_config_for(&blueprint.apis[0]).config;
        assert_eq!(config.qps, 2.0);
        assert_eq!(config.number_of_threads, 4);
        assert_eq!(config.records_per_request, 10);
    }

    #[test]
    fn test_no_overrides_leaves_config() {
        let mut blueprint = blueprint();
        let before = blueprint.apis[0].dispatch.clone();
        apply_overrides(&mut blueprint, &run_args(&[])).unwrap();
        assert_eq!(blueprint.apis[0].dispatch, before);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let mut blueprint = blueprint();
        let err = apply_overrides(&mut blueprint, &run_args(&["--threads", "0"])).unwrap_err();
        assert!(format!("{err:#}").contains("number_of_threads"), "{err:#}");
    }
}
