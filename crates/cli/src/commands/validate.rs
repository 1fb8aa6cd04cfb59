//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ConnectorBlueprint, UploaderKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    api_count: usize,
    apis: Vec<String>,
    object_storage_apis: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    api_count: blueprint.apis.len(),
                    apis: blueprint.apis.iter().map(|a| a.name.to_string()).collect(),
                    object_storage_apis: blueprint
                        .apis
                        .iter()
                        .filter(|a| a.default_on_gcs)
                        .count(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &ConnectorBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    for api in &blueprint.apis {
        let resolved = blueprint.dispatch_config_for(api);

        // Values the api's limits will lower at run time
        for cap in &resolved.capped {
            warnings.push(format!(
                "Api '{}': {} {} exceeds limit, capped to {}",
                api.name, cap.field, cap.requested, cap.ceiling
            ));
        }

        if api.uploader == UploaderKind::Http && resolved.config.max_retries == 0 {
            warnings.push(format!(
                "Api '{}': max_retries is 0, transient HTTP failures will not be retried",
                api.name
            ));
        }

        if api.default_on_gcs {
            warnings.push(format!(
                "Api '{}' defaults to object storage input; pass files explicitly with --input",
                api.name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Apis ({}): {}", summary.api_count, summary.apis.join(", "));
            println!("  Object storage apis: {}", summary.object_storage_apis);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
