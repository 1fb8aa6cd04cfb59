//! 配置校验模块
//!
//! 校验规则：
//! - 至少配置一个 API
//! - API 名称非空且唯一
//! - 解析后的分发参数合法 (qps > 0, numberOfThreads >= 1, recordsPerRequest >= 1)
//! - 上限值为正数
//! - 上传器必填参数齐全 (file: path, http: url)

use std::collections::HashSet;

use contracts::{ApiConfig, ConnectorBlueprint, ContractError, DispatchLimits, UploaderKind};

/// 校验 ConnectorBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &ConnectorBlueprint) -> Result<(), ContractError> {
    validate_api_list(blueprint)?;
    validate_api_names(blueprint)?;
    for api in &blueprint.apis {
        validate_limits(api)?;
        validate_dispatch(blueprint, api)?;
        validate_uploader_params(api)?;
    }
    Ok(())
}

fn validate_api_list(blueprint: &ConnectorBlueprint) -> Result<(), ContractError> {
    if blueprint.apis.is_empty() {
        return Err(ContractError::config_validation(
            "apis",
            "at least one api must be configured",
        ));
    }
    Ok(())
}

/// 校验 API 名称唯一性
fn validate_api_names(blueprint: &ConnectorBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, api) in blueprint.apis.iter().enumerate() {
        if api.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("apis[{idx}].name"),
                "api name cannot be empty",
            ));
        }
        if !seen.insert(api.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("apis[name={}]", api.name),
                "duplicate api name",
            ));
        }
    }
    Ok(())
}

fn validate_limits(api: &ApiConfig) -> Result<(), ContractError> {
    let DispatchLimits {
        records_per_request,
        max_batch_bytes,
        qps,
        number_of_threads,
    } = &api.limits;

    let zero_count = [
        ("records_per_request", *records_per_request),
        ("max_batch_bytes", *max_batch_bytes),
        ("number_of_threads", *number_of_threads),
    ]
    .into_iter()
    .find(|(_, v)| *v == Some(0));

    if let Some((field, _)) = zero_count {
        return Err(ContractError::config_validation(
            format!("apis[{}].limits.{field}", api.name),
            "limit must be > 0",
        ));
    }

    if let Some(qps) = qps {
        if !(qps.is_finite() && *qps > 0.0) {
            return Err(ContractError::config_validation(
                format!("apis[{}].limits.qps", api.name),
                format!("limit must be > 0, got {qps}"),
            ));
        }
    }
    Ok(())
}

/// 校验解析后的分发参数
fn validate_dispatch(blueprint: &ConnectorBlueprint, api: &ApiConfig) -> Result<(), ContractError> {
    let resolved = blueprint.dispatch_config_for(api);
    resolved.config.ensure_valid().map_err(|e| match e {
        ContractError::ConfigValidation { field, message } => ContractError::config_validation(
            format!("apis[{}].dispatch.{field}", api.name),
            message,
        ),
        other => other,
    })
}

/// 校验上传器参数
fn validate_uploader_params(api: &ApiConfig) -> Result<(), ContractError> {
    match api.uploader {
        UploaderKind::Log => Ok(()),
        UploaderKind::File => {
            require_param(api, "path")?;
            Ok(())
        }
        UploaderKind::Http => {
            let url = require_param(api, "url")?;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ContractError::config_validation(
                    format!("apis[{}].params.url", api.name),
                    format!("url must start with http:// or https://, got '{url}'"),
                ));
            }
            if let Some(timeout) = api.params.get("timeout_ms") {
                if timeout.parse::<u64>().map_or(true, |ms| ms == 0) {
                    return Err(ContractError::config_validation(
                        format!("apis[{}].params.timeout_ms", api.name),
                        format!("timeout_ms must be a positive integer, got '{timeout}'"),
                    ));
                }
            }
            Ok(())
        }
    }
}

fn require_param<'a>(api: &'a ApiConfig, key: &str) -> Result<&'a str, ContractError> {
    match api.params.get(key).map(String::as_str) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ContractError::config_validation(
            format!("apis[{}].params.{key}", api.name),
            format!("'{key}' is required for {} uploader", api.uploader.as_str()),
        )),
    }
}
