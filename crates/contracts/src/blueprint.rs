//! ConnectorBlueprint - Config Loader 输出
//!
//! 描述完整的连接器配置：全局默认分发参数、各目标 API 的上传方式、限速与上限。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{ApiName, CappedValue, DispatchConfig, DispatchLimits, DispatchSettings};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的连接器配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 所有 API 共享的默认分发参数
    #[serde(default)]
    pub defaults: DispatchSettings,

    /// 目标 API 列表
    pub apis: Vec<ApiConfig>,
}

/// 单个目标 API 的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API 代码 (e.g., "AC")
    pub name: ApiName,

    /// 上传器类型
    pub uploader: UploaderKind,

    /// 数据默认经由对象存储 (GCS) 传入
    #[serde(default, alias = "defaultOnGcs")]
    pub default_on_gcs: bool,

    /// 分发参数覆盖
    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// 目标 API 的硬性上限
    #[serde(default)]
    pub limits: DispatchLimits,

    /// 上传器特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// 上传器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploaderKind {
    /// 日志输出，始终成功
    Log,
    /// 追加写入本地文件
    File,
    /// HTTP JSON 上传
    Http,
}

impl UploaderKind {
    /// 配置中使用的名称
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::File => "file",
            Self::Http => "http",
        }
    }
}

/// 数据传输位置提示，由外层路由使用，分发核心不解释
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportHint {
    /// 数据随消息内联传入
    Inline,
    /// 数据存放在对象存储中
    ObjectStorage,
}

/// 解析后的分发配置及被截断的字段
#[derive(Debug, Clone)]
pub struct ResolvedDispatch {
    pub config: DispatchConfig,
    pub capped: Vec<CappedValue>,
}

impl ApiConfig {
    /// 传输位置提示
    pub fn transport(&self) -> TransportHint {
        if self.default_on_gcs {
            TransportHint::ObjectStorage
        } else {
            TransportHint::Inline
        }
    }

    /// 按 内置默认值 -> 全局默认 -> API 覆盖 的顺序解析，再按上限截断
    pub fn resolve_dispatch(&self, defaults: &DispatchSettings) -> ResolvedDispatch {
        let mut config = defaults
            .merged_with(&self.dispatch)
            .resolve(&DispatchConfig::default());
        let capped = self.limits.apply(&mut config);
        ResolvedDispatch { config, capped }
    }
}

impl ConnectorBlueprint {
    /// 按名称查找 API
    pub fn api(&self, name: &str) -> Option<&ApiConfig> {
        self.apis.iter().find(|api| api.name == name)
    }

    /// 解析指定 API 的分发配置
    pub fn dispatch_config_for(&self, api: &ApiConfig) -> ResolvedDispatch {
        api.resolve_dispatch(&self.defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[defaults]
qps = 2.0
maxRetries = 1

[[apis]]
name = "AC"
uploader = "http"
defaultOnGcs = true
[apis.dispatch]
recordsPerRequest = 500
qps = 20.0
[apis.limits]
qps = 10.0
[apis.params]
url = "http://localhost:8080/upload"

[[apis]]
name = "LOG"
uploader = "log"
"#;

    fn sample() -> ConnectorBlueprint {
        toml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let bp = sample();
        assert_eq!(bp.version, ConfigVersion::V1);
        assert_eq!(bp.apis.len(), 2);
        let ac = bp.api("AC").unwrap();
        assert_eq!(ac.uploader, UploaderKind::Http);
        assert_eq!(ac.transport(), TransportHint::ObjectStorage);
        assert_eq!(ac.params.get("url").map(String::as_str), Some("http://localhost:8080/upload"));
        assert!(bp.api("missing").is_none());
    }

    #[test]
    fn test_resolve_with_cap() {
        let bp = sample();
        let resolved = bp.dispatch_config_for(bp.api("AC").unwrap());
        assert_eq!(resolved.config.records_per_request, 500);
        assert_eq!(resolved.config.qps, 10.0);
        assert_eq!(resolved.config.max_retries, 1);
        assert_eq!(resolved.capped.len(), 1);
        assert_eq!(resolved.capped[0].requested, 20.0);
    }

    #[test]
    fn test_resolve_defaults_only() {
        let bp = sample();
        let api = bp.api("LOG").unwrap();
        let resolved = bp.dispatch_config_for(api);
        assert_eq!(resolved.config.qps, 2.0);
        assert_eq!(
            resolved.config.records_per_request,
            crate::DEFAULT_RECORDS_PER_REQUEST
        );
        assert!(resolved.capped.is_empty());
        assert_eq!(api.transport(), TransportHint::Inline);
    }
}
