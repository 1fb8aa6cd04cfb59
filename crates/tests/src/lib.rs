//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置契约测试
//! - 端到端测试 (配置 -> 读取 -> 分发 -> 上传器)

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_blueprint_survives_serialization() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
[defaults]
qps = 2.5
max_retries = 1

[[apis]]
name = "AC"
uploader = "http"
[apis.limits]
records_per_request = 100
[apis.params]
url = "https://example.com/conversions"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let toml = ConfigLoader::to_toml(&blueprint).unwrap();
        let reloaded = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let from_json = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();

        for other in [&reloaded, &from_json] {
            let api = &other.apis[0];
            assert_eq!(
                other.dispatch_config_for(api).config,
                blueprint.dispatch_config_for(&blueprint.apis[0]).config
            );
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use config_loader::ConfigLoader;
    use contracts::{Batch, BatchResult, DispatchConfig, DispatchReport, ErrorKind, Uploader};
    use dispatcher::{ApiRegistry, CancellationToken, DispatchCoordinator, DispatcherError};
    use ingestion::{IngestionError, RecordFormat};
    use observability::DispatchMetricsAggregator;

    fn write_file(path: &Path, content: &str) {
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn assert_accounting(report: &DispatchReport) {
        assert_eq!(
            report.total_succeeded + report.total_failed,
            report.total_records
        );
        assert_eq!(report.failures.len(), report.total_failed);
        assert!(report
            .failures
            .windows(2)
            .all(|w| w[0].record_index < w[1].record_index));
    }

    /// Fails the first attempt of every batch, then succeeds
    #[derive(Default)]
    struct FlakyOnce {
        seen: std::sync::Mutex<std::collections::HashSet<u64>>,
        calls: AtomicUsize,
    }

    impl Uploader for FlakyOnce {
        fn name(&self) -> &str {
            "flaky_once"
        }

        async fn upload(&self, batch: &Batch) -> BatchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let first = self.seen.lock().unwrap().insert(batch.id.0);
            if first {
                BatchResult::failure(batch, ErrorKind::Transient, "503 from upstream")
            } else {
                BatchResult::success(batch)
            }
        }
    }

    /// Succeeds after a fixed delay
    struct Slow(Duration);

    impl Uploader for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn upload(&self, batch: &Batch) -> BatchResult {
            tokio::time::sleep(self.0).await;
            BatchResult::success(batch)
        }
    }

    /// End-to-end test: config file -> ndjson input -> registry -> file uploader
    ///
    /// 验证完整的数据流：
    /// 1. ConfigLoader 读取配置并解析 api 设置
    /// 2. ingestion 读取 ndjson 输入 (跳过空行)
    /// 3. ApiRegistry 创建上传器并分发
    /// 4. 输出文件包含每条记录
    #[tokio::test]
    async fn test_e2e_file_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("uploads").join("ac.ndjson");
        let config_path = dir.path().join("tentacles.toml");
        let input_path = dir.path().join("conversions.ndjson");

        write_file(
            &config_path,
            &format!(
                r#"
[defaults]
qps = 500.0
number_of_threads = 3

[[apis]]
name = "AC"
uploader = "file"
[apis.dispatch]
records_per_request = 4
[apis.params]
path = "{}"
"#,
                output.display()
            ),
        );

        let mut input = String::new();
        for i in 0..25 {
            input.push_str(&format!("{{\"gclid\":\"g{i}\",\"value\":{i}}}\n"));
            if i % 10 == 0 {
                input.push('\n');
            }
        }
        write_file(&input_path, &input);

        let blueprint = ConfigLoader::load_from_path(&config_path).unwrap();
        let records = ingestion::read_records_from_path(&input_path, RecordFormat::JsonLines)
            .await
            .unwrap();
        assert_eq!(records.len(), 25);

        let registry = ApiRegistry::from_blueprint(&blueprint);
        let run = registry
            .resolve("AC")
            .unwrap()
            .dispatch(records, CancellationToken::new())
            .await
            .unwrap();

        assert!(run.report.is_success());
        assert_eq!(run.report.batches, 7);
        assert_accounting(&run.report);
        assert!(run.metrics.peak_in_flight <= 3);

        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written.lines().count(), 25);
        assert!(written.contains(r#"{"gclid":"g24","value":24}"#));

        let mut aggregator = DispatchMetricsAggregator::new();
        aggregator.update(&run.report, run.elapsed);
        let summary = aggregator.summary();
        assert_eq!(summary.total_succeeded, 25);
        assert_eq!(summary.retries, 0);
    }

    #[tokio::test]
    async fn test_e2e_invalid_json_line_stops_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("broken.jsonl");
        write_file(&input_path, "{\"a\":1}\n\nnot json\n");

        let err = ingestion::read_records_from_path(&input_path, RecordFormat::JsonLines)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::InvalidRecord { line: 3, .. }));
    }

    #[tokio::test]
    async fn test_e2e_unsupported_api() {
        let blueprint = ConfigLoader::load_from_str(
            "[[apis]]\nname = \"LOG\"\nuploader = \"log\"\n",
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        let registry = ApiRegistry::from_blueprint(&blueprint);
        assert!(matches!(
            registry.resolve("GA"),
            Err(DispatcherError::UnsupportedApi { .. })
        ));
    }

    #[tokio::test]
    async fn test_e2e_transient_failures_recovered_by_retry() {
        let config = DispatchConfig {
            records_per_request: 5,
            qps: 1000.0,
            number_of_threads: 4,
            max_retries: 2,
            retry_backoff_ms: 1,
            ..Default::default()
        };
        let coordinator = DispatchCoordinator::new(FlakyOnce::default(), config);
        let records = (0..20).map(|i| contracts::Record::new(i, format!("r{i}")));
        let report = coordinator.dispatch(records).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.batches, 4);
        assert_eq!(report.attempts, 8);
        assert_eq!(coordinator.metrics().snapshot().retries, 4);
        assert_accounting(&report);
    }

    #[tokio::test]
    async fn test_e2e_cancellation_reports_every_record() {
        let cancel = CancellationToken::new();
        let config = DispatchConfig {
            records_per_request: 1,
            qps: 1000.0,
            number_of_threads: 1,
            ..Default::default()
        };
        let coordinator = DispatchCoordinator::new(Slow(Duration::from_millis(50)), config)
            .with_cancellation(cancel.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            cancel.cancel();
        });

        let records = (0..10).map(|i| contracts::Record::new(i, "x"));
        let report = coordinator.dispatch(records).await.unwrap();
        trigger.await.unwrap();

        assert_accounting(&report);
        assert!(report.total_succeeded >= 1);
        assert!(report.total_failed >= 1);
        assert!(report
            .failures
            .iter()
            .all(|f| f.error_kind == ErrorKind::Cancelled));
    }
}
