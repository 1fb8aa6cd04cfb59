//! 分发指标收集模块
//!
//! 基于 DispatchReport 收集和统计每次分发的运行指标。

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::{DispatchReport, ErrorKind};
use metrics::{counter, gauge, histogram};

/// 从 DispatchReport 记录指标
///
/// 每次分发结束时调用。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_dispatch_report;
///
/// let run = entry.dispatch(records, cancel).await?;
/// record_dispatch_report(run.api.as_str(), &run.report, run.elapsed);
/// ```
pub fn record_dispatch_report(api: &str, report: &DispatchReport, elapsed: Duration) {
    let api = api.to_string();

    // 运行计数
    let status = if report.is_success() { "success" } else { "failure" };
    counter!(
        "tentacles_dispatch_runs_total",
        "api" => api.clone(),
        "status" => status
    )
    .increment(1);

    // 记录计数
    counter!("tentacles_records_succeeded_total", "api" => api.clone())
        .increment(report.total_succeeded as u64);
    counter!("tentacles_batches_total", "api" => api.clone()).increment(report.batches as u64);
    counter!("tentacles_upload_attempts_total", "api" => api.clone()).increment(report.attempts);

    // 按错误类型统计失败
    for (kind, count) in report.failures_by_kind() {
        counter!(
            "tentacles_records_failed_total",
            "api" => api.clone(),
            "error_kind" => kind.as_str()
        )
        .increment(count as u64);
    }

    // 成功率 / 耗时
    gauge!("tentacles_success_rate", "api" => api.clone()).set(report.success_rate());
    histogram!("tentacles_dispatch_duration_ms", "api" => api)
        .record(elapsed.as_secs_f64() * 1000.0);
}

/// 记录读取的输入记录数
pub fn record_records_read(api: &str, count: usize) {
    counter!("tentacles_records_ingested_total", "api" => api.to_string())
        .increment(count as u64);
}

/// 记录一次分发的峰值并发
pub fn record_peak_in_flight(api: &str, peak: usize) {
    gauge!("tentacles_peak_in_flight", "api" => api.to_string()).set(peak as f64);
}

/// 分发指标聚合器
///
/// 在内存中聚合多次分发 (例如多个输入文件) 的结果，便于输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DispatchMetricsAggregator {
    /// 分发次数
    pub total_runs: u64,

    /// 输入记录总数
    pub total_records: u64,

    /// 成功记录数
    pub total_succeeded: u64,

    /// 失败记录数
    pub total_failed: u64,

    /// 批次总数
    pub total_batches: u64,

    /// 上传调用总数 (含重试)
    pub total_attempts: u64,

    /// 单次分发耗时统计 (毫秒)
    pub duration_stats: RunningStats,

    /// 吞吐统计 (记录/秒)
    pub throughput_stats: RunningStats,

    /// 各错误类型的失败记录数
    pub failures_by_kind: BTreeMap<ErrorKind, u64>,
}

impl DispatchMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, report: &DispatchReport, elapsed: Duration) {
        self.total_runs += 1;
        self.total_records += report.total_records as u64;
        self.total_succeeded += report.total_succeeded as u64;
        self.total_failed += report.total_failed as u64;
        self.total_batches += report.batches as u64;
        self.total_attempts += report.attempts;

        let secs = elapsed.as_secs_f64();
        self.duration_stats.push(secs * 1000.0);
        if secs > 0.0 {
            self.throughput_stats
                .push(report.total_records as f64 / secs);
        }

        for (kind, count) in report.failures_by_kind() {
            *self.failures_by_kind.entry(kind).or_insert(0) += count as u64;
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_runs: self.total_runs,
            total_records: self.total_records,
            total_succeeded: self.total_succeeded,
            total_failed: self.total_failed,
            total_batches: self.total_batches,
            total_attempts: self.total_attempts,
            success_rate: if self.total_records > 0 {
                self.total_succeeded as f64 / self.total_records as f64 * 100.0
            } else {
                100.0
            },
            retries: self.total_attempts.saturating_sub(self.total_batches),
            duration_ms: StatsSummary::from(&self.duration_stats),
            throughput: StatsSummary::from(&self.throughput_stats),
            failures_by_kind: self.failures_by_kind.clone(),
        }
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_runs: u64,
    pub total_records: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub total_batches: u64,
    pub total_attempts: u64,
    pub success_rate: f64,
    /// 上传调用数减去批次数 (未被取消的批次至少调用一次)
    pub retries: u64,
    pub duration_ms: StatsSummary,
    pub throughput: StatsSummary,
    pub failures_by_kind: BTreeMap<ErrorKind, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Metrics Summary ===")?;
        writeln!(f, "Runs: {}", self.total_runs)?;
        writeln!(f, "Total records: {}", self.total_records)?;
        writeln!(
            f,
            "Succeeded: {} ({:.2}%)",
            self.total_succeeded, self.success_rate
        )?;
        writeln!(f, "Failed: {}", self.total_failed)?;
        writeln!(
            f,
            "Batches: {} (attempts: {})",
            self.total_batches, self.total_attempts
        )?;
        writeln!(f, "Duration (ms): {}", self.duration_ms)?;
        writeln!(f, "Throughput (records/s): {}", self.throughput)?;

        if !self.failures_by_kind.is_empty() {
            writeln!(f, "Failures by kind:")?;
            for (kind, count) in &self.failures_by_kind {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::RecordFailure;

    fn report(total: usize, failed: &[(usize, ErrorKind)], batches: usize, attempts: u64) -> DispatchReport {
        DispatchReport {
            total_records: total,
            total_succeeded: total - failed.len(),
            total_failed: failed.len(),
            failures: failed
                .iter()
                .map(|(idx, kind)| RecordFailure {
                    record_index: *idx,
                    error_kind: *kind,
                    message: None,
                })
                .collect(),
            batches,
            attempts,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        stats.push(1.0);
        stats.push(2.0);
        stats.push(3.0);
        stats.push(4.0);
        stats.push(5.0);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = DispatchMetricsAggregator::new();

        aggregator.update(
            &report(10, &[(3, ErrorKind::Transient), (4, ErrorKind::Transient)], 4, 6),
            Duration::from_secs(2),
        );
        aggregator.update(
            &report(5, &[(0, ErrorKind::Cancelled)], 2, 1),
            Duration::from_secs(1),
        );

        assert_eq!(aggregator.total_runs, 2);
        assert_eq!(aggregator.total_records, 15);
        assert_eq!(aggregator.total_failed, 3);
        assert_eq!(aggregator.failures_by_kind.get(&ErrorKind::Transient), Some(&2));
        assert_eq!(aggregator.failures_by_kind.get(&ErrorKind::Cancelled), Some(&1));
        assert!((aggregator.throughput_stats.mean() - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = DispatchMetricsAggregator::new();
        aggregator.update(
            &report(100, &[(7, ErrorKind::PermanentRejection)], 10, 12),
            Duration::from_millis(500),
        );

        let summary = aggregator.summary();
        assert_eq!(summary.retries, 2);

        let output = format!("{}", summary);
        assert!(output.contains("Total records: 100"));
        assert!(output.contains("99.00%"));
        assert!(output.contains("permanent_rejection: 1"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = DispatchMetricsAggregator::new().summary();
        assert_eq!(summary.success_rate, 100.0);
        assert!(format!("{summary}").contains("Duration (ms): N/A"));
    }
}
