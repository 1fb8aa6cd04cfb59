//! # Dispatcher
//!
//! 限速批量分发模块。
//!
//! 负责：
//! - 将记录切分为请求大小的 `Batch`
//! - 以 QPS + 并发数 双重预算调度上传
//! - 单批次重试，汇总逐条记录的成功/失败
//! - 按 API 名称静态解析上传器

pub mod batcher;
pub mod coordinator;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod rate_limiter;
pub mod registry;
pub mod report;
pub mod uploaders;

pub use batcher::{make_batches, Batcher};
pub use contracts::{DispatchConfig, DispatchReport, Uploader};
pub use coordinator::DispatchCoordinator;
pub use error::DispatcherError;
pub use gate::{ConcurrencyGate, GatePermit};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use rate_limiter::RateLimiter;
pub use registry::{ApiEntry, ApiRegistry, DispatchRun};
pub use report::normalize;
pub use uploaders::{create_uploader, BuiltinUploader, FileUploader, HttpUploader, LogUploader};
pub use tokio_util::sync::CancellationToken;
