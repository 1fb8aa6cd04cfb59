//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 读取输入失败
    #[error("failed to read records: {0}")]
    Io(#[from] std::io::Error),

    /// 记录格式不合法
    #[error("invalid record at line {line}: {message}")]
    InvalidRecord {
        /// 行号 (从 1 开始)
        line: usize,
        /// 错误消息
        message: String,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
