//! LogUploader - logs batch summaries via tracing

use contracts::{Batch, BatchResult, Uploader};
use tracing::{info, instrument};

/// Uploader that logs each batch and accepts every record
pub struct LogUploader {
    name: String,
}

impl LogUploader {
    /// Create a new LogUploader with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_batch_summary(&self, batch: &Batch) {
        let first = batch.records.first().map(|r| r.index);
        let last = batch.records.last().map(|r| r.index);

        info!(
            uploader = %self.name,
            batch_id = %batch.id,
            records = batch.len(),
            bytes = batch.byte_size(),
            first_index = ?first,
            last_index = ?last,
            "batch received"
        );
    }
}

impl Uploader for LogUploader {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_uploader_upload",
        skip(self, batch),
        fields(uploader = %self.name, batch_id = %batch.id)
    )]
    async fn upload(&self, batch: &Batch) -> BatchResult {
        self.log_batch_summary(batch);
        BatchResult::success(batch)
    }
}
