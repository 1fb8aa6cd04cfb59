//! Uploader trait - the single extension point for target APIs
//!
//! Defines the abstract interface the dispatcher drives.

use crate::{Batch, BatchResult};

/// Upload capability for one target API
///
/// One call performs exactly one network request for one batch. The call must
/// not fail past its boundary: transport and API errors are captured into
/// `BatchResult::error_kind` and `BatchResult::retryable`.
///
/// Workers share a single uploader, hence `&self`.
#[trait_variant::make(Uploader: Send)]
pub trait LocalUploader {
    /// Uploader name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Send one batch and report the per-record outcome
    async fn upload(&self, batch: &Batch) -> BatchResult;
}
