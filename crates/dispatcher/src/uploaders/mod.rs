//! Uploader implementations
//!
//! Contains LogUploader, FileUploader and HttpUploader, plus the static
//! mapping from `UploaderKind` to a concrete uploader.

mod file;
mod http;
mod log;

pub use self::file::{FileUploader, FileUploaderConfig};
pub use self::http::{HttpUploader, HttpUploaderConfig};
pub use self::log::LogUploader;

use contracts::{ApiConfig, Batch, BatchResult, UploaderKind, Uploader};
use tracing::instrument;

use crate::error::DispatcherError;

/// One of the built-in uploaders, selected by `UploaderKind`
pub enum BuiltinUploader {
    Log(LogUploader),
    File(FileUploader),
    Http(HttpUploader),
}

impl Uploader for BuiltinUploader {
    fn name(&self) -> &str {
        match self {
            Self::Log(u) => u.name(),
            Self::File(u) => u.name(),
            Self::Http(u) => u.name(),
        }
    }

    async fn upload(&self, batch: &Batch) -> BatchResult {
        match self {
            Self::Log(u) => u.upload(batch).await,
            Self::File(u) => u.upload(batch).await,
            Self::Http(u) => u.upload(batch).await,
        }
    }
}

/// Create the uploader configured for `api`
#[instrument(
    name = "dispatcher_create_uploader",
    skip(api),
    fields(api = %api.name, uploader = api.uploader.as_str())
)]
pub fn create_uploader(api: &ApiConfig) -> Result<BuiltinUploader, DispatcherError> {
    let name = api.name.as_str();
    match api.uploader {
        UploaderKind::Log => Ok(BuiltinUploader::Log(LogUploader::new(name))),
        UploaderKind::File => {
            let uploader = FileUploader::from_params(name, &api.params)
                .map_err(|e| DispatcherError::uploader_creation(name, e.to_string()))?;
            Ok(BuiltinUploader::File(uploader))
        }
        UploaderKind::Http => {
            let uploader = HttpUploader::from_params(name, &api.params)
                .map_err(|e| DispatcherError::uploader_creation(name, e.to_string()))?;
            Ok(BuiltinUploader::Http(uploader))
        }
    }
}
