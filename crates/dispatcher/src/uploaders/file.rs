//! FileUploader - appends record payloads to a local file

use contracts::{Batch, BatchResult, ErrorKind, Uploader};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

/// Configuration for FileUploader
#[derive(Debug, Clone)]
pub struct FileUploaderConfig {
    /// Output file, one record per line
    pub path: PathBuf,
}

impl FileUploaderConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> std::io::Result<Self> {
        let path = params.get("path").map(PathBuf::from).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing 'path' parameter")
        })?;

        Ok(Self { path })
    }
}

/// Uploader that appends each record as one line.
///
/// Batches from concurrent workers are serialized by a mutex so lines of two
/// batches never interleave.
pub struct FileUploader {
    name: String,
    config: FileUploaderConfig,
    file: Mutex<File>,
}

impl FileUploader {
    /// Create a new FileUploader, creating parent directories as needed
    pub fn new(name: impl Into<String>, config: FileUploaderConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            config,
            file: Mutex::new(File::from_std(file)),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileUploaderConfig::from_params(params)?;
        Self::new(name, config)
    }

    fn encode_batch(batch: &Batch) -> Vec<u8> {
        let mut buf = Vec::with_capacity(batch.byte_size() + batch.len());
        for record in &batch.records {
            buf.extend_from_slice(&record.payload);
            buf.push(b'\n');
        }
        buf
    }

    async fn append(&self, batch: &Batch) -> std::io::Result<()> {
        let buf = Self::encode_batch(batch);
        let mut file = self.file.lock().await;
        file.write_all(&buf).await?;
        file.flush().await
    }
}

impl Uploader for FileUploader {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_uploader_upload",
        skip(self, batch),
        fields(uploader = %self.name, batch_id = %batch.id)
    )]
    async fn upload(&self, batch: &Batch) -> BatchResult {
        match self.append(batch).await {
            Ok(()) => {
                debug!(path = %self.config.path.display(), records = batch.len(), "batch appended");
                BatchResult::success(batch)
            }
            Err(e) => {
                error!(uploader = %self.name, batch_id = %batch.id, error = %e, "Write failed");
                BatchResult::failure(batch, ErrorKind::Transient, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BatchId, Record};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_uploader_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.ndjson");
        let config = FileUploaderConfig { path: path.clone() };

        let uploader = FileUploader::new("test_file", config).unwrap();
        let first = Batch::new(BatchId(0), vec![Record::new(0, "a"), Record::new(1, "b")]);
        let second = Batch::new(BatchId(1), vec![Record::new(2, "c")]);

        assert!(uploader.upload(&first).await.is_success());
        assert!(uploader.upload(&second).await.is_success());

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "a\nb\nc\n");
    }

    #[test]
    fn test_missing_path_param() {
        let err = FileUploader::from_params("f", &HashMap::new()).err().unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}
