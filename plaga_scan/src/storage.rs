use serde::Serialize;
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),
    #[error("Batch not found: {0}")]
    BatchNotFound(BatchId),
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Names one upload batch; every batch owns a directory under the store root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn batch_dir(&self, batch: &BatchId) -> PathBuf {
        self.root.join(batch.to_string())
    }

    pub fn path_of(&self, batch: &BatchId, file_name: &str) -> PathBuf {
        self.batch_dir(batch).join(file_name)
    }

    pub async fn create_batch(&self) -> Result<BatchId, StorageError> {
        let batch = BatchId::new();
        tokio::fs::create_dir_all(self.batch_dir(&batch)).await?;
        tracing::debug!("Created batch directory {:?}", self.batch_dir(&batch));
        Ok(batch)
    }

    /// Stores `data` under a sanitized name that is unique within the batch and
    /// returns the name actually used.
    pub async fn save(
        &self,
        batch: &BatchId,
        file_name: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        let name = sanitize_file_name(file_name)
            .ok_or_else(|| StorageError::InvalidFileName(file_name.to_string()))?;
        let dir = self.batch_dir(batch);
        let name = unique_name(&dir, &name).await?;
        tokio::fs::write(dir.join(&name), data).await?;
        Ok(name)
    }

    /// Stores `data` under `file_name`, replacing any previous file of that name.
    pub async fn write(
        &self,
        batch: &BatchId,
        file_name: &str,
        data: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let name = checked_name(file_name)?;
        let path = self.path_of(batch, &name);
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    pub async fn remove_batch(&self, batch: &BatchId) -> Result<(), StorageError> {
        tokio::fs::remove_dir_all(self.batch_dir(batch)).await?;
        tracing::debug!("Removed batch directory {:?}", self.batch_dir(batch));
        Ok(())
    }

    pub async fn read(&self, batch: &BatchId, file_name: &str) -> Result<Vec<u8>, StorageError> {
        let name = checked_name(file_name)?;
        if !tokio::fs::try_exists(self.batch_dir(batch)).await? {
            return Err(StorageError::BatchNotFound(*batch));
        }

        match tokio::fs::read(self.path_of(batch, &name)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::FileNotFound(name))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn checked_name(file_name: &str) -> Result<String, StorageError> {
    match sanitize_file_name(file_name) {
        Some(name) if name == file_name => Ok(name),
        _ => Err(StorageError::InvalidFileName(file_name.to_string())),
    }
}

async fn unique_name(dir: &Path, name: &str) -> Result<String, StorageError> {
    if !tokio::fs::try_exists(dir.join(name)).await? {
        return Ok(name.to_string());
    }

    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let extension = path.extension().and_then(|e| e.to_str());

    let mut index = 1;
    loop {
        let candidate = match extension {
            Some(extension) => format!("{}-{}.{}", stem, index, extension),
            None => format!("{}-{}", stem, index),
        };
        if !tokio::fs::try_exists(dir.join(&candidate)).await? {
            return Ok(candidate);
        }
        index += 1;
    }
}

/// Keeps the last path component of a client-supplied name and replaces anything
/// outside `[alphanumeric . - _]` with `_`. Leading dots are dropped.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

pub fn annotated_name(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source_name);
    format!("{}_annotated.jpg", stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("leaf.jpg").as_deref(), Some("leaf.jpg"));
        assert_eq!(
            sanitize_file_name("C:\\Users\\ana\\hoja 1.png").as_deref(),
            Some("hoja_1.png")
        );
        assert_eq!(
            sanitize_file_name("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(sanitize_file_name(".hidden").as_deref(), Some("hidden"));
        assert_eq!(sanitize_file_name("..").as_deref(), None);
        assert_eq!(sanitize_file_name("dir/").as_deref(), None);
    }

    #[test]
    fn test_annotated_name() {
        assert_eq!(annotated_name("leaf.png"), "leaf_annotated.jpg");
        assert_eq!(annotated_name("leaf"), "leaf_annotated.jpg");
    }

    #[test]
    fn test_batch_id_round_trip_through_display() {
        let batch = BatchId::new();
        let parsed: BatchId = batch.to_string().parse().unwrap();
        assert_eq!(batch, parsed);
        assert!("../etc".parse::<BatchId>().is_err());
    }

    #[tokio::test]
    async fn test_save_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let batch = store.create_batch().await.unwrap();

        let name = store.save(&batch, "leaf.jpg", b"first").await.unwrap();
        assert_eq!(name, "leaf.jpg");
        assert_eq!(store.read(&batch, "leaf.jpg").await.unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_save_deduplicates_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let batch = store.create_batch().await.unwrap();

        let first = store.save(&batch, "leaf.jpg", b"first").await.unwrap();
        let second = store.save(&batch, "leaf.jpg", b"second").await.unwrap();
        let third = store.save(&batch, "leaf.jpg", b"third").await.unwrap();

        assert_eq!(first, "leaf.jpg");
        assert_eq!(second, "leaf-1.jpg");
        assert_eq!(third, "leaf-2.jpg");
        assert_eq!(store.read(&batch, "leaf-1.jpg").await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let batch = store.create_batch().await.unwrap();

        store.write(&batch, "report.pdf", b"v1").await.unwrap();
        let path = store.write(&batch, "report.pdf", b"v2").await.unwrap();

        assert_eq!(path, store.path_of(&batch, "report.pdf"));
        assert_eq!(store.read(&batch, "report.pdf").await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_read_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let missing_batch = BatchId::new();
        assert!(matches!(
            store.read(&missing_batch, "leaf.jpg").await,
            Err(StorageError::BatchNotFound(_))
        ));

        let batch = store.create_batch().await.unwrap();
        assert!(matches!(
            store.read(&batch, "leaf.jpg").await,
            Err(StorageError::FileNotFound(_))
        ));
        assert!(matches!(
            store.read(&batch, "../leaf.jpg").await,
            Err(StorageError::InvalidFileName(_))
        ));
    }
}
