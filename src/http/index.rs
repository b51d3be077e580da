use std::path::{Path, PathBuf};

/// The static document served for `GET /`.
///
/// Loaded once when a listener starts and shared read-only by every
/// connection that listener accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    path: PathBuf,
    contents: Vec<u8>,
}

impl IndexDocument {
    pub async fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            contents,
        })
    }

    /// Builds a document from bytes already in memory.
    pub fn from_bytes(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}
