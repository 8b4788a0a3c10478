use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} has no file name", .0.display())]
    NoName(PathBuf),
}

/// A file carried by a drop or paste: name, MIME type and contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    name: String,
    mime: String,
    bytes: Arc<[u8]>,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: Arc::from(bytes),
        }
    }

    /// Reads a file dropped from the OS, guessing its type from the
    /// extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| FileError::NoName(path.to_path_buf()))?;
        let bytes = std::fs::read(path).map_err(|source| FileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self::new(name, mime, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    /// Inline `data:` URL, for previews shown before the upload lands.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// Files attached to one event, in the order the platform reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileList(Vec<FileBlob>);

impl FileList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first(&self) -> Option<&FileBlob> {
        self.0.first()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileBlob> {
        self.0.iter()
    }
}

impl From<Vec<FileBlob>> for FileList {
    fn from(files: Vec<FileBlob>) -> Self {
        Self(files)
    }
}

impl FromIterator<FileBlob> for FileList {
    fn from_iter<I: IntoIterator<Item = FileBlob>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
