use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::errors::{EmberError, Result};

/// Asset reader trait.
///
/// Resolves a relative asset path to its raw bytes. Readers are synchronous:
/// loads happen at well-defined points on the render thread.
pub trait AssetReader {
    fn read_bytes(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Reads assets from a directory on disk.
pub struct FileAssetReader {
    root_path: PathBuf,
}

impl FileAssetReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let root_path = if path.is_file() {
            path.parent().unwrap_or(Path::new(".")).to_path_buf()
        } else {
            path.to_path_buf()
        };
        Self { root_path }
    }

    #[inline]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }
}

impl AssetReader for FileAssetReader {
    fn read_bytes(&self, uri: &str) -> Result<Vec<u8>> {
        let path = self.root_path.join(uri);
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EmberError::AssetNotFound(path.display().to_string()),
            _ => EmberError::IoError(e),
        })
    }
}

/// In-memory asset table, for tests and embedded content.
#[derive(Default)]
pub struct MemoryAssetReader {
    files: FxHashMap<String, Vec<u8>>,
}

impl MemoryAssetReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uri: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(uri.into(), bytes.into());
    }

    #[must_use]
    pub fn with(mut self, uri: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(uri, bytes);
        self
    }
}

impl AssetReader for MemoryAssetReader {
    fn read_bytes(&self, uri: &str) -> Result<Vec<u8>> {
        self.files
            .get(uri)
            .cloned()
            .ok_or_else(|| EmberError::AssetNotFound(uri.to_owned()))
    }
}

/// Resolves `uri` relative to the directory containing `base`.
#[must_use]
pub fn resolve_relative(base: &str, uri: &str) -> String {
    match base.rfind('/') {
        Some(slash) => format!("{}/{uri}", &base[..slash]),
        None => uri.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_parent_dir() {
        assert_eq!(resolve_relative("models/box.gltf", "box.bin"), "models/box.bin");
        assert_eq!(resolve_relative("box.gltf", "tex/a.png"), "tex/a.png");
    }

    #[test]
    fn memory_reader_reports_missing_assets() {
        let reader = MemoryAssetReader::new().with("a.txt", b"hi".to_vec());
        assert_eq!(reader.read_bytes("a.txt").ok(), Some(b"hi".to_vec()));
        assert!(matches!(
            reader.read_bytes("b.txt"),
            Err(EmberError::AssetNotFound(path)) if path == "b.txt"
        ));
    }
}
