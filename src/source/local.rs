use std::fs;
use std::path::Path;

use tracing::debug;

use crate::contract::SourceBackend;
use crate::error::SourceError;

/// Backend over the local filesystem. Holds no state.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalBackend;

impl LocalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SourceBackend for LocalBackend {
    /// Children sorted by path; `read_dir` order is platform dependent.
    fn list(&mut self, path: &str) -> Result<Vec<String>, SourceError> {
        let mut children = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| SourceError::io(path, e))? {
            let entry = entry.map_err(|e| SourceError::io(path, e))?;
            children.push(entry.path().to_string_lossy().into_owned());
        }
        children.sort();
        debug!(path = %path, count = children.len(), "Listed local directory");
        Ok(children)
    }

    fn is_dir(&mut self, path: &str) -> Result<bool, SourceError> {
        fs::metadata(path)
            .map(|m| m.is_dir())
            .map_err(|e| SourceError::io(path, e))
    }

    fn read_all(&mut self, path: &str) -> Result<Vec<u8>, SourceError> {
        if Path::new(path).is_dir() {
            return Err(SourceError::Io {
                path: path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "is a directory"),
            });
        }
        fs::read(path).map_err(|e| SourceError::io(path, e))
    }

    fn accepts_entry(&self, _path: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir_all, write};
    use tempfile::tempdir;

    #[test]
    fn lists_children_sorted_and_reads_files() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        create_dir_all(root.join("b_dir")).unwrap();
        write(root.join("a.zip"), b"zipbytes").unwrap();

        let mut backend = LocalBackend::new();
        let root_str = root.to_string_lossy().into_owned();
        let children = backend.list(&root_str).unwrap();
        assert_eq!(children.len(), 2);
        assert!(children[0].ends_with("a.zip"));
        assert!(children[1].ends_with("b_dir"));

        assert!(backend.is_dir(&children[1]).unwrap());
        assert!(!backend.is_dir(&children[0]).unwrap());
        assert_eq!(backend.read_all(&children[0]).unwrap(), b"zipbytes");
    }

    #[test]
    fn missing_paths_are_not_found() {
        let tmp = tempdir().unwrap();
        let missing = tmp.path().join("nope").to_string_lossy().into_owned();
        let mut backend = LocalBackend::new();
        assert!(matches!(backend.list(&missing), Err(SourceError::NotFound(_))));
        assert!(matches!(backend.read_all(&missing), Err(SourceError::NotFound(_))));
    }
}
